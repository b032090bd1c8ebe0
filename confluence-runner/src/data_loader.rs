//! Bar loading from CSV.
//!
//! Two layouts are accepted, detected from the header row (case-insensitive):
//! 1. Indicator-augmented: `timestamp,close,rsi,macd,macd_signal,bb_lower,bb_upper`
//!    (aliases: `datetime`/`date`, `bbl`/`bbu`)
//! 2. Raw prices: `timestamp,close`. Indicators are computed downstream.
//!
//! Rows with a missing or unparseable value are dropped with a warning, as are
//! rows outside the optional date window. The result is sorted by timestamp
//! with duplicate timestamps removed.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{info, warn};

use confluence_core::domain::{Bar, PriceBar};
use confluence_core::engine::{IndicatorError, IndicatorSettings};

use crate::objective::Dataset;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("no usable rows")]
    Empty,
}

/// Optional inclusive date window applied while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl LoadOptions {
    fn admits(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Bars(Vec<Bar>),
    Prices(Vec<PriceBar>),
}

/// Loaded series with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedData {
    pub series: SeriesData,
    /// Rows skipped for missing values, parse failures, or duplicate timestamps.
    pub dropped_rows: usize,
    /// BLAKE3 over every (timestamp, close) pair.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn len(&self) -> usize {
        match &self.series {
            SeriesData::Bars(b) => b.len(),
            SeriesData::Prices(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dataset(&self) -> Dataset<'_> {
        match &self.series {
            SeriesData::Bars(b) => Dataset::Bars(b),
            SeriesData::Prices(p) => Dataset::Prices(p),
        }
    }

    /// Resolved bars: as loaded, or enriched with `settings` when raw.
    pub fn to_bars(&self, settings: &IndicatorSettings) -> Result<Vec<Bar>, IndicatorError> {
        self.dataset().to_bars(settings)
    }
}

pub fn load_csv(path: &Path, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = read_csv(file, opts)?;
    info!(
        path = %path.display(),
        rows = data.len(),
        dropped = data.dropped_rows,
        hash = %&data.dataset_hash[..12],
        "loaded bars"
    );
    Ok(data)
}

// ─── Parsing ─────────────────────────────────────────────────────────

struct Columns {
    timestamp: usize,
    close: usize,
    indicators: Option<[usize; 5]>,
}

fn find(headers: &[String], names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| names.contains(&h.as_str()))
}

fn resolve_columns(headers: &csv::StringRecord) -> Result<Columns, LoadError> {
    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
    let timestamp = find(&headers, &["timestamp", "datetime", "date", "time"])
        .ok_or(LoadError::MissingColumn("timestamp"))?;
    let close = find(&headers, &["close"]).ok_or(LoadError::MissingColumn("close"))?;

    let indicators = match (
        find(&headers, &["rsi"]),
        find(&headers, &["macd"]),
        find(&headers, &["macd_signal", "macd_s"]),
        find(&headers, &["bb_lower", "bbl"]),
        find(&headers, &["bb_upper", "bbu"]),
    ) {
        (Some(rsi), Some(macd), Some(signal), Some(lower), Some(upper)) => {
            Some([rsi, macd, signal, lower, upper])
        }
        _ => None,
    };
    Ok(Columns {
        timestamp,
        close,
        indicators,
    })
}

/// Parse the timestamp layouts seen in exported market data.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
}

fn parse_field(record: &csv::StringRecord, idx: usize) -> Option<f64> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Read a CSV stream. Exposed separately from [`load_csv`] for in-memory input.
pub fn read_csv<R: Read>(reader: R, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let columns = resolve_columns(rdr.headers()?)?;

    let mut bars = Vec::new();
    let mut prices = Vec::new();
    let mut dropped = 0usize;
    let mut filtered = 0usize;

    for record in rdr.records() {
        let record = record?;
        let Some(timestamp) = record.get(columns.timestamp).and_then(parse_timestamp) else {
            dropped += 1;
            continue;
        };
        if !opts.admits(timestamp) {
            filtered += 1;
            continue;
        }
        let Some(close) = parse_field(&record, columns.close).filter(|c| *c > 0.0) else {
            dropped += 1;
            continue;
        };

        match columns.indicators {
            Some([rsi, macd, signal, lower, upper]) => {
                let fields = [rsi, macd, signal, lower, upper].map(|i| parse_field(&record, i));
                match fields {
                    [Some(rsi), Some(macd), Some(macd_signal), Some(bb_lower), Some(bb_upper)] => {
                        bars.push(Bar {
                            timestamp,
                            close,
                            rsi,
                            macd,
                            macd_signal,
                            bb_lower,
                            bb_upper,
                        })
                    }
                    _ => dropped += 1,
                }
            }
            None => prices.push(PriceBar { timestamp, close }),
        }
    }

    let (series, duplicates) = if columns.indicators.is_some() {
        let before = bars.len();
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        let removed = before - bars.len();
        (SeriesData::Bars(bars), removed)
    } else {
        let before = prices.len();
        prices.sort_by_key(|p| p.timestamp);
        prices.dedup_by_key(|p| p.timestamp);
        let removed = before - prices.len();
        (SeriesData::Prices(prices), removed)
    };
    let dropped_rows = dropped + duplicates;

    if dropped_rows > 0 {
        warn!(
            dropped = dropped_rows,
            duplicates, "dropped rows with missing or unparseable values"
        );
    }
    if filtered > 0 {
        info!(filtered, "rows outside the date window skipped");
    }

    let mut data = LoadedData {
        series,
        dropped_rows,
        dataset_hash: String::new(),
    };
    if data.is_empty() {
        return Err(LoadError::Empty);
    }
    data.dataset_hash = dataset_hash(&data.series);
    Ok(data)
}

fn dataset_hash(series: &SeriesData) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut feed = |ts: NaiveDateTime, close: f64| {
        hasher.update(&ts.and_utc().timestamp().to_le_bytes());
        hasher.update(&close.to_le_bytes());
    };
    match series {
        SeriesData::Bars(bars) => bars.iter().for_each(|b| feed(b.timestamp, b.close)),
        SeriesData::Prices(prices) => prices.iter().for_each(|p| feed(p.timestamp, p.close)),
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn timestamp_formats() {
        let expected = ts("2024-05-01 00:05:00");
        assert_eq!(parse_timestamp("2024-05-01 00:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T00:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T00:05:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 00:05:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 02:05:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 00:05"), Some(expected));
        assert_eq!(parse_timestamp("1714521900"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01"), Some(ts("2024-05-01 00:00:00")));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn raw_prices_layout() {
        let csv = "Datetime,Open,Close\n\
                   2024-05-01 00:05:00,1,60010.5\n\
                   2024-05-01 00:00:00,1,60000.0\n";
        let data = read_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let SeriesData::Prices(prices) = &data.series else {
            panic!("expected raw prices");
        };
        assert_eq!(prices.len(), 2);
        // sorted
        assert_eq!(prices[0].close, 60_000.0);
        assert_eq!(data.dropped_rows, 0);
        assert_eq!(data.dataset_hash.len(), 64);
    }

    #[test]
    fn indicator_layout_drops_incomplete_rows() {
        let csv = "timestamp,close,rsi,macd,macd_signal,bb_lower,bb_upper\n\
                   2024-05-01 00:00:00,100,40,1,0.5,98,102\n\
                   2024-05-01 00:05:00,101,,1,0.5,98,102\n\
                   2024-05-01 00:10:00,102,60,NaN,0.5,98,102\n\
                   2024-05-01 00:15:00,103,60,1,0.5,99,104\n\
                   2024-05-01 00:15:00,103,60,1,0.5,99,104\n";
        let data = read_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let SeriesData::Bars(bars) = &data.series else {
            panic!("expected indicator bars");
        };
        assert_eq!(bars.len(), 2);
        assert_eq!(data.dropped_rows, 3);
        assert!(bars.iter().all(Bar::is_resolved));
    }

    #[test]
    fn short_aliases_accepted() {
        let csv = "Datetime,Close,RSI,MACD,MACD_signal,BBL,BBU\n\
                   2024-05-01 00:00:00,100,40,1,0.5,98,102\n";
        let data = read_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert!(matches!(data.series, SeriesData::Bars(ref b) if b[0].bb_upper == 102.0));
    }

    #[test]
    fn date_window_filters() {
        let csv = "timestamp,close\n\
                   2024-04-30 23:55:00,1\n\
                   2024-05-01 00:00:00,2\n\
                   2024-05-02 00:00:00,3\n";
        let opts = LoadOptions {
            start: Some(ts("2024-05-01 00:00:00")),
            end: Some(ts("2024-05-01 23:59:59")),
        };
        let data = read_csv(csv.as_bytes(), &opts).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.dropped_rows, 0);
    }

    #[test]
    fn missing_columns_and_empty_input() {
        let err = read_csv("timestamp,open\n2024-05-01,1\n".as_bytes(), &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn("close")));

        let err = read_csv("timestamp,close\n".as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn raw_prices_enrich_to_bars() {
        let mut csv = String::from("timestamp,close\n");
        for i in 0..100 {
            let close = 100.0 + (i as f64 * 0.3).sin();
            csv.push_str(&format!(
                "2024-05-01 {:02}:{:02}:00,{close}\n",
                i / 12,
                (i % 12) * 5
            ));
        }
        let data = read_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let bars = data.to_bars(&IndicatorSettings::default()).unwrap();
        assert_eq!(bars.len(), 100 - 33);
    }
}
