//! Artifact export: CSV equity curve and trade tape, JSON reports.
//!
//! Every CSV builder returns the text so callers and tests can inspect it
//! without touching the filesystem; [`write_artifacts`] lays the files out in
//! a run directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use confluence_core::domain::{ExitReason, PositionSide, TradeRecord};

use crate::metrics::PerformanceMetrics;
use crate::period_returns::{EquityPoint, PeriodReturn, ReturnTables};
use crate::sensitivity::SensitivityRow;
use crate::walk_forward::WalkForwardReport;

pub const EQUITY_FILE: &str = "equity.csv";
pub const TRADES_FILE: &str = "trades.csv";
pub const METRICS_FILE: &str = "metrics.json";
pub const PERIOD_RETURNS_FILE: &str = "period_returns.csv";
pub const WALK_FORWARD_FILE: &str = "walk_forward.json";
pub const SENSITIVITY_FILE: &str = "sensitivity.csv";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// `timestamp,portfolio_value`, one row per processed bar.
pub fn export_equity_csv(points: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "portfolio_value"])?;
    for p in points {
        wtr.write_record([
            p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.6}", p.portfolio_value),
        ])?;
    }
    finish(wtr)
}

/// One row per closed position, in close order.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "entry_bar",
        "entry_price",
        "exit_bar",
        "exit_price",
        "exit_reason",
        "shares",
        "gross_pnl",
        "fees",
        "net_pnl",
        "bars_held",
    ])?;
    for t in trades {
        let side = match t.side {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        };
        let reason = match t.exit_reason {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
        };
        wtr.write_record([
            side.to_string(),
            t.entry_bar.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_bar.to_string(),
            format!("{:.6}", t.exit_price),
            reason.to_string(),
            format!("{:.6}", t.shares),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.fees()),
            format!("{:.2}", t.net_pnl),
            t.bars_held().to_string(),
        ])?;
    }
    finish(wtr)
}

/// `frequency,period,end_value,return_pct`, monthly then quarterly then annual.
pub fn export_period_returns_csv(tables: &ReturnTables) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["frequency", "period", "end_value", "return_pct"])?;
    let groups: [(&str, &[PeriodReturn]); 3] = [
        ("monthly", &tables.monthly),
        ("quarterly", &tables.quarterly),
        ("annual", &tables.annual),
    ];
    for (frequency, rows) in groups {
        for r in rows {
            wtr.write_record([
                frequency.to_string(),
                r.period.clone(),
                format!("{:.2}", r.end_value),
                format!("{:.4}", r.return_pct),
            ])?;
        }
    }
    finish(wtr)
}

pub fn export_sensitivity_csv(rows: &[SensitivityRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "parameter",
        "variation",
        "value",
        "total_return",
        "max_drawdown",
        "sharpe",
    ])?;
    for r in rows {
        wtr.write_record([
            r.parameter.label().to_string(),
            r.variation.clone(),
            format!("{:.6}", r.value),
            format!("{:.6}", r.total_return),
            format!("{:.6}", r.max_drawdown),
            format!("{:.6}", r.sharpe),
        ])?;
    }
    finish(wtr)
}

// ─── JSON export ────────────────────────────────────────────────────

/// Metrics as a flat `name → value` object.
pub fn export_metrics_json(metrics: &PerformanceMetrics) -> Result<String> {
    serde_json::to_string_pretty(&metrics.to_map()).context("failed to serialize metrics")
}

pub fn export_walk_forward_json(report: &WalkForwardReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize walk-forward report")
}

pub fn import_walk_forward_json(json: &str) -> Result<WalkForwardReport> {
    serde_json::from_str(json).context("failed to deserialize walk-forward report")
}

/// Pretty JSON for any report type.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize report")
}

// ─── Artifact directory ─────────────────────────────────────────────

/// Everything one command may persist. Absent parts produce no file.
#[derive(Debug, Default)]
pub struct Artifacts<'a> {
    pub equity: Option<&'a [EquityPoint]>,
    pub trades: Option<&'a [TradeRecord]>,
    pub metrics: Option<&'a PerformanceMetrics>,
    pub period_returns: Option<&'a ReturnTables>,
    pub walk_forward: Option<&'a WalkForwardReport>,
    pub sensitivity: Option<&'a [SensitivityRow]>,
}

/// Write the present artifacts under `output_dir/run_id/`.
///
/// Returns the created directory.
pub fn write_artifacts(output_dir: &Path, run_id: &str, artifacts: &Artifacts<'_>) -> Result<PathBuf> {
    let run_dir = output_dir.join(run_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let write = |name: &str, contents: String| -> Result<()> {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    };

    if let Some(points) = artifacts.equity {
        write(EQUITY_FILE, export_equity_csv(points)?)?;
    }
    if let Some(trades) = artifacts.trades {
        write(TRADES_FILE, export_trades_csv(trades)?)?;
    }
    if let Some(metrics) = artifacts.metrics {
        write(METRICS_FILE, export_metrics_json(metrics)?)?;
    }
    if let Some(tables) = artifacts.period_returns {
        write(PERIOD_RETURNS_FILE, export_period_returns_csv(tables)?)?;
    }
    if let Some(report) = artifacts.walk_forward {
        write(WALK_FORWARD_FILE, export_walk_forward_json(report)?)?;
    }
    if let Some(rows) = artifacts.sensitivity {
        write(SENSITIVITY_FILE, export_sensitivity_csv(rows)?)?;
    }
    Ok(run_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::SensitivityParam;
    use chrono::NaiveDate;

    fn points() -> Vec<EquityPoint> {
        let t0 = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 5, 0)
            .unwrap();
        vec![
            EquityPoint {
                timestamp: t0,
                portfolio_value: 1_000_000.0,
            },
            EquityPoint {
                timestamp: t0 + chrono::Duration::minutes(5),
                portfolio_value: 1_000_012.5,
            },
        ]
    }

    fn trade() -> TradeRecord {
        TradeRecord {
            side: PositionSide::Short,
            entry_bar: 3,
            entry_price: 100.0,
            entry_notional: 1_000.0,
            exit_bar: 9,
            exit_price: 95.0,
            exit_notional: 950.0,
            exit_reason: ExitReason::TakeProfit,
            shares: 10.0,
            gross_pnl: 50.0,
            entry_fee: 1.25,
            exit_fee: 1.2,
            net_pnl: 47.55,
        }
    }

    #[test]
    fn equity_csv_layout() {
        let csv = export_equity_csv(&points()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,portfolio_value");
        assert_eq!(lines[1], "2024-05-01 00:05:00,1000000.000000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn trades_csv_layout() {
        let csv = export_trades_csv(&[trade()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("side,entry_bar"));
        assert!(lines[1].starts_with("short,3,100.000000,9,95.000000,take_profit"));
        assert!(lines[1].ends_with(",2.45,47.55,6"));
    }

    #[test]
    fn sensitivity_csv_uses_short_labels() {
        let rows = vec![SensitivityRow {
            parameter: SensitivityParam::StopLoss,
            variation: "ORIGINAL".into(),
            value: 0.02,
            total_return: 0.1,
            max_drawdown: 0.05,
            sharpe: 1.5,
        }];
        let csv = export_sensitivity_csv(&rows).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("SL,ORIGINAL,0.020000"));
    }

    #[test]
    fn metrics_json_is_flat() {
        let m = PerformanceMetrics {
            final_value: 1_100.0,
            total_return: 0.1,
            trade_count: 4,
            ..PerformanceMetrics::default()
        };
        let value: serde_json::Value = serde_json::from_str(&export_metrics_json(&m).unwrap()).unwrap();
        assert_eq!(value["trade_count"], 4.0);
        assert_eq!(value["total_return"], 0.1);
    }

    #[test]
    fn walk_forward_json_round_trip() {
        let report = WalkForwardReport::from_windows(Vec::new());
        let json = export_walk_forward_json(&report).unwrap();
        assert_eq!(import_walk_forward_json(&json).unwrap(), report);
    }

    #[test]
    fn write_artifacts_only_present_parts() {
        let dir = tempfile::tempdir().unwrap();
        let pts = points();
        let trades = vec![trade()];
        let run_dir = write_artifacts(
            dir.path(),
            "abc123",
            &Artifacts {
                equity: Some(&pts),
                trades: Some(&trades),
                ..Artifacts::default()
            },
        )
        .unwrap();

        assert_eq!(run_dir, dir.path().join("abc123"));
        let equity = std::fs::read_to_string(run_dir.join(EQUITY_FILE)).unwrap();
        assert!(equity.starts_with("timestamp,portfolio_value\n"));
        assert!(run_dir.join(TRADES_FILE).exists());
        assert!(!run_dir.join(WALK_FORWARD_FILE).exists());
        assert!(!run_dir.join(SENSITIVITY_FILE).exists());
    }
}
