//! Load → optimize → evaluate → export, end to end.

use std::fmt::Write as _;

use chrono::{Duration, NaiveDate};

use confluence_core::domain::{Bar, PriceBar, StrategyParams};
use confluence_core::engine::{enrich, IndicatorSettings};
use confluence_runner::config::RunConfig;
use confluence_runner::data_loader::{load_csv, LoadOptions, SeriesData};
use confluence_runner::export::{write_artifacts, Artifacts, EQUITY_FILE, TRADES_FILE};
use confluence_runner::fitness::NO_TRADE_PENALTY;
use confluence_runner::objective::{Dataset, ObjectiveFunction};
use confluence_runner::pipeline::{simulate_bars, train_test};
use confluence_runner::search::ParamSpace;
use confluence_runner::sensitivity::{run_sensitivity, DEFAULT_FACTORS};

fn flat_bars(n: usize) -> Vec<Bar> {
    let t0 = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| Bar {
            timestamp: t0 + Duration::minutes(5 * i as i64),
            close: 100.0,
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            bb_lower: 95.0,
            bb_upper: 105.0,
        })
        .collect()
}

fn csv_walk(n: usize) -> String {
    let t0 = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut out = String::from("Datetime,Close\n");
    let mut close = 60_000.0_f64;
    for i in 0..n {
        // deterministic swing with a slow drift
        close *= 1.0 + 0.004 * ((i as f64) * 0.37).sin() + 0.0002;
        let ts = t0 + Duration::minutes(5 * i as i64);
        writeln!(out, "{},{close:.4}", ts.format("%Y-%m-%d %H:%M:%S")).unwrap();
    }
    out
}

#[test]
fn flat_market_scores_the_penalty() {
    let bars = flat_bars(50);
    let objective = ObjectiveFunction::default();
    let params = StrategyParams::default();

    let run = simulate_bars(&bars, &params, &objective);
    assert_eq!(run.metrics.total_return, 0.0);
    assert_eq!(run.metrics.max_drawdown, 0.0);
    assert_eq!(run.metrics.win_rate, 0.0);
    assert_eq!(run.metrics.trade_count, 0);
    assert_eq!(objective.score(&params, &bars), NO_TRADE_PENALTY);
    assert_eq!(run.period_returns.total_pct, 0.0);
}

#[test]
fn csv_to_artifacts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("prices.csv");
    std::fs::write(&data_path, csv_walk(400)).unwrap();

    let loaded = load_csv(&data_path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.len(), 400);
    assert_eq!(loaded.dropped_rows, 0);
    let prices: &[PriceBar] = match &loaded.series {
        SeriesData::Prices(p) => p,
        SeriesData::Bars(_) => panic!("raw close column should load as prices"),
    };
    let (train, test) = prices.split_at(250);

    let config = RunConfig::default();
    let outcome = train_test(
        Dataset::Prices(train),
        Dataset::Prices(test),
        &config.objective(),
        &confluence_runner::search::RandomSearch::new(10, config.search.seed),
        &ParamSpace::default(),
    )
    .unwrap();

    let expected_bars = enrich(test, &IndicatorSettings::default()).unwrap().len();
    assert_eq!(outcome.test.result.bar_count, expected_bars);
    assert_eq!(outcome.test.equity.len(), expected_bars);

    let out_dir = dir.path().join("out");
    let run_dir = write_artifacts(
        &out_dir,
        &config.run_id(),
        &Artifacts {
            equity: Some(&outcome.test.equity),
            trades: Some(&outcome.test.result.trades),
            metrics: Some(&outcome.test.metrics),
            ..Artifacts::default()
        },
    )
    .unwrap();

    let equity = std::fs::read_to_string(run_dir.join(EQUITY_FILE)).unwrap();
    let mut lines = equity.lines();
    assert_eq!(lines.next(), Some("timestamp,portfolio_value"));
    assert_eq!(lines.count(), expected_bars);

    let trades = std::fs::read_to_string(run_dir.join(TRADES_FILE)).unwrap();
    assert_eq!(trades.lines().count(), outcome.test.result.trades.len() + 1);
}

#[test]
fn sensitivity_on_enriched_bars() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("prices.csv");
    std::fs::write(&data_path, csv_walk(200)).unwrap();

    let loaded = load_csv(&data_path, &LoadOptions::default()).unwrap();
    let bars = loaded.to_bars(&IndicatorSettings::default()).unwrap();
    let rows = run_sensitivity(
        &bars,
        &StrategyParams::default(),
        &ObjectiveFunction::default(),
        &DEFAULT_FACTORS,
    );
    assert_eq!(rows.len(), 6);
    let originals: Vec<_> = rows.iter().filter(|r| r.variation == "ORIGINAL").collect();
    assert_eq!(originals.len(), 2);
    // the baseline is the same run for both parameters
    assert_eq!(originals[0].total_return, originals[1].total_return);
}
