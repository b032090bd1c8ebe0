//! Walk-forward partitioning and orchestration.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use confluence_core::domain::PriceBar;
use confluence_core::engine::{enrich, IndicatorSettings};
use confluence_runner::objective::{Dataset, ObjectiveFunction};
use confluence_runner::RunConfig;
use confluence_runner::search::{ParamSpace, RandomSearch};
use confluence_runner::walk_forward::{
    run_walk_forward, WalkForwardPartitioner, WindowLengths, WindowSpec,
};

fn price_walk(n: usize, seed: u64) -> Vec<PriceBar> {
    let t0 = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut state = seed;
    let mut close = 60_000.0;
    (0..n)
        .map(|i| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let u = (state >> 11) as f64 / (1u64 << 53) as f64;
            close *= 1.0 + (u - 0.5) * 0.01;
            PriceBar {
                timestamp: t0 + Duration::minutes(5 * i as i64),
                close,
            }
        })
        .collect()
}

#[test]
fn month_week_week_over_20000_bars() {
    let p = WalkForwardPartitioner::rolling(20_000, WindowLengths::default());
    let windows: Vec<WindowSpec> = p.windows().collect();

    assert_eq!(windows[0].train, 0..8_640);
    assert_eq!(windows[0].test, 8_640..10_656);
    // starts 0, 2016, .., 8064; the next would end at 20736
    assert_eq!(windows.len(), 5);
    let last = windows.last().unwrap();
    assert_eq!(last.train.start, 8_064);
    assert_eq!(last.test.end, 18_720);
    assert!(last.train.start + 2_016 + 8_640 + 2_016 > 20_000);
}

#[test]
fn single_window_when_only_one_fits() {
    let p = WalkForwardPartitioner::rolling(12_000, WindowLengths::default());
    let windows: Vec<WindowSpec> = p.windows().collect();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].train.start, 0);
}

#[test]
fn end_to_end_rolling_run() {
    let bars = enrich(&price_walk(700, 11), &IndicatorSettings::default()).unwrap();
    let lengths = WindowLengths::new(200, 100, 100).unwrap();
    let partitioner = WalkForwardPartitioner::rolling(bars.len(), lengths);
    let expected = (bars.len() - 300) / 100 + 1;

    let objective = ObjectiveFunction::default();
    let optimizer = RandomSearch::new(8, 42);
    let space = ParamSpace::default();

    let report = run_walk_forward(
        Dataset::Bars(&bars),
        &partitioner,
        &objective,
        &optimizer,
        &space,
    );
    assert_eq!(report.windows.len(), expected);
    for (i, w) in report.windows.iter().enumerate() {
        assert_eq!(w.index, i);
        assert_eq!(w.test.start, w.train.end);
        assert!(space.contains(&w.best_params));
        assert!(w.test_metrics.final_value > 0.0);
    }

    let again = run_walk_forward(
        Dataset::Bars(&bars),
        &partitioner,
        &objective,
        &optimizer,
        &space,
    );
    assert_eq!(report, again);
}

#[test]
fn raw_prices_are_enriched_per_window() {
    let prices = price_walk(400, 5);
    let partitioner = WalkForwardPartitioner::splits(prices.len(), 3).unwrap();
    let report = run_walk_forward(
        Dataset::Prices(&prices),
        &partitioner,
        &ObjectiveFunction::default(),
        &RandomSearch::new(4, 1),
        &ParamSpace::default(),
    );
    assert_eq!(report.windows.len(), 3);
    assert_eq!(report.windows[2].train, 0..300);
    assert_eq!(report.windows[2].test, 300..400);
}

#[test]
fn too_short_yields_empty_report() {
    let prices = price_walk(50, 2);
    let partitioner =
        WalkForwardPartitioner::rolling(prices.len(), WindowLengths::new(40, 20, 20).unwrap());
    let report = run_walk_forward(
        Dataset::Prices(&prices),
        &partitioner,
        &ObjectiveFunction::default(),
        &RandomSearch::new(4, 1),
        &ParamSpace::default(),
    );
    assert!(report.windows.is_empty());
    assert_eq!(report.compounded_test_return, 0.0);
}

#[test]
fn windows_past_the_enriched_series_are_skipped() {
    // 400 prices lose 33 warmup rows; a partitioner sized on the raw count
    // asks for a test window ending at 400.
    let prices = price_walk(400, 9);
    let bars = enrich(&prices, &IndicatorSettings::default()).unwrap();
    assert_eq!(bars.len(), 367);

    let partitioner =
        WalkForwardPartitioner::rolling(prices.len(), WindowLengths::new(300, 100, 100).unwrap());
    let report = run_walk_forward(
        Dataset::Bars(&bars),
        &partitioner,
        &ObjectiveFunction::default(),
        &RandomSearch::new(4, 1),
        &ParamSpace::default(),
    );
    assert!(report.windows.is_empty());
    assert_eq!(report.compounded_test_return, 0.0);

    let partitioner =
        WalkForwardPartitioner::rolling(prices.len(), WindowLengths::new(200, 100, 50).unwrap());
    let report = run_walk_forward(
        Dataset::Bars(&bars),
        &partitioner,
        &ObjectiveFunction::default(),
        &RandomSearch::new(4, 1),
        &ParamSpace::default(),
    );
    // starts 0 and 50 fit in 367; 100 would end at 400
    assert_eq!(report.windows.len(), 2);
    assert!(report.windows.iter().all(|w| w.test.end <= bars.len()));
}

#[test]
fn best_params_report_the_enrichment_windows() {
    let config = RunConfig::from_toml_str("[params]\nrsi_window = 21\nbb_window = 30\n").unwrap();
    let bars = enrich(
        &price_walk(800, 17),
        &IndicatorSettings::from_params(&config.params),
    )
    .unwrap();
    let partitioner =
        WalkForwardPartitioner::rolling(bars.len(), WindowLengths::new(300, 100, 100).unwrap());

    let report = run_walk_forward(
        Dataset::Bars(&bars),
        &partitioner,
        &config.objective(),
        &RandomSearch::new(6, 3),
        &config.search_space(),
    );
    assert!(!report.windows.is_empty());
    for w in &report.windows {
        assert_eq!(w.best_params.rsi_window, 21);
        assert_eq!(w.best_params.bb_window, 30);
        assert_eq!(w.best_params.bb_std, config.params.bb_std);
    }
}

proptest! {
    #[test]
    fn rolling_windows_are_forward_only(
        len in 0usize..5_000,
        train in 1usize..500,
        test in 1usize..300,
        extra_step in 0usize..300,
    ) {
        let step = test + extra_step;
        let lengths = WindowLengths::new(train, test, step).unwrap();
        let windows: Vec<WindowSpec> =
            WalkForwardPartitioner::rolling(len, lengths).windows().collect();

        let expected = if len >= train + test { (len - train - test) / step + 1 } else { 0 };
        prop_assert_eq!(windows.len(), expected);

        for w in &windows {
            prop_assert_eq!(w.train.len(), train);
            prop_assert_eq!(w.test.len(), test);
            prop_assert_eq!(w.test.start, w.train.end);
            prop_assert!(w.test.end <= len);
        }
        for pair in windows.windows(2) {
            prop_assert!(pair[0].test.end <= pair[1].test.start);
            prop_assert!(pair[0].train.start < pair[1].train.start);
        }
    }

    #[test]
    fn split_windows_are_forward_only(len in 0usize..2_000, n in 1usize..20) {
        let windows: Vec<WindowSpec> =
            WalkForwardPartitioner::splits(len, n).unwrap().windows().collect();
        for w in &windows {
            prop_assert_eq!(w.train.start, 0);
            prop_assert!(w.test.start >= w.train.end);
            prop_assert!(!w.test.is_empty());
            prop_assert!(w.test.end <= len);
        }
        for pair in windows.windows(2) {
            prop_assert!(pair[0].test.end <= pair[1].test.start);
        }
    }
}
