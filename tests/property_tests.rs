//! Property tests for pipeline invariants.
//!
//! 1. Snapshots stay finite for any positive bar stream
//! 2. A single step up in price is one breakout, not several
//! 3. Risk checks are pure: same holdings, same signals
//! 4. Order sizing never exceeds its budget and always fills whole lots
//! 5. Merging yields at most one signal per instrument

mod common;

use chrono::Duration;
use common::*;
use proptest::prelude::*;
use tradepipe::domain::bar::Tick;
use tradepipe::domain::execution::{merge_signals, target_quantity};
use tradepipe::domain::feature_engine::{FeatureConfig, FeatureEngine};
use tradepipe::domain::position::Holding;
use tradepipe::domain::risk::{RiskAction, RiskConfig, RiskMonitor, RiskSignal};
use tradepipe::domain::signal::{Direction, TradingSignal};

// ── Strategies ───────────────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_holding() -> impl Strategy<Value = Holding> {
    (0..4usize, -5..50i64, arb_price(), arb_price()).prop_map(|(i, lots, avg, cur)| Holding {
        instrument: format!("SH.60000{i}"),
        quantity: lots * 100,
        average_price: avg,
        current_price: cur,
    })
}

fn engine_with(code: &str) -> FeatureEngine {
    let mut engine = FeatureEngine::new(FeatureConfig::default());
    engine.register(code);
    engine
}

fn signal(code: &str, direction: Direction) -> TradingSignal {
    TradingSignal {
        instrument: code.to_string(),
        direction,
        reason: String::new(),
        suggested_price: 10.0,
        timestamp: chrono::NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap(),
        weight: 0.1,
        score: None,
    }
}

// ── 1. Finite snapshots ──────────────────────────────────────────────

proptest! {
    #[test]
    fn snapshot_is_finite_for_positive_bars(
        closes in prop::collection::vec(arb_price(), 1..80),
        daily in arb_price(),
    ) {
        let mut engine = engine_with(CODE);
        let day = utc(2024, 3, 1, 7, 0);
        engine.apply_tick(&Tick::new(day, vec![
            daily_bar(CODE, day, daily, "1"),
            benchmark_bar(day, 3500.0),
        ]));

        for (i, &close) in closes.iter().enumerate() {
            let ts = session_open() + Duration::minutes(i as i64);
            let open = if i == 0 { close } else { closes[i - 1] };
            let refreshed = engine.apply_tick(&Tick::new(ts, vec![intraday_bar(CODE, ts, open, close)]));
            prop_assert_eq!(refreshed, vec![CODE.to_string()]);

            let snapshot = engine.snapshot(CODE).unwrap();
            prop_assert_eq!(snapshot.first_non_finite(), None);
            prop_assert_eq!(snapshot.timestamp, Some(ts));
        }
    }
}

// ── 2. Breakout on a step ────────────────────────────────────────────

proptest! {
    #[test]
    fn step_series_breaks_out_once(
        base in arb_price(),
        jump in 0.01..5.0_f64,
        flat in 8..30usize,
        after in 1..20usize,
    ) {
        let mut engine = engine_with(CODE);
        let mut closes = vec![base; flat];
        closes.extend(std::iter::repeat_n(base + jump, after));

        let mut breakouts = Vec::new();
        for tick in minute_ticks(CODE, session_open(), &closes) {
            engine.apply_tick(&tick);
            breakouts.push(engine.snapshot(CODE).unwrap().breakout);
        }
        let fired: Vec<usize> = breakouts
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect();
        prop_assert_eq!(fired, vec![flat]);
    }
}

// ── 3. Risk checks ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn risk_checks_are_deterministic(holdings in prop::collection::vec(arb_holding(), 0..8)) {
        let monitor = RiskMonitor::new(RiskConfig::default());
        let first = monitor.check_risks(&holdings);
        let second = monitor.check_risks(&holdings);
        prop_assert_eq!(&first, &second);

        let active = holdings.iter().filter(|h| !h.is_flat()).count();
        prop_assert!(first.len() <= active);
        for risk in &first {
            prop_assert_eq!(risk.direction, Direction::Sell);
        }
    }

    #[test]
    fn risk_action_matches_threshold(holding in arb_holding()) {
        let config = RiskConfig::default();
        let risks = RiskMonitor::new(config).check_risks(std::slice::from_ref(&holding));
        let ratio = holding.profit_ratio();
        let expected = if holding.is_flat() {
            None
        } else if ratio <= -config.stop_loss_pct {
            Some(RiskAction::StopLoss)
        } else if ratio >= config.take_profit_pct {
            Some(RiskAction::TakeProfit)
        } else {
            None
        };
        prop_assert_eq!(risks.first().map(|r| r.action), expected);
    }
}

// ── 4. Sizing ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn target_quantity_fits_budget(
        value in 1_000.0..50_000_000.0_f64,
        weight in 0.01..1.0_f64,
        price in arb_price(),
        lot in 1..1000i64,
    ) {
        let qty = target_quantity(value, weight, price, lot);
        prop_assert!(qty >= 0);
        prop_assert_eq!(qty % lot, 0);
        prop_assert!(qty as f64 * price <= value * weight + 1e-6);
        // one more lot would overshoot
        prop_assert!((qty + lot) as f64 * price > value * weight - 1e-6);
    }
}

// ── 5. Merge ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_keeps_one_signal_per_instrument(
        picks in prop::collection::vec((0..4usize, 0..3u8), 0..12),
        risk_picks in prop::collection::vec(0..6usize, 0..6),
    ) {
        let directions = [Direction::Buy, Direction::Sell, Direction::Hold];
        let signals: Vec<TradingSignal> = picks
            .iter()
            .map(|&(i, d)| signal(&format!("SH.60000{i}"), directions[d as usize]))
            .collect();
        let risks: Vec<RiskSignal> = risk_picks
            .iter()
            .map(|&i| RiskSignal {
                instrument: format!("SH.60000{i}"),
                direction: Direction::Sell,
                action: RiskAction::StopLoss,
                trigger_price: 9.0,
            })
            .collect();

        let merged = merge_signals(&signals, &risks);
        let mut seen: Vec<&str> = merged.iter().map(|s| s.instrument.as_str()).collect();
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        prop_assert_eq!(seen.len(), total);

        for s in &merged {
            prop_assert!(signals.iter().any(|x| x.instrument == s.instrument));
            if risks.iter().any(|r| r.instrument == s.instrument) {
                prop_assert_eq!(s.direction, Direction::Sell);
                prop_assert_eq!(s.reason.as_str(), "StopLoss");
            }
        }
    }
}
