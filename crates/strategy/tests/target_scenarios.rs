use common::{Direction, PriceBar, Series, Timeframe};
use strategy::fib::{FibTargetCalculator, RollStep, TargetLevel, TargetOutcome};
use strategy::swing::{locate, Pivot, PivotSearch};
use strategy::{Evaluator, SignalComposer, SymbolContext, TargetContext, TrendCrossDetector};

const HOUR: i64 = 3600;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ─── Single golden cross at 120, bullish fractal at 130 ─────────────────────

/// 300 bars: flat at 101 with the lowest low (100) at bar 110, an 11-bar ramp
/// from bar 120 whose last bar (130) spikes to a high of 150, then a flat
/// plateau that never touches 119.1 and never trades above 140.
fn cross_then_fractal() -> Vec<PriceBar> {
    (0..300)
        .map(|i| {
            let t = i as i64 * HOUR;
            match i {
                0..=119 => {
                    let low = if i == 110 { 100.0 } else { 100.5 };
                    PriceBar::new(t, 101.0, 101.5, low, 101.0)
                }
                120..=130 => {
                    let open = 101.0 + (i - 119) as f64 * 3.0;
                    let close = open + 2.0;
                    let high = if i == 130 { 150.0 } else { close + 0.5 };
                    PriceBar::new(t, open, high, open - 0.5, close)
                }
                _ => PriceBar::new(t, 139.5, 140.0, 139.0, 139.5),
            }
        })
        .collect()
}

fn short_period_evaluator() -> Evaluator {
    Evaluator::with_parts(
        TrendCrossDetector::new(5, 20),
        SignalComposer::default(),
        FibTargetCalculator::new(),
    )
}

#[test]
fn golden_cross_and_fractal_are_located() {
    let bars = cross_then_fractal();
    let cross = TrendCrossDetector::new(5, 20).detect(&bars);
    assert_eq!(cross.last_golden, Some(120));
    assert_eq!(cross.last_death, None);

    let trend = cross.trend().unwrap();
    assert_eq!(trend.direction, Direction::Up);

    match locate(&bars, &trend).unwrap() {
        PivotSearch::Found { pre, post } => {
            assert_eq!((pre.index, pre.price), (110, 100.0));
            assert_eq!((post.index, post.price), (130, 150.0));
        }
        other => panic!("expected a pivot pair, got {other:?}"),
    }
}

#[test]
fn end_to_end_selects_127_extension() {
    let bars = cross_then_fractal();
    let mut ctx = TargetContext::new();
    let (trend, outcome) = short_period_evaluator().target(&bars, &mut ctx);

    assert_eq!(trend.map(|t| t.cross_index), Some(120));
    let TargetOutcome::Active { state } = outcome else {
        panic!("expected an active target, got {outcome:?}");
    };
    assert!(approx(state.levels.range, 50.0));
    assert!(approx(state.levels.retracement, 119.1));
    assert!(approx(state.levels.ext127, 163.5));
    assert!(approx(state.levels.ext618, 180.9));
    assert!(approx(state.levels.ext2618, 230.9));
    assert_eq!(state.level, TargetLevel::Ext127);
    assert!(approx(state.active_level, 163.5));
    assert_eq!(state.pivot_pair_generation, 0);
}

#[test]
fn reaching_127_on_a_later_scan_promotes_2618() {
    let mut bars = cross_then_fractal();
    let evaluator = short_period_evaluator();
    let mut ctx = TargetContext::new();
    evaluator.target(&bars, &mut ctx);

    // New bar trades through 163.5 without retracing to 119.1.
    bars.push(PriceBar::new(300 * HOUR, 139.5, 170.5, 139.0, 170.0));
    let (_, outcome) = evaluator.target(&bars, &mut ctx);

    let state = outcome.state().unwrap();
    assert_eq!(state.level, TargetLevel::Ext2618);
    assert_eq!(outcome.target(), Some(state.levels.ext2618));
    assert_eq!(ctx.generation(), 2);
}

#[test]
fn daily_series_gets_its_own_target_and_memory() {
    let evaluator = short_period_evaluator();
    let mut daily_bars = cross_then_fractal();
    let daily = Series::new("TEST", Timeframe::Daily, daily_bars.clone()).unwrap();
    let hourly = Series::new("TEST", Timeframe::Hourly, daily_bars[..10].to_vec()).unwrap();
    let monthly = Series::empty("TEST", Timeframe::Monthly);
    let mut ctx = SymbolContext::default();

    let out = evaluator.evaluate(&daily, &hourly, &monthly, &mut ctx);
    assert_eq!(out.target, TargetOutcome::NoTrend);
    assert!(approx(out.daily_target.target().unwrap(), 163.5));
    assert!(ctx.hourly.state().is_none());
    assert_eq!(ctx.daily.state().unwrap().post.index, 130);

    // The daily pivot pair carries over, so reaching 163.5 later promotes 2618.
    daily_bars.push(PriceBar::new(300 * HOUR, 139.5, 170.5, 139.0, 170.0));
    let daily = Series::new("TEST", Timeframe::Daily, daily_bars).unwrap();
    let out = evaluator.evaluate(&daily, &hourly, &monthly, &mut ctx);
    assert!(approx(out.daily_target.target().unwrap(), 230.9));
    assert_eq!(ctx.daily.generation(), 2);
}

// ─── Roll-forward monotonicity ──────────────────────────────────────────────

/// Rising zigzag: each 6-bar cycle peaks 8 above its base, bases step by 10,
/// and a final bar closes far above every target.
fn rising_zigzag(cycles: usize) -> Vec<PriceBar> {
    const OFFSETS: [f64; 6] = [0.0, 2.0, 4.0, 8.0, 3.0, 1.0];
    let mut bars = Vec::new();
    for k in 0..cycles {
        let base = 100.0 + 10.0 * k as f64;
        for off in OFFSETS {
            let high = base + off;
            let t = bars.len() as i64 * HOUR;
            bars.push(PriceBar::new(t, high - 0.5, high, high - 1.0, high - 0.5));
        }
    }
    let t = bars.len() as i64 * HOUR;
    bars.push(PriceBar::new(t, 150.0, 10_000.5, 149.0, 10_000.0));
    bars
}

/// Reflect prices around `M` so highs become lows and the trend points down.
fn mirrored(bars: &[PriceBar]) -> Vec<PriceBar> {
    const M: f64 = 20_000.0;
    bars.iter()
        .map(|b| PriceBar::new(b.time, M - b.open, M - b.low, M - b.high, M - b.close))
        .collect()
}

/// Step the roll-forward rule from the first peak and record every target.
fn roll_targets(bars: &[PriceBar], direction: Direction) -> (Vec<f64>, Vec<usize>) {
    let calc = FibTargetCalculator::new();
    let pre = Pivot::pre_swing(bars, 0, direction);
    let post = Pivot::post_cross(bars, 3, direction);
    let mut state = calc.compute(bars, pre, post, direction);

    let mut targets = vec![state.active_level];
    let mut posts = vec![state.post.index];
    for _ in 0..bars.len() {
        match calc.roll_forward(bars, &mut state) {
            RollStep::Advanced => {
                targets.push(state.active_level);
                posts.push(state.post.index);
            }
            RollStep::PendingNextPivot => break,
            RollStep::Held => panic!("close should stay beyond every target"),
        }
    }
    (targets, posts)
}

#[test]
fn uptrend_roll_forward_raises_targets() {
    let bars = rising_zigzag(8);
    let (targets, posts) = roll_targets(&bars, Direction::Up);

    assert_eq!(targets.len(), 8, "one target per peak");
    assert!(approx(targets[0], 113.562));
    assert!(targets.windows(2).all(|w| w[1] > w[0]), "{targets:?}");
    assert!(posts.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn downtrend_roll_forward_lowers_targets() {
    let bars = mirrored(&rising_zigzag(8));
    let (targets, posts) = roll_targets(&bars, Direction::Down);

    assert_eq!(targets.len(), 8);
    assert!(targets.windows(2).all(|w| w[1] < w[0]), "{targets:?}");
    assert!(posts.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn settle_stops_when_no_fractal_remains() {
    let bars = rising_zigzag(5);
    let calc = FibTargetCalculator::new();
    let state = calc.compute(
        &bars,
        Pivot::pre_swing(&bars, 0, Direction::Up),
        Pivot::post_cross(&bars, 3, Direction::Up),
        Direction::Up,
    );

    match calc.settle(&bars, state) {
        TargetOutcome::PendingNextPivot { state } => {
            assert_eq!(state.pivot_pair_generation, 4);
            assert_eq!(state.post.index, 27);
            // The previous peak now anchors the pair at its low.
            assert_eq!(state.pre.index, 21);
            assert!(approx(state.pre.price, 137.0));
        }
        other => panic!("expected pending next pivot, got {other:?}"),
    }
}
