//! Fibonacci retracement/extension targets and the roll-forward rule.

use serde::Serialize;
use tracing::debug;

use common::{Direction, PriceBar};

use crate::swing::{post_cross_fractal, Pivot, PivotSearch};

pub const RETRACEMENT_RATIO: f64 = 0.618;
pub const EXT_127_RATIO: f64 = 0.27;
pub const EXT_618_RATIO: f64 = 0.618;
pub const EXT_2618_RATIO: f64 = 1.618;

/// Levels projected from a pivot pair `(p, q)`, measured from `q`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibLevelSet {
    pub range: f64,
    pub retracement: f64,
    pub ext127: f64,
    pub ext618: f64,
    pub ext2618: f64,
}

impl FibLevelSet {
    pub fn from_prices(p: f64, q: f64, direction: Direction) -> Self {
        let range = (q - p).abs();
        let s = direction.sign();
        Self {
            range,
            retracement: q - s * RETRACEMENT_RATIO * range,
            ext127: q + s * EXT_127_RATIO * range,
            ext618: q + s * EXT_618_RATIO * range,
            ext2618: q + s * EXT_2618_RATIO * range,
        }
    }

    pub fn level(&self, which: TargetLevel) -> f64 {
        match which {
            TargetLevel::Ext127 => self.ext127,
            TargetLevel::Ext618 => self.ext618,
            TargetLevel::Ext2618 => self.ext2618,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLevel {
    Ext127,
    Ext618,
    Ext2618,
}

/// Pick the active extension from how price behaved after `q`:
/// a retracement touch selects 0.618, no touch and no 1.27 reach selects 1.27,
/// a 1.27 reach without a retracement selects 2.618.
pub fn select_target(levels: &FibLevelSet, after_q: &[PriceBar], direction: Direction) -> TargetLevel {
    let mut retraced = false;
    let mut reached_127 = false;

    for bar in after_q {
        match direction {
            Direction::Up => {
                retraced |= bar.low <= levels.retracement;
                reached_127 |= bar.high >= levels.ext127;
            }
            Direction::Down => {
                retraced |= bar.high >= levels.retracement;
                reached_127 |= bar.low <= levels.ext127;
            }
        }
    }

    if retraced {
        TargetLevel::Ext618
    } else if !reached_127 {
        TargetLevel::Ext127
    } else {
        TargetLevel::Ext2618
    }
}

/// The currently active target for one series context.
///
/// Owned by the caller; only `FibTargetCalculator::roll_forward` mutates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetState {
    pub active_level: f64,
    pub level: TargetLevel,
    pub direction: Direction,
    /// Incremented on every roll-forward.
    pub pivot_pair_generation: u64,
    pub pre: Pivot,
    pub post: Pivot,
    pub levels: FibLevelSet,
}

/// Outcome of one roll-forward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollStep {
    /// The latest close has not traded through the active target.
    Held,
    /// The pivot pair advanced and the target was recomputed.
    Advanced,
    /// The target was traded through but no later fractal exists yet.
    PendingNextPivot,
}

/// Final target resolution for a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TargetOutcome {
    NoTrend,
    /// A pre-swing pivot exists but the post-cross fractal has not formed.
    PivotPending { pre: Pivot },
    Active { state: TargetState },
    /// The last target was traded through; waiting for the next fractal.
    PendingNextPivot { state: TargetState },
}

impl TargetOutcome {
    /// The actionable target price, if one is active.
    pub fn target(&self) -> Option<f64> {
        match self {
            TargetOutcome::Active { state } => Some(state.active_level),
            _ => None,
        }
    }

    pub fn state(&self) -> Option<&TargetState> {
        match self {
            TargetOutcome::Active { state } | TargetOutcome::PendingNextPivot { state } => Some(state),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FibTargetCalculator;

impl FibTargetCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the target for a pivot pair, without rolling.
    pub fn compute(&self, bars: &[PriceBar], pre: Pivot, post: Pivot, direction: Direction) -> TargetState {
        let levels = FibLevelSet::from_prices(pre.price, post.price, direction);
        let after_q = bars.get(post.index + 1..).unwrap_or(&[]);
        let level = select_target(&levels, after_q, direction);
        TargetState {
            active_level: levels.level(level),
            level,
            direction,
            pivot_pair_generation: 0,
            pre,
            post,
            levels,
        }
    }

    /// Apply the roll-forward rule once.
    ///
    /// When the latest close trades through the active target, the old
    /// post-cross fractal becomes the new pre-swing pivot and the next
    /// fractal after it becomes the new post-cross pivot.
    pub fn roll_forward(&self, bars: &[PriceBar], state: &mut TargetState) -> RollStep {
        let Some(last) = bars.last() else {
            return RollStep::Held;
        };
        if !state.direction.reached(last.close, state.active_level) {
            return RollStep::Held;
        }

        let direction = state.direction;
        let Some(next_post) = post_cross_fractal(bars, direction, state.post.index) else {
            return RollStep::PendingNextPivot;
        };
        debug_assert!(next_post.index > state.post.index);

        let next_pre = Pivot::pre_swing(bars, state.post.index, direction);
        let generation = state.pivot_pair_generation + 1;
        *state = self.compute(bars, next_pre, next_post, direction);
        state.pivot_pair_generation = generation;

        debug!(
            generation,
            pre = next_pre.index,
            post = next_post.index,
            target = state.active_level,
            "Fibonacci target rolled forward"
        );
        RollStep::Advanced
    }

    /// Roll `state` forward until it holds or no further fractal exists.
    /// Terminates because every advance moves the post pivot strictly right.
    pub fn settle(&self, bars: &[PriceBar], mut state: TargetState) -> TargetOutcome {
        loop {
            match self.roll_forward(bars, &mut state) {
                RollStep::Advanced => continue,
                RollStep::Held => return TargetOutcome::Active { state },
                RollStep::PendingNextPivot => return TargetOutcome::PendingNextPivot { state },
            }
        }
    }

    /// Resolve a located pivot pair into a settled target.
    pub fn resolve(&self, bars: &[PriceBar], search: PivotSearch, direction: Direction) -> TargetOutcome {
        match search {
            PivotSearch::Pending { pre } => TargetOutcome::PivotPending { pre },
            PivotSearch::Found { pre, post } => {
                let state = self.compute(bars, pre, post, direction);
                self.settle(bars, state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn flat(time: i64, price: f64) -> PriceBar {
        PriceBar::new(time, price, price + 0.5, price - 0.5, price)
    }

    #[test]
    fn uptrend_levels() {
        let l = FibLevelSet::from_prices(100.0, 150.0, Direction::Up);
        assert!(approx(l.range, 50.0));
        assert!(approx(l.retracement, 119.1));
        assert!(approx(l.ext127, 163.5));
        assert!(approx(l.ext618, 180.9));
        assert!(approx(l.ext2618, 230.9));
    }

    #[test]
    fn downtrend_levels_mirror() {
        let l = FibLevelSet::from_prices(150.0, 100.0, Direction::Down);
        assert!(approx(l.retracement, 130.9));
        assert!(approx(l.ext127, 86.5));
        assert!(approx(l.ext618, 69.1));
        assert!(approx(l.ext2618, 19.1));
    }

    #[test]
    fn selection_policy() {
        let levels = FibLevelSet::from_prices(100.0, 150.0, Direction::Up);

        let quiet = [flat(1, 140.0), flat(2, 145.0)];
        assert_eq!(select_target(&levels, &quiet, Direction::Up), TargetLevel::Ext127);

        let retraced = [flat(1, 140.0), flat(2, 119.0)];
        assert_eq!(select_target(&levels, &retraced, Direction::Up), TargetLevel::Ext618);

        let extended = [flat(1, 160.0), flat(2, 164.0)];
        assert_eq!(select_target(&levels, &extended, Direction::Up), TargetLevel::Ext2618);

        // A retracement touch wins even after the 1.27 was reached.
        let both = [flat(1, 164.0), flat(2, 119.0)];
        assert_eq!(select_target(&levels, &both, Direction::Up), TargetLevel::Ext618);
    }

    #[test]
    fn no_bars_after_q_selects_127() {
        let levels = FibLevelSet::from_prices(10.0, 5.0, Direction::Down);
        assert_eq!(select_target(&levels, &[], Direction::Down), TargetLevel::Ext127);
    }

    #[test]
    fn roll_is_pending_without_next_fractal() {
        // Bar 2 is a high fractal; the last close (200) blows through every target.
        let bars = vec![
            flat(0, 100.0),
            flat(1, 101.0),
            PriceBar::new(2, 102.0, 110.0, 101.5, 102.0),
            flat(3, 103.0),
            flat(4, 104.0),
            PriceBar::new(5, 150.0, 200.5, 149.5, 200.0),
        ];
        let calc = FibTargetCalculator::new();
        let pre = Pivot::pre_swing(&bars, 0, Direction::Up);
        let post = Pivot::post_cross(&bars, 2, Direction::Up);
        let mut state = calc.compute(&bars, pre, post, Direction::Up);
        assert_eq!(calc.roll_forward(&bars, &mut state), RollStep::PendingNextPivot);
        assert_eq!(state.pivot_pair_generation, 0);
    }
}
