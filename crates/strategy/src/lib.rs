pub mod config;
pub mod fib;
pub mod indicators;
pub mod pipeline;
pub mod projection;
pub mod signal;
pub mod swing;
pub mod trend;

pub use config::{EngineParams, UniverseFile};
pub use fib::{FibLevelSet, FibTargetCalculator, RollStep, TargetLevel, TargetOutcome, TargetState};
pub use pipeline::{Evaluation, Evaluator, SymbolContext, TargetContext};
pub use projection::{avg_monthly_return, cagr, projected_gain, ProjectionSchedule};
pub use signal::{SignalComposer, SignalState};
pub use swing::{Pivot, PivotRole, PivotSearch};
pub use trend::{CrossState, Trend, TrendCrossDetector};
