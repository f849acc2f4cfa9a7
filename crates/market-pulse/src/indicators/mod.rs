//! Indicator computation: AP strength, IO order flow, MTS momentum, NPR net flow

pub mod engine;
pub mod flow;
pub mod strength;

pub use engine::{IndicatorEngine, IntervalScore, MomentumSignal, NetFlow};
pub use flow::{momentum_ratio, order_flow_ratio, volume_weighted_flow};
pub use strength::{BucketScore, StrengthScores, normalize_strength, strength_scores};
