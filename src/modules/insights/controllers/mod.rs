pub mod insight_controller;

pub use insight_controller::{configure, generate_insight, InsightState};
