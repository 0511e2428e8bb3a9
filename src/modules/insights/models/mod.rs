pub mod insight;

pub use insight::{Content, InsightRequest, Part, UpstreamPayload};
