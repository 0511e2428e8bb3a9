pub mod error;
pub mod secret;

pub use error::{AppError, Result, GENERIC_FAILURE_MESSAGE};
pub use secret::ApiSecret;
