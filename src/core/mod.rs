pub mod config;
pub mod error;
pub mod types;

pub use config::ArmConfig;
pub use error::{ArmError, Result};
