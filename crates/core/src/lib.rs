pub mod config;
pub mod error;
pub mod types;

pub use config::{load_settings, EnvironmentSettings};
pub use error::{Error, ErrorKind, Result};
pub use types::*;
