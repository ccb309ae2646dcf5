pub mod config;
pub mod duration;
pub mod types;

pub use config::{ClientConfig, ConfigError, EamsConfig, RobberConfig, COOKIE_ENV};
pub use duration::parse_duration;
pub use types::*;
