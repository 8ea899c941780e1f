pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{AppConfig, ConfigError};
pub use infrastructure::AppContainer;
