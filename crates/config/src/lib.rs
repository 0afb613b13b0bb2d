//! Standalone crate for rangefetch configuration types.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub use config::{Config, ConfigError, FetchConfig, HttpConfig, RetryConfig};
