//! clap [Args](clap::Args) shared by the rangefetch commands

/// LogArgs struct for configuring the logger
mod log;
pub use log::{ColorMode, LogArgs, Verbosity};

/// StoreArgs struct for selecting the blob store and object
mod store;
pub use store::StoreArgs;
