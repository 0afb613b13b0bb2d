//! Fetch a remote object as concurrently downloaded byte-range partitions.
//!
//! The object is split into partitions, each partition is fetched by its own task and written to
//! its own file below the output directory.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod args;
pub mod cli;
pub mod commands;
pub mod store;
