//! # invgraph
//!
//! Administrative command line over the invgraph-core store.
//!
//! - `cli`: argument parsing and command execution
//! - `config`: the TOML configuration file
//! - `output`: JSON rendering of store objects

pub mod cli;
pub mod config;
pub mod output;
