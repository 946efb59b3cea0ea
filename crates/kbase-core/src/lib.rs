//! Shared types, errors, configuration and corpus loading for the kbase
//! crates. Nothing in here knows about term weighting or reduction.
#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
