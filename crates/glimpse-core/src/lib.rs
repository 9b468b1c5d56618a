//! Core domain model for glimpse.
//!
//! This crate defines the catalog record, vector, and dataset types, and
//! the paired vector/metadata stores that persist a dataset on disk in
//! either the positional or the keyed layout.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod store;

pub use error::{Error, Result};
