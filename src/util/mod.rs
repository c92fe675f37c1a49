//! Common utilities for the library.
//!
//! Includes the bounded archive reader used by every decoder.

pub use error::{Error, Result};

pub mod file;

mod error;
