//! `modctl_cli` is a library containing the argument parser, error type, and
//! terminal styling shared by the `modctl` binary.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod args;
pub mod error;
pub mod styles;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use args::*;
pub use error::*;
