//! Device-side helpers for the CLI.
//!
//! The engine lives in fsa-probe-core; this module adds the interactive
//! pieces around it.

pub mod discovery;
pub mod interrupt;
