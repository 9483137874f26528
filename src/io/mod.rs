//! Input/Output handling for the CLI.
//!
//! Error-to-exit-code mapping lives here so scripts driving `wenda` can tell
//! a missing index from a corrupted one.

pub mod exit_code;

pub use exit_code::ExitCode;
