//! # framescan-cli: command-line scanner
//!
//! Loads a still image as a frame source, plugs a QR decoder into the
//! decode worker, and runs the scan loop from `framescan-core` against it
//! so the whole pipeline can be exercised from a terminal.

pub mod config;
pub mod decoder;
pub mod source;
