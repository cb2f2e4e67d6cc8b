//! Library surface of the `column-recon` binary: configuration loading and
//! logging setup.

#![deny(unsafe_code)]

pub mod config;
pub mod logging;
