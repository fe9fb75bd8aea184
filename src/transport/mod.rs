//! Command-line transport

pub mod cli;
