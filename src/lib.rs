#![doc = "drive-merge: CLI for merging chunked PDFs from a Drive folder."]

//! Thin binary crate: argument parsing, config loading and process output
//! live here; everything else is in `drive-merge-core`.

pub mod cli;
pub mod load_config;
