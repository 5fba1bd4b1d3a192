#![doc = "drive-merge-core: core logic library for drive-merge."]

//! This crate contains the full merge pipeline for chunked PDFs stored in a
//! remote Drive folder: ordering, concatenation, publishing, clean-up and the
//! completion webhook. The CLI crate only adds argument parsing and config
//! loading on top of this.
//!
//! # Usage
//! Construct a [`drive::DriveClient`] (or any other [`contract::Storage`]
//! implementation) and run [`pipeline::run`].

pub mod auth;
pub mod config;
pub mod contract;
pub mod drive;
pub mod merge;
pub mod notify;
pub mod order;
pub mod pipeline;
