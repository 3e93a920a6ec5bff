//! End-to-end archiving suite
//!
//! Drives [`coldstore::Archiver`] against a scratch store and archive folder,
//! in plain and packaged mode, with and without a mapping file.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test archiving
//!
//! # Packaged mode only
//! cargo test --test archiving packaged::
//! ```

#[path = "../common/mod.rs"]
mod common;

pub mod lifecycle;
pub mod mapping;
pub mod packaged;
