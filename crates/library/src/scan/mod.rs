//! Walk, filter, fingerprint, classify.
//!
//! The primary entry point is [`scan_events`], which streams progress while
//! the configured library roots are walked and every allowed file is
//! fingerprinted, and finishes with the classified change set. [`scan`]
//! drives the same stream and only returns the change set.
//!
//! A scan never writes: see [`apply()`](crate::apply()) for persisting the result.

pub mod error;
mod stream;

pub use self::stream::{ScanEvent, scan, scan_events};
