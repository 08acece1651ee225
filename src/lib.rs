//! # Celeste Converter
//!
//! Converts Celeste's run-length-encoded `.data` bitmaps to PNG and back,
//! across whole directory trees at once.
//!
//! # Architecture: Codec + Pipeline
//!
//! ```text
//! codec     one stream  →  one stream     (DATA ⇄ PNG, pure, stateless)
//! convert   from/ tree  →  to/ tree       (discovery, worker pool, error collection)
//! ```
//!
//! The pipeline never looks inside a file; it is handed one of the two codec
//! directions as a plain function. That keeps the codec testable on
//! in-memory buffers and the pipeline testable with stand-in conversions.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | DATA wire format: header, RLE decode with truncation tolerance, RLE encode with alpha detection |
//! | [`convert`] | Batch conversion of directory trees on a fixed worker pool |
//! | [`config`] | Optional TOML config layered over stock defaults |
//! | [`output`] | CLI formatting of progress events |
//!
//! # Design Decisions
//!
//! ## Truncated Files Still Convert
//!
//! Game assets in the wild are sometimes cut short. A DATA body that ends
//! before covering the canvas yields a full-size image padded with the
//! mode's default color, flagged as truncated rather than rejected. Only a
//! bad header fails a file.
//!
//! ## One Failure Does Not Stop the Batch
//!
//! Each file is independent. Failures are collected while the remaining
//! files convert; the caller sees the first one as the batch error and can
//! ask the error for the rest.

pub mod codec;
pub mod config;
pub mod convert;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
