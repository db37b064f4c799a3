//! # Automap Core
//!
//! Runtime support linked by code generated with `automap-codegen`.
//!
//! This crate provides:
//! - A name-keyed converter registry with typed lookup
//! - Error types returned by generated mapping procedures
//! - Runtime conversion dispatch (`ConverterRegistry::convert`)

pub mod error;
pub mod registry;

pub use error::{BoxError, ConvertError, MapError, Result};
pub use registry::{ConverterFn, ConverterRegistry, Lookup};
