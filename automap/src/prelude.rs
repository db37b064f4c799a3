//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! ```ignore
//! use automap::prelude::*;
//! ```

// Runtime types
pub use automap_core::{ConvertError, ConverterRegistry, Lookup, MapError};

// Schema types
pub use automap_schema::{
    Diagnostic, NamingPolicy, ParseError, Schema, Severity, TypeShape, ValidationReport,
    Validator, parse_schema, parse_schema_file,
};

// Codegen types
pub use automap_codegen::{
    CodegenError, Generated, Generator, GeneratorConfig, Planner, RustBackend,
    generate_from_file, generate_from_xml,
};
