//! # Automap Schema
//!
//! Mapping schema model, parser and validator.
//!
//! This crate provides:
//! - Target/source record type definitions and the converter catalogue
//! - Type shape classification (scalar, pointer, sequence)
//! - Field binding resolution with naming policies
//! - XML schema parsing
//! - Static validation producing structured diagnostics

pub mod error;
pub mod parser;
pub mod resolve;
pub mod shape;
pub mod types;
pub mod validation;

pub use error::{ParseError, SchemaError};
pub use parser::{parse_schema, parse_schema_file};
pub use resolve::{Binding, BindingKind, FieldResolver, NamingPolicy};
pub use shape::{TypeShape, base_types_compatible, classify, unqualified};
pub use types::{
    ConverterDef, FunctionSig, Schema, SignatureKind, SourceField, SourceRecordType, TargetField,
    TargetRecordType,
};
pub use validation::{Diagnostic, Severity, ValidationReport, ValidationStats, Validator};
