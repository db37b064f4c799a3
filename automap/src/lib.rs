//! # Automap
//!
//! Schema-driven field mapping code generation.
//!
//! Automap reads a mapping schema describing source record types, target
//! (DTO) record types and a converter catalogue, validates it, and generates
//! mapping procedures that copy, convert and recursively map fields between
//! them.
//!
//! ## Features
//!
//! - **Static validation** - Every problem reported at once, with suggestions
//! - **Shape-aware planning** - Pointer and sequence adaptations decided per field
//! - **Safe procedures** - No failure contract when nothing can fail
//! - **Bidirectional targets** - Reverse procedures through inverter functions
//! - **Build script integration** - Generate mappers into `OUT_DIR`
//!
//! ## Quick Start
//!
//! ```ignore
//! // build.rs
//! let code = automap::codegen::generate_from_file(Path::new("schemas/mapping.xml"))?;
//! std::fs::write(out_dir.join("mappers.rs"), code)?;
//!
//! // lib.rs
//! include!(concat!(env!("OUT_DIR"), "/mappers.rs"));
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Runtime converter registry and mapping errors
//! - [`schema`] - Schema model, XML parsing and validation
//! - [`codegen`] - Planning, emission and Rust rendering

pub mod prelude;

/// Runtime support for generated code.
pub mod core {
    pub use automap_core::*;
}

/// Schema model, parsing and validation.
pub mod schema {
    pub use automap_schema::*;
}

/// Mapping code generation.
pub mod codegen {
    pub use automap_codegen::*;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_pipeline() {
        use crate::prelude::*;

        let schema = parse_schema(
            r#"<mappingSchema package="p">
                <sources><source name="S"><field name="Name" type="string"/></source></sources>
                <targets><target name="T" from="S"><field name="Name" type="string"/></target></targets>
            </mappingSchema>"#,
        )
        .expect("Failed to parse schema");

        let report = Validator::new(&schema).validate();
        assert!(report.is_valid());

        let code = Generator::new(&schema).generate().expect("Failed to generate");
        assert!(code.contains("self.name = src.name.clone();"));
    }
}
