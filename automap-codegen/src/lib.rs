//! # Automap Codegen
//!
//! Mapping code generation from automap schemas.
//!
//! This crate provides:
//! - The mapping planner (per-field strategy and shape adaptation)
//! - The emission driver (backend-neutral statement lists)
//! - A Rust rendering backend targeting `automap-core`
//! - Generator configuration loaded from `automap.json`
//! - Build script integration through [`generate_from_file`]

pub mod backend;
pub mod config;
pub mod emit;
pub mod error;
pub mod generator;
pub mod plan;
pub mod rust;

pub use backend::{Backend, EmittedFile};
pub use config::{CONFIG_FILE_NAME, GeneratorConfig};
pub use emit::{EmittedProcedure, ProcedureDescriptor, Registration, Statement, emit};
pub use error::CodegenError;
pub use generator::{Generated, Generator};
pub use plan::{Direction, FieldPlan, MappingPlan, Planner, ProcedurePlan, ShapeAdaptation};
pub use rust::RustBackend;

/// Generates Rust mapping code from a schema XML string with the default
/// configuration.
///
/// # Errors
/// Returns `CodegenError` if parsing, validation or planning fails.
pub fn generate_from_xml(xml: &str) -> Result<String, CodegenError> {
    let schema = automap_schema::parse_schema(xml)?;
    Generator::new(&schema).generate()
}

/// Generates Rust mapping code from a schema file.
///
/// A config file named [`CONFIG_FILE_NAME`] next to the schema is honoured
/// when present.
///
/// # Errors
/// Returns `CodegenError` if reading, parsing, validation or planning fails.
pub fn generate_from_file(path: &std::path::Path) -> Result<String, CodegenError> {
    let config = match path.parent() {
        Some(dir) => GeneratorConfig::load_or_default(dir.join(CONFIG_FILE_NAME))?,
        None => GeneratorConfig::default(),
    };
    let schema = automap_schema::parse_schema_file(path)?;
    Generator::with_config(&schema, config).generate()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUND_TRIP: &str = r#"<mappingSchema package="p">
        <sources>
            <source name="S">
                <field name="ID" type="int64"/>
                <field name="Label" type="string"/>
            </source>
        </sources>
        <functions>
            <function name="Upper" params="string" returns="string"/>
        </functions>
        <converters>
            <converter name="upper" function="Upper" kind="safe"/>
        </converters>
        <targets>
            <target name="T" from="S">
                <field name="ID" type="int64"/>
                <field name="Label" type="string" converter="upper"/>
            </target>
        </targets>
    </mappingSchema>"#;

    #[test]
    fn test_generate_round_trip() {
        let code = generate_from_xml(ROUND_TRIP).expect("Failed to generate");
        assert!(code.contains("registry.register_safe(\"upper\", upper);"));
        assert!(code.contains("impl T {"));
        assert!(code.contains("pub fn map_from(&mut self, src: &S) {"));
        assert!(code.contains("self.id = src.id.clone();"));
        assert!(code.contains("let converted = upper(src.label.clone());"));
        assert!(!code.contains("MapError::"));
    }

    #[test]
    fn test_generate_rejects_invalid_schema() {
        let xml = r#"<mappingSchema package="p">
            <targets><target name="T" from="Missing"/></targets>
        </mappingSchema>"#;
        let err = generate_from_xml(xml).unwrap_err();
        assert!(matches!(err, CodegenError::Validation { .. }));
    }

    #[test]
    fn test_generate_from_file_with_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let schema_path = dir.path().join("mapping.xml");
        std::fs::write(&schema_path, ROUND_TRIP).expect("write schema");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"generateInit": false, "header": "from config"}"#,
        )
        .expect("write config");

        let code = generate_from_file(&schema_path).expect("Failed to generate");
        assert!(code.starts_with("// from config\n"));
        assert!(!code.contains("register_converters"));
    }

    #[test]
    fn test_generate_from_missing_file() {
        let err = generate_from_file(std::path::Path::new("/nonexistent/mapping.xml")).unwrap_err();
        assert!(matches!(err, CodegenError::Parse(_)));
    }
}
