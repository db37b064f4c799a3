//! Rust code generation backend.
//!
//! Procedures become inherent methods on the target types, grouped into one
//! impl block per target. Absent pointers are `Option<T>`, sequences are
//! `Vec<T>`, and nested targets are allocated through `Default`.

pub mod procedures;
pub mod runtime;
pub mod types;

pub use procedures::ProcedureRenderer;

use crate::backend::{Backend, EmittedFile};
use crate::emit::{EmittedProcedure, Registration};
use types::type_path;

/// Backend emitting Rust source against `automap-core`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl RustBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Backend for RustBackend {
    fn render_procedure(&self, procedure: &EmittedProcedure) -> String {
        ProcedureRenderer::new(procedure).generate()
    }

    fn render_registrations(&self, registrations: &[Registration]) -> String {
        runtime::generate_registrations(registrations)
    }

    fn render_file(&self, file: &EmittedFile) -> String {
        let mut output = runtime::generate_prelude(&file.header, &file.package);

        if let Some(registrations) = &file.registrations {
            output.push_str(&self.render_registrations(registrations));
        }

        for group in file
            .procedures
            .chunk_by(|a, b| a.descriptor.receiver == b.descriptor.receiver)
        {
            let receiver = type_path(&group[0].descriptor.receiver);
            // Procedures whose fields are all skipped never read their argument.
            output.push_str("#[allow(clippy::clone_on_copy, unused_variables)]\n");
            output.push_str(&format!("impl {receiver} {{\n"));
            for (idx, procedure) in group.iter().enumerate() {
                if idx > 0 {
                    output.push('\n');
                }
                output.push_str(&self.render_procedure(procedure));
            }
            output.push_str("}\n\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::emit;
    use crate::plan::Planner;
    use automap_schema::parse_schema;

    #[test]
    fn test_groups_procedures_by_receiver() {
        let xml = r#"<mappingSchema package="p">
            <sources>
                <source name="S"><field name="ID" type="int64"/></source>
                <source name="R"><field name="ID" type="int64"/></source>
            </sources>
            <targets>
                <target name="T" from="S, R" bidirectional="true">
                    <field name="ID" type="int64"/>
                </target>
            </targets>
        </mappingSchema>"#;
        let schema = parse_schema(xml).expect("Failed to parse schema");
        let procedures = Planner::new(&schema)
            .plan_schema()
            .expect("plans")
            .iter()
            .map(emit)
            .collect();
        let file = EmittedFile {
            header: "generated".to_string(),
            package: "p".to_string(),
            registrations: None,
            procedures,
        };
        let code = RustBackend::new().render_file(&file);

        assert_eq!(code.matches("impl T {").count(), 1);
        assert!(code.contains("#[allow(clippy::clone_on_copy, unused_variables)]\nimpl T {"));
        assert!(code.contains("pub fn map_from_s(&mut self, src: &S) {"));
        assert!(code.contains("pub fn map_from_r(&mut self, src: &R) {"));
        assert!(code.contains("pub fn map_to_s(&self, dst: &mut S) {"));
        assert!(code.contains("pub fn map_to_r(&self, dst: &mut R) {"));
        assert!(!code.contains("register_converters"));
    }
}
