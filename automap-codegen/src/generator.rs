//! Generation pipeline: validate, plan, emit, render.

use crate::backend::{Backend, EmittedFile};
use crate::config::GeneratorConfig;
use crate::emit::{emit, registrations};
use crate::error::CodegenError;
use crate::plan::{Planner, ProcedurePlan};
use crate::rust::RustBackend;
use automap_schema::{Schema, ValidationReport, Validator};
use std::collections::HashSet;
use tracing::{info, warn};

/// Output of a generation run.
#[derive(Debug, Clone)]
pub struct Generated {
    /// Rendered source text.
    pub code: String,
    /// Validation report, when the gate ran.
    pub report: Option<ValidationReport>,
    /// Number of generated procedures.
    pub procedures: usize,
}

/// Mapping code generator for a parsed schema.
pub struct Generator<'a> {
    schema: &'a Schema,
    config: GeneratorConfig,
}

impl<'a> Generator<'a> {
    /// Creates a generator with the default configuration.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self::with_config(schema, GeneratorConfig::default())
    }

    /// Creates a generator with an explicit configuration.
    #[must_use]
    pub fn with_config(schema: &'a Schema, config: GeneratorConfig) -> Self {
        Self { schema, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Validates the schema under the effective naming policy.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        Validator::with_policy(self.schema, self.config.naming_policy(self.schema)).validate()
    }

    /// Plans every procedure.
    ///
    /// # Errors
    /// Returns an error if a target declares an absent source.
    pub fn plan(&self) -> Result<Vec<ProcedurePlan>, CodegenError> {
        Planner::with_policy(self.schema, self.config.naming_policy(self.schema)).plan_schema()
    }

    /// Plans and lowers every procedure into a backend-neutral file.
    ///
    /// # Errors
    /// Returns an error if planning fails or two declared sources of one
    /// target produce the same procedure name.
    pub fn emit(&self) -> Result<EmittedFile, CodegenError> {
        let plans = self.plan()?;
        let mut seen = HashSet::new();
        for plan in &plans {
            if !seen.insert((plan.target.as_str(), plan.name.as_str())) {
                return Err(CodegenError::generation(format!(
                    "procedure {}::{} generated twice (source {})",
                    plan.target, plan.name, plan.source
                )));
            }
        }

        let procedures = plans.iter().map(emit).collect();
        Ok(EmittedFile {
            header: self.config.header.clone(),
            package: self.schema.package.clone(),
            registrations: self
                .config
                .generate_init
                .then(|| registrations(self.schema)),
            procedures,
        })
    }

    /// Runs the full pipeline with the Rust backend.
    ///
    /// # Errors
    /// Returns `CodegenError::Validation` if the gate is enabled and the
    /// schema has errors, or any planning error.
    pub fn run(&self) -> Result<Generated, CodegenError> {
        self.run_with(&RustBackend::new())
    }

    /// Runs the full pipeline with the given backend.
    ///
    /// # Errors
    /// Same as [`Generator::run`].
    pub fn run_with<B: Backend>(&self, backend: &B) -> Result<Generated, CodegenError> {
        let report = if self.config.validate {
            let report = self.validate();
            if !report.is_valid() {
                warn!(
                    errors = report.stats.errors,
                    "schema validation failed, no code generated"
                );
                return Err(CodegenError::validation(report));
            }
            Some(report)
        } else {
            None
        };

        let file = self.emit()?;
        let code = backend.render_file(&file);

        info!(
            package = %self.schema.package,
            targets = self.schema.targets.len(),
            procedures = file.procedures.len(),
            bytes = code.len(),
            "generated mapping code"
        );

        Ok(Generated {
            code,
            report,
            procedures: file.procedures.len(),
        })
    }

    /// Generates Rust code.
    ///
    /// # Errors
    /// Same as [`Generator::run`].
    pub fn generate(&self) -> Result<String, CodegenError> {
        Ok(self.run()?.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automap_schema::parse_schema;

    const INVALID: &str = r#"<mappingSchema package="p">
        <sources><source name="S"><field name="X" type="int"/></source></sources>
        <targets>
            <target name="T" from="S">
                <field name="X" type="int" dto="Missing"/>
            </target>
        </targets>
    </mappingSchema>"#;

    #[test]
    fn test_validation_gate_blocks_generation() {
        let schema = parse_schema(INVALID).expect("Failed to parse schema");
        let err = Generator::new(&schema).generate().unwrap_err();
        let report = err.report().expect("report");
        assert!(!report.is_valid());
        assert!(matches!(err, CodegenError::Validation { errors, .. } if errors >= 1));
    }

    #[test]
    fn test_gate_disabled() {
        let schema = parse_schema(INVALID).expect("Failed to parse schema");
        let generated = Generator::with_config(&schema, GeneratorConfig::new().validate(false))
            .run()
            .expect("generated");
        assert!(generated.report.is_none());
        assert_eq!(generated.procedures, 1);
        assert!(generated.code.contains("// X: nested target 'Missing' not found"));
        assert!(generated.code.contains(
            "#[allow(clippy::clone_on_copy, unused_variables)]\nimpl T {"
        ));
        assert!(generated.code.contains(
            "pub fn map_from(&mut self, src: Option<&S>) -> Result<(), MapError> {"
        ));
        assert!(generated.code.contains("return Err(MapError::NilSource);"));
    }

    #[test]
    fn test_generate_init_toggle() {
        let xml = r#"<mappingSchema package="p">
            <functions>
                <function name="Upper" params="string" returns="string" converter="true"/>
            </functions>
        </mappingSchema>"#;
        let schema = parse_schema(xml).expect("Failed to parse schema");

        let with_init = Generator::new(&schema).generate().expect("code");
        assert!(with_init.contains("registry.register_safe(\"Upper\", upper);"));

        let without = Generator::with_config(&schema, GeneratorConfig::new().generate_init(false))
            .generate()
            .expect("code");
        assert!(!without.contains("register_converters"));
    }

    #[test]
    fn test_colliding_procedure_names() {
        let xml = r#"<mappingSchema package="p">
            <sources>
                <source name="User"/>
                <source name="User" module="db" external="true"/>
            </sources>
            <targets><target name="T" from="User, db.User"/></targets>
        </mappingSchema>"#;
        let schema = parse_schema(xml).expect("Failed to parse schema");
        let err = Generator::new(&schema).generate().unwrap_err();
        assert!(matches!(err, CodegenError::Generation { .. }));
    }

    #[test]
    fn test_header_from_config() {
        let schema = parse_schema(r#"<mappingSchema package="p"/>"#).expect("schema");
        let code = Generator::with_config(&schema, GeneratorConfig::new().header("custom header"))
            .generate()
            .expect("code");
        assert!(code.starts_with("// custom header\n"));
    }
}
