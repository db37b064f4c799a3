//! Static validation of mapping schemas.
//!
//! The validator walks every target against every source it declares and
//! collects diagnostics in a single pass. It never fails: an empty report
//! means the schema is safe to generate from, and only `Error` diagnostics
//! block generation.

use crate::resolve::{FieldResolver, NamingPolicy};
use crate::shape::base_types_compatible;
use crate::types::{Schema, SourceField, SourceRecordType, TargetField, TargetRecordType};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Blocks generation.
    Error,
    /// Reported; generation proceeds.
    Warning,
}

impl Severity {
    /// Returns the report prefix for this severity.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Error => "[ERROR]",
            Self::Warning => "[WARN] ",
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Target record type name (empty for catalogue findings).
    pub target_name: String,
    /// Source record type name (empty for catalogue findings).
    pub source_name: String,
    /// Target field name (empty for type-level findings).
    pub field_name: String,
    /// Severity.
    pub severity: Severity,
    /// Description of the finding.
    pub message: String,
    /// Whether a mechanical schema edit resolves the finding.
    pub fixable: bool,
    /// Suggested remedy.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic without a location.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message.into())
    }

    /// Creates a warning diagnostic without a location.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message.into())
    }

    fn new(severity: Severity, message: String) -> Self {
        Self {
            target_name: String::new(),
            source_name: String::new(),
            field_name: String::new(),
            severity,
            message,
            fixable: false,
            suggestion: None,
        }
    }

    /// Sets the target/source/field location.
    #[must_use]
    pub fn at(mut self, target: &str, source: &str, field: &str) -> Self {
        self.target_name = target.to_string();
        self.source_name = source.to_string();
        self.field_name = field.to_string();
        self
    }

    /// Sets the suggested remedy.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Marks the finding as mechanically fixable.
    #[must_use]
    pub const fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    /// Returns true for error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.severity.prefix();
        if self.target_name.is_empty() {
            write!(f, "{prefix} {}", self.message)?;
        } else {
            write!(
                f,
                "{prefix} {}.{} -> {}.{}: {}",
                self.source_name, self.field_name, self.target_name, self.field_name, self.message
            )?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n         Suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Aggregate counts of a validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    /// Number of target record types.
    pub targets: usize,
    /// Number of source record types.
    pub sources: usize,
    /// Number of target fields.
    pub fields: usize,
    /// Number of error diagnostics.
    pub errors: usize,
    /// Number of warning diagnostics.
    pub warnings: usize,
}

/// Result of a validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All diagnostics, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    /// Aggregate counts.
    pub stats: ValidationStats,
}

impl ValidationReport {
    /// Returns true if no error was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.stats.errors == 0
    }

    /// Returns the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Returns the warning diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Renders warnings then errors, one diagnostic per entry.
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();
        for diagnostic in self.warnings().chain(self.errors()) {
            output.push_str(&diagnostic.to_string());
            output.push('\n');
        }
        output.push_str(&format!(
            "targets: {}, sources: {}, fields: {}, errors: {}, warnings: {}\n",
            self.stats.targets,
            self.stats.sources,
            self.stats.fields,
            self.stats.errors,
            self.stats.warnings
        ));
        output
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Full-schema static analyser.
#[derive(Debug)]
pub struct Validator<'a> {
    schema: &'a Schema,
    resolver: FieldResolver,
}

impl<'a> Validator<'a> {
    /// Creates a validator using the schema's own naming policy.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self::with_policy(schema, schema.naming_policy)
    }

    /// Creates a validator with an overriding naming policy.
    #[must_use]
    pub fn with_policy(schema: &'a Schema, policy: NamingPolicy) -> Self {
        Self {
            schema,
            resolver: FieldResolver::new(policy),
        }
    }

    /// Validates the whole schema.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        self.validate_converters(&mut report);

        for target in &self.schema.targets {
            debug!(
                dto = %target.name,
                sources = ?target.declared_sources,
                "validating target"
            );
            for source_name in &target.declared_sources {
                self.validate_mapping(target, source_name, &mut report);
            }
        }

        report.stats = ValidationStats {
            targets: self.schema.targets.len(),
            sources: self.schema.sources.len(),
            fields: self.schema.field_count(),
            errors: report.errors().count(),
            warnings: report.warnings().count(),
        };

        for diagnostic in report.warnings() {
            warn!("{diagnostic}");
        }
        for diagnostic in report.errors() {
            error!("{diagnostic}");
        }
        info!(
            targets = report.stats.targets,
            sources = report.stats.sources,
            fields = report.stats.fields,
            errors = report.stats.errors,
            warnings = report.stats.warnings,
            "validation finished"
        );

        report
    }

    /// Checks every catalogued converter against its bound function.
    fn validate_converters(&self, report: &mut ValidationReport) {
        for converter in self.schema.converters.values() {
            let Some(function) = self.schema.get_function(&converter.bound_function) else {
                report.push(
                    Diagnostic::error(format!(
                        "Converter function '{}' (for converter '{}') not found",
                        converter.bound_function, converter.name
                    ))
                    .with_suggestion(format!(
                        "Declare function '{}' or fix the function name of converter '{}'",
                        converter.bound_function, converter.name
                    )),
                );
                continue;
            };

            if function.matches(converter.signature_kind) {
                debug!(
                    converter = %converter.name,
                    kind = converter.signature_kind.as_str(),
                    "converter signature validated"
                );
            } else {
                report.push(
                    Diagnostic::error(format!(
                        "Converter function '{}' declared {} but has wrong signature (expected: {}, got: {} params, {} returns)",
                        function.name,
                        converter.signature_kind.as_str(),
                        converter.signature_kind.expected_signature(),
                        function.params.len(),
                        function.returns.len()
                    ))
                    .with_suggestion(format!(
                        "Change the signature to {} or fix the kind of converter '{}'",
                        converter.signature_kind.expected_signature(),
                        converter.name
                    )),
                );
            }
        }
    }

    /// Validates a single target against one of its declared sources.
    fn validate_mapping(
        &self,
        target: &TargetRecordType,
        source_name: &str,
        report: &mut ValidationReport,
    ) {
        let Some(source) = self.schema.get_source(source_name) else {
            report.push(
                Diagnostic::error("Source record type not found")
                    .at(&target.name, source_name, "")
                    .with_suggestion(format!(
                        "Declare {source_name} in the sources section or mark it external with its module"
                    )),
            );
            return;
        };

        for field in &target.fields {
            if field.ignored {
                debug!(dto = %target.name, field = %field.name, "skipping ignored field");
                continue;
            }
            self.validate_field(target, source, source_name, field, report);
        }
    }

    fn validate_field(
        &self,
        target: &TargetRecordType,
        source: &SourceRecordType,
        source_name: &str,
        field: &TargetField,
        report: &mut ValidationReport,
    ) {
        let at = |d: Diagnostic| d.at(&target.name, source_name, &field.name);

        let Some(binding) = self.resolver.bind(field, source) else {
            let wanted = field.explicit_source_name.as_deref().unwrap_or(&field.name);
            if field.has_directive() {
                report.push(at(Diagnostic::error(format!(
                    "Source field '{wanted}' not found"
                ))
                .with_suggestion(
                    "Check if the field name is correct or remove the mapping directive",
                )));
            } else {
                report.push(at(Diagnostic::warning(format!(
                    "Source field '{wanted}' not found, will use zero value"
                ))
                .fixable()
                .with_suggestion("Add ignore=\"true\" to the field to skip it explicitly, or add the source field")));
            }
            return;
        };

        if binding.is_ambiguous() {
            report.push(at(Diagnostic::warning(format!(
                "Ambiguous binding: {} also map to '{}', bound to '{}'",
                binding.also_matched.join(", "),
                field.name,
                binding.source_field
            ))
            .with_suggestion(format!(
                "Add source=\"{}\" to pick the source field explicitly",
                binding.source_field
            ))));
        }

        let Some(source_field) = source.get_field(&binding.source_field) else {
            return;
        };

        debug!(
            dto = %target.name,
            field = %field.name,
            declared = %field.declared_shape,
            bound = %binding.source_field,
            source_type = %source_field.shape,
            "validating field"
        );

        if let Some(nested) = &field.nested_target_ref {
            if field.converter_ref.is_some() {
                report.push(at(Diagnostic::warning(
                    "Converter ignored, nested reference takes precedence",
                )
                .fixable()
                .with_suggestion("Remove either the converter or the dto directive")));
            }
            self.validate_nested(target, field, nested, source_field, report, at);
        } else if let Some(converter) = &field.converter_ref {
            self.validate_converter_field(target, field, converter, source_field, report, at);
        } else {
            validate_direct(field, source_field, report, at);
        }
    }

    fn validate_nested(
        &self,
        target: &TargetRecordType,
        field: &TargetField,
        nested_name: &str,
        source_field: &SourceField,
        report: &mut ValidationReport,
        at: impl Fn(Diagnostic) -> Diagnostic,
    ) {
        let Some(nested) = self.schema.get_target(nested_name) else {
            report.push(at(Diagnostic::error(format!(
                "Nested target '{nested_name}' not found"
            ))
            .with_suggestion(format!(
                "Ensure {nested_name} is declared in the targets section"
            ))));
            return;
        };

        if self.detect_cycle(&target.name, nested_name) {
            report.push(at(Diagnostic::error(format!(
                "Circular dependency detected with {nested_name}"
            ))
            .with_suggestion("Remove circular references or use a converter instead")));
            return;
        }

        if field.declared_shape.is_sequence() != source_field.shape.is_sequence() {
            report.push(at(Diagnostic::error(format!(
                "Incompatible sequence/non-sequence types: {} vs {}",
                field.declared_shape, source_field.shape
            ))
            .with_suggestion(
                "Both source and destination must be sequences or both must be single values",
            )));
            return;
        }

        let source_type = source_field.shape.base_type_name();
        if nested.declared_source_for(source_type).is_none() {
            report.push(at(Diagnostic::error(format!(
                "Nested target '{nested_name}' does not map from {source_type}"
            ))
            .with_suggestion(format!("Add {source_type} to the sources of {nested_name}"))));
            return;
        }

        debug!(field = %field.name, nested = nested_name, "nested mapping valid");
    }

    fn validate_converter_field(
        &self,
        target: &TargetRecordType,
        field: &TargetField,
        converter_name: &str,
        source_field: &SourceField,
        report: &mut ValidationReport,
        at: impl Fn(Diagnostic) -> Diagnostic,
    ) {
        let Some(converter) = self.schema.get_converter(converter_name) else {
            report.push(at(Diagnostic::error(format!(
                "Converter '{converter_name}' not found"
            ))
            .with_suggestion("Declare the converter in the converters section")));
            return;
        };

        let source_type = source_field.shape.base_type_name();
        if source_type == field.declared_shape.base_type_name() {
            report.push(at(Diagnostic::warning(format!(
                "Converter specified but types are identical: {source_type}"
            ))
            .fixable()
            .with_suggestion(
                "Remove the converter for direct assignment or verify this is intentional",
            )));
        }

        if target.bidirectional && self.schema.valid_inverter(converter).is_none() {
            let message = match &converter.inverter_function {
                None => format!(
                    "Converter '{converter_name}' has no inverter, field skipped in reverse mapping"
                ),
                Some(inverter) => format!(
                    "Inverter '{inverter}' of converter '{converter_name}' is missing or has an invalid signature, field skipped in reverse mapping"
                ),
            };
            report.push(at(Diagnostic::warning(message).with_suggestion(format!(
                "Declare a function with inverts=\"{}\"",
                converter.bound_function
            ))));
        }
    }

    /// Returns true if `current` is reachable again from `nested`.
    fn detect_cycle(&self, current: &str, nested: &str) -> bool {
        let mut visited = HashSet::new();
        self.can_reach(nested, current, &mut visited)
    }

    fn can_reach<'s>(&'s self, from: &'s str, to: &str, visited: &mut HashSet<&'s str>) -> bool {
        if from == to {
            return true;
        }
        if !visited.insert(from) {
            return false;
        }

        self.schema.get_target(from).is_some_and(|target| {
            target
                .nested_references()
                .any(|next| self.can_reach(next, to, visited))
        })
    }
}

fn validate_direct(
    field: &TargetField,
    source_field: &SourceField,
    report: &mut ValidationReport,
    at: impl Fn(Diagnostic) -> Diagnostic,
) {
    let declared = &field.declared_shape;
    let bound = &source_field.shape;

    if !base_types_compatible(declared.base_type_name(), bound.base_type_name()) {
        report.push(at(Diagnostic::error(format!(
            "Type mismatch: {declared} <- {bound} (cannot convert without converter)"
        ))
        .fixable()
        .with_suggestion("Add a converter: converter=\"YourConverter\"")));
        return;
    }

    if declared.is_sequence() != bound.is_sequence() {
        report.push(at(Diagnostic::error(format!(
            "Incompatible sequence/non-sequence types: {declared} <- {bound}"
        ))
        .with_suggestion("Use a converter to map between a sequence and a single value")));
        return;
    }

    if declared.has_pointer_elements() != bound.has_pointer_elements() {
        report.push(at(Diagnostic::error(format!(
            "Incompatible sequence element types: {declared} <- {bound}"
        ))
        .with_suggestion("Map the elements through a dto directive or a converter")));
        return;
    }

    if declared.is_pointer() != bound.is_pointer() {
        report.push(at(Diagnostic::warning(format!(
            "Pointer conversion: {declared} <- {bound}"
        ))
        .with_suggestion("Verify this pointer conversion is intentional")));
    }
}
