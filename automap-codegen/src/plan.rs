//! Mapping planner.
//!
//! Decides, for every target field against a bound source field, which
//! strategy populates it and how pointer and sequence shapes are reconciled.
//! Priority is nested sequence, then nested scalar, then converter, then
//! direct assignment.

use crate::error::CodegenError;
use automap_schema::resolve::camel_to_snake;
use automap_schema::{
    FieldResolver, NamingPolicy, Schema, SchemaError, SignatureKind, SourceField,
    SourceRecordType, TargetField, TargetRecordType, TypeShape, base_types_compatible,
    unqualified,
};
use tracing::debug;

/// Mapping direction of a generated procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Populates the target from a source instance.
    Forward,
    /// Writes the target back into a source instance.
    Reverse,
}

impl Direction {
    /// Returns the procedure name prefix.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Forward => "map_from",
            Self::Reverse => "map_to",
        }
    }
}

/// Reconciliation between the pointer-ness of the read side and the
/// written side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeAdaptation {
    /// Plain pass-through.
    ValueToValue,
    /// Wraps a copy of the value.
    ValueToPointer,
    /// Acts only when the input is present; otherwise leaves the zero value.
    PointerToValue,
    /// Acts only when the input is present; otherwise leaves it absent.
    PointerToPointer,
}

impl ShapeAdaptation {
    /// Builds the adaptation from the two pointer flags.
    #[must_use]
    pub const fn between(from_pointer: bool, to_pointer: bool) -> Self {
        match (from_pointer, to_pointer) {
            (false, false) => Self::ValueToValue,
            (false, true) => Self::ValueToPointer,
            (true, false) => Self::PointerToValue,
            (true, true) => Self::PointerToPointer,
        }
    }

    /// Adaptation between two field shapes. Sequences count as values.
    #[must_use]
    pub fn of(from: &TypeShape, to: &TypeShape) -> Self {
        Self::between(from.is_pointer(), to.is_pointer())
    }

    /// Adaptation between the elements of two sequence shapes.
    #[must_use]
    pub fn of_elements(from: &TypeShape, to: &TypeShape) -> Self {
        Self::between(from.has_pointer_elements(), to.has_pointer_elements())
    }

    /// Returns true if the input must be checked for presence first.
    #[must_use]
    pub const fn is_guarded(&self) -> bool {
        matches!(self, Self::PointerToValue | Self::PointerToPointer)
    }

    /// Returns true if the written side is a pointer.
    #[must_use]
    pub const fn wraps(&self) -> bool {
        matches!(self, Self::ValueToPointer | Self::PointerToPointer)
    }
}

/// Call into another target's generated procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedCall {
    /// Nested target type name.
    pub target: String,
    /// Procedure invoked on the nested target.
    pub procedure: String,
    /// Whether the callee has a failure contract.
    pub fallible: bool,
}

/// Strategy selected for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingPlan {
    /// Excluded from mapping; listed in the ignored summary.
    Ignored,
    /// Not mapped; the reason is emitted as a comment.
    Skipped {
        /// Why the field is skipped.
        reason: String,
    },
    /// Plain assignment.
    Direct {
        /// Pointer adaptation.
        adaptation: ShapeAdaptation,
        /// Base types differ; an unguarded assignment is emitted as is.
        raw: bool,
    },
    /// Invocation of a converter function.
    Converter {
        /// Pointer adaptation.
        adaptation: ShapeAdaptation,
        /// Function invoked.
        function: String,
        /// Signature kind of the function.
        kind: SignatureKind,
    },
    /// Recursive mapping of a single nested record.
    NestedScalar {
        /// Pointer adaptation.
        adaptation: ShapeAdaptation,
        /// Nested procedure.
        call: NestedCall,
    },
    /// Recursive mapping of every element of a sequence.
    NestedSequence {
        /// Pointer adaptation of the elements.
        elements: ShapeAdaptation,
        /// Nested procedure.
        call: NestedCall,
    },
    /// Shape combination that cannot be lowered; emitted as a placeholder.
    Unsupported {
        /// Placeholder text.
        reason: String,
    },
}

impl MappingPlan {
    /// Returns true if the plan can never fail at runtime.
    ///
    /// Placeholders for nested mappings that cannot be lowered count as
    /// fallible, like the nested plans they stand in for.
    #[must_use]
    pub fn is_failure_free(&self) -> bool {
        match self {
            Self::Converter { kind, .. } => *kind == SignatureKind::Safe,
            Self::NestedScalar { .. } | Self::NestedSequence { .. } | Self::Unsupported { .. } => {
                false
            }
            Self::Ignored | Self::Skipped { .. } | Self::Direct { .. } => true,
        }
    }

    /// Returns true for nested strategies.
    #[must_use]
    pub const fn is_nested(&self) -> bool {
        matches!(self, Self::NestedScalar { .. } | Self::NestedSequence { .. })
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// Plan of one field inside a procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    /// Target field name, used in comments and error context.
    pub field: String,
    /// Field read from (on the procedure argument forward, on the receiver
    /// in reverse).
    pub input: Option<String>,
    /// Field written to.
    pub output: String,
    /// Selected strategy.
    pub plan: MappingPlan,
    /// Whether the field carries a nested reference, whatever it resolved to.
    pub nested: bool,
}

/// Plan of one generated procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedurePlan {
    /// Procedure name.
    pub name: String,
    /// Mapping direction.
    pub direction: Direction,
    /// Target type (the receiver).
    pub target: String,
    /// Qualified source type (the argument).
    pub source: String,
    /// Field plans in target declaration order.
    pub fields: Vec<FieldPlan>,
    /// Whether the procedure is generated without a failure contract.
    pub safe: bool,
}

impl ProcedurePlan {
    /// Returns the names of ignored fields.
    #[must_use]
    pub fn ignored_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.plan == MappingPlan::Ignored)
            .map(|f| f.field.clone())
            .collect()
    }
}

/// Returns true if a procedure made of `fields` needs no failure contract:
/// every plan is direct or a safe converter and no field is nested.
#[must_use]
pub fn is_safe(fields: &[FieldPlan]) -> bool {
    fields.iter().all(|f| !f.nested && f.plan.is_failure_free())
}

/// Returns the procedure name for `target` mapping against `source_name`.
///
/// The bare prefix is used when the target declares a single local source;
/// otherwise the snake-cased source name is appended.
#[must_use]
pub fn procedure_name(
    schema: &Schema,
    target: &TargetRecordType,
    source_name: &str,
    direction: Direction,
) -> String {
    let external = schema
        .get_source(source_name)
        .map_or(source_name.contains('.'), |s| s.is_external);
    if target.declared_sources.len() == 1 && !external {
        direction.prefix().to_string()
    } else {
        format!(
            "{}_{}",
            direction.prefix(),
            camel_to_snake(unqualified(source_name))
        )
    }
}

/// How far nested calls are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookahead {
    /// Resolve the callee's failure contract.
    Full,
    /// Assume the callee is fallible; enough to decide eligibility.
    Shallow,
}

/// Per-field mapping planner.
#[derive(Debug)]
pub struct Planner<'a> {
    schema: &'a Schema,
    resolver: FieldResolver,
}

impl<'a> Planner<'a> {
    /// Creates a planner using the schema's own naming policy.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self::with_policy(schema, schema.naming_policy)
    }

    /// Creates a planner with an overriding naming policy.
    #[must_use]
    pub fn with_policy(schema: &'a Schema, policy: NamingPolicy) -> Self {
        Self {
            schema,
            resolver: FieldResolver::new(policy),
        }
    }

    /// Plans a target field against its bound source field.
    #[must_use]
    pub fn plan(&self, field: &TargetField, source_field: &SourceField) -> MappingPlan {
        self.plan_with(field, source_field, Lookahead::Full)
    }

    /// Plans every procedure of the schema: one forward procedure per
    /// declared source, plus one reverse procedure per declared source of a
    /// bidirectional target.
    ///
    /// # Errors
    /// Returns `CodegenError::Schema` if a declared source is absent.
    pub fn plan_schema(&self) -> Result<Vec<ProcedurePlan>, CodegenError> {
        let mut plans = Vec::new();
        for target in &self.schema.targets {
            plans.extend(self.plan_target(target)?);
        }
        Ok(plans)
    }

    /// Plans every procedure of one target.
    ///
    /// # Errors
    /// Returns `CodegenError::Schema` if a declared source is absent.
    pub fn plan_target(&self, target: &TargetRecordType) -> Result<Vec<ProcedurePlan>, CodegenError> {
        let mut plans = Vec::with_capacity(target.declared_sources.len());
        for source_name in &target.declared_sources {
            plans.push(self.plan_forward(target, source_name)?);
        }
        if target.bidirectional {
            for source_name in &target.declared_sources {
                plans.push(self.plan_reverse(target, source_name)?);
            }
        }
        Ok(plans)
    }

    /// Plans the forward procedure of `target` from `source_name`.
    ///
    /// # Errors
    /// Returns `CodegenError::Schema` if the source is absent.
    pub fn plan_forward(
        &self,
        target: &TargetRecordType,
        source_name: &str,
    ) -> Result<ProcedurePlan, CodegenError> {
        let source = self.source(source_name)?;
        let fields: Vec<FieldPlan> = target
            .fields
            .iter()
            .map(|field| self.plan_entry(field, source, Lookahead::Full))
            .collect();

        for field in &fields {
            debug!(
                dto = %target.name,
                source = source_name,
                field = %field.field,
                plan = ?field.plan,
                "planned forward field"
            );
        }

        Ok(ProcedurePlan {
            name: procedure_name(self.schema, target, source_name, Direction::Forward),
            direction: Direction::Forward,
            target: target.name.clone(),
            source: source_name.to_string(),
            safe: is_safe(&fields),
            fields,
        })
    }

    /// Plans the reverse procedure of `target` into `source_name`.
    ///
    /// # Errors
    /// Returns `CodegenError::Schema` if the source is absent.
    pub fn plan_reverse(
        &self,
        target: &TargetRecordType,
        source_name: &str,
    ) -> Result<ProcedurePlan, CodegenError> {
        let source = self.source(source_name)?;
        let fields: Vec<FieldPlan> = target
            .fields
            .iter()
            .map(|field| self.plan_reverse_entry(field, source))
            .collect();

        for field in &fields {
            debug!(
                dto = %target.name,
                source = source_name,
                field = %field.field,
                plan = ?field.plan,
                "planned reverse field"
            );
        }

        Ok(ProcedurePlan {
            name: procedure_name(self.schema, target, source_name, Direction::Reverse),
            direction: Direction::Reverse,
            target: target.name.clone(),
            source: source_name.to_string(),
            safe: is_safe(&fields),
            fields,
        })
    }

    fn source(&self, name: &str) -> Result<&'a SourceRecordType, CodegenError> {
        self.schema
            .get_source(name)
            .ok_or_else(|| SchemaError::source_not_found(name).into())
    }

    fn plan_entry(
        &self,
        field: &TargetField,
        source: &SourceRecordType,
        lookahead: Lookahead,
    ) -> FieldPlan {
        let mut entry = FieldPlan {
            field: field.name.clone(),
            input: None,
            output: field.name.clone(),
            plan: MappingPlan::Ignored,
            nested: false,
        };
        if field.ignored {
            return entry;
        }
        entry.nested = field.nested_target_ref.is_some();

        match self.bound_field(field, source) {
            None => {
                entry.plan = MappingPlan::skipped("not found in source, will be zero value");
            }
            Some(source_field) => {
                entry.input = Some(source_field.name.clone());
                entry.plan = self.plan_with(field, source_field, lookahead);
            }
        }
        entry
    }

    fn bound_field<'s>(
        &self,
        field: &TargetField,
        source: &'s SourceRecordType,
    ) -> Option<&'s SourceField> {
        let name = self.resolver.resolve(field, source)?;
        source.get_field(&name)
    }

    fn plan_with(
        &self,
        field: &TargetField,
        source_field: &SourceField,
        lookahead: Lookahead,
    ) -> MappingPlan {
        let declared = &field.declared_shape;
        let bound = &source_field.shape;

        if let Some(nested) = &field.nested_target_ref {
            return self.plan_nested(nested, declared, bound, lookahead);
        }

        if let Some(converter) = &field.converter_ref {
            return match self.converter_function(converter) {
                Some((function, kind)) => MappingPlan::Converter {
                    adaptation: ShapeAdaptation::of(bound, declared),
                    function,
                    kind,
                },
                None => MappingPlan::skipped(format!("converter '{converter}' not found")),
            };
        }

        if shapes_assignable(bound, declared) {
            MappingPlan::Direct {
                adaptation: ShapeAdaptation::of(bound, declared),
                raw: false,
            }
        } else {
            MappingPlan::Direct {
                adaptation: ShapeAdaptation::ValueToValue,
                raw: true,
            }
        }
    }

    fn plan_nested(
        &self,
        nested_name: &str,
        declared: &TypeShape,
        bound: &TypeShape,
        lookahead: Lookahead,
    ) -> MappingPlan {
        let Some(nested) = self.schema.get_target(nested_name) else {
            return MappingPlan::Unsupported {
                reason: format!("nested target '{nested_name}' not found"),
            };
        };

        let source_type = bound.base_type_name();
        let Some(nested_source) = nested.declared_source_for(source_type) else {
            return MappingPlan::Unsupported {
                reason: format!("nested target '{nested_name}' does not map from {source_type}"),
            };
        };

        let call = NestedCall {
            target: nested.name.clone(),
            procedure: procedure_name(self.schema, nested, nested_source, Direction::Forward),
            fallible: match lookahead {
                Lookahead::Full => !self.forward_is_safe(nested, nested_source),
                Lookahead::Shallow => true,
            },
        };

        match (bound.is_sequence(), declared.is_sequence()) {
            (true, true) => MappingPlan::NestedSequence {
                elements: ShapeAdaptation::of_elements(bound, declared),
                call,
            },
            (false, false) => MappingPlan::NestedScalar {
                adaptation: ShapeAdaptation::of(bound, declared),
                call,
            },
            _ => MappingPlan::Unsupported {
                reason: "unsupported sequence mapping".to_string(),
            },
        }
    }

    /// Eligibility of a callee, decided without following its own nested
    /// references.
    fn forward_is_safe(&self, target: &TargetRecordType, source_name: &str) -> bool {
        let Some(source) = self.schema.get_source(source_name) else {
            return false;
        };
        let fields: Vec<FieldPlan> = target
            .fields
            .iter()
            .map(|field| self.plan_entry(field, source, Lookahead::Shallow))
            .collect();
        is_safe(&fields)
    }

    /// Resolves a converter reference to the invoked function and its kind.
    ///
    /// Falls back to a declared function of the same name when the
    /// catalogue has no such converter.
    fn converter_function(&self, name: &str) -> Option<(String, SignatureKind)> {
        if let Some(converter) = self.schema.get_converter(name) {
            let kind = self
                .schema
                .get_function(&converter.bound_function)
                .and_then(|f| f.signature_kind())
                .unwrap_or(converter.signature_kind);
            return Some((converter.bound_function.clone(), kind));
        }

        self.schema
            .get_function(name)
            .map(|f| (f.name.clone(), f.intended_kind()))
    }

    fn plan_reverse_entry(&self, field: &TargetField, source: &SourceRecordType) -> FieldPlan {
        let mut entry = FieldPlan {
            field: field.name.clone(),
            input: Some(field.name.clone()),
            output: field.name.clone(),
            plan: MappingPlan::Ignored,
            nested: false,
        };
        if field.ignored {
            entry.input = None;
            return entry;
        }
        entry.nested = field.nested_target_ref.is_some();

        let Some(source_field) = self.bound_field(field, source) else {
            entry.plan = MappingPlan::skipped("target field not found, skipped");
            return entry;
        };
        entry.output = source_field.name.clone();

        let declared = &field.declared_shape;
        let bound = &source_field.shape;

        entry.plan = if field.nested_target_ref.is_some() {
            MappingPlan::skipped("nested mapping is not inverted, skipped")
        } else if let Some(converter) = &field.converter_ref {
            let inverter = self
                .schema
                .get_converter(converter)
                .and_then(|c| self.schema.valid_inverter(c))
                .and_then(|f| f.signature_kind().map(|kind| (f.name.clone(), kind)));
            match inverter {
                Some((function, kind)) => MappingPlan::Converter {
                    adaptation: ShapeAdaptation::of(declared, bound),
                    function,
                    kind,
                },
                None => MappingPlan::skipped("converter has no inverter, skipped"),
            }
        } else if shapes_assignable(declared, bound) {
            MappingPlan::Direct {
                adaptation: ShapeAdaptation::of(declared, bound),
                raw: false,
            }
        } else {
            MappingPlan::skipped("type mismatch without converter, skipped")
        };
        entry
    }
}

/// Returns true if `from` can be assigned to `to` through a shape
/// adaptation: compatible base types, same sequence-ness and, for
/// sequences, same element pointer-ness.
fn shapes_assignable(from: &TypeShape, to: &TypeShape) -> bool {
    base_types_compatible(from.base_type_name(), to.base_type_name())
        && from.is_sequence() == to.is_sequence()
        && from.has_pointer_elements() == to.has_pointer_elements()
}
