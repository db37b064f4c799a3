//! Emission driver.
//!
//! Lowers a [`ProcedurePlan`] into a backend-neutral statement list. Every
//! procedure starts with an argument guard and ends with a success return;
//! ignored fields produce no statement and are carried in the summary.

use crate::plan::{Direction, FieldPlan, MappingPlan, NestedCall, ProcedurePlan, ShapeAdaptation};
use automap_schema::{Schema, SignatureKind};
use tracing::debug;

/// Readable location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Field of the procedure's input record.
    Input(String),
    /// Local binding.
    Binding(String),
    /// Location on the written record.
    Output(Place),
}

/// Writable location on the output record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    /// A field.
    Field(String),
    /// An element of a sequence field.
    Element {
        /// Sequence field.
        field: String,
        /// Loop index binding.
        index: String,
    },
}

/// Value expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Copy of a location.
    Copy(Operand),
    /// Binding moved into place.
    Move(String),
    /// Pointer wrapping a value.
    Some(Box<Value>),
}

impl Value {
    fn wrapped(self, wrap: bool) -> Self {
        if wrap { Self::Some(Box::new(self)) } else { self }
    }
}

/// Context attached to a propagated failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorContext {
    /// Converter failure on a field.
    Convert {
        /// Target field name.
        field: String,
    },
    /// Nested mapping failure on a field.
    Nested {
        /// Target field name.
        field: String,
    },
    /// Nested mapping failure on a sequence element.
    NestedElement {
        /// Target field name.
        field: String,
        /// Loop index binding.
        index: String,
    },
}

/// Initial contents of a presized output sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fill {
    /// One default value of the element type per input element.
    Values(String),
    /// One absent pointer per input element.
    Absent,
    /// Empty, with capacity for every input element.
    Empty,
}

/// Backend-neutral statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Fails with the nil-argument error when the argument is absent.
    /// Backends whose safe procedures cannot receive an absent argument
    /// render nothing for it.
    GuardArgument,
    /// Comment line.
    Comment(String),
    /// Scoped statement group.
    Block(Vec<Statement>),
    /// Runs `body` with `binding` set to the pointee when `operand` is
    /// present.
    IfPresent {
        /// Pointer location.
        operand: Operand,
        /// Binding for the pointee.
        binding: String,
        /// Guarded statements.
        body: Vec<Statement>,
    },
    /// Introduces a binding.
    Let {
        /// Binding name.
        binding: String,
        /// Bound value.
        value: Value,
    },
    /// Writes a value.
    Assign {
        /// Written location.
        place: Place,
        /// Written value.
        value: Value,
    },
    /// Calls a converter function and binds its result.
    Invoke {
        /// Result binding.
        binding: String,
        /// Called function.
        function: String,
        /// Argument.
        argument: Value,
    },
    /// Propagates a failure held by a fallible converter result.
    CheckFailure {
        /// Result binding, rebound to the success value.
        binding: String,
        /// Failure context.
        context: ErrorContext,
    },
    /// Binds a freshly defaulted nested record.
    Allocate {
        /// Binding name.
        binding: String,
        /// Record type.
        type_name: String,
    },
    /// Calls a nested procedure.
    MapNested {
        /// Record the procedure runs on.
        receiver: Operand,
        /// Procedure name.
        procedure: String,
        /// Record passed as argument.
        argument: Operand,
        /// Propagation context; absent for callees without a failure
        /// contract.
        check: Option<ErrorContext>,
    },
    /// Sizes an output sequence after an input sequence.
    Presize {
        /// Output field.
        field: String,
        /// Input field.
        source: String,
        /// Initial contents.
        fill: Fill,
    },
    /// Iterates an input sequence.
    Loop {
        /// Input field.
        source: String,
        /// Index binding, when the body needs it.
        index: Option<String>,
        /// Element binding.
        item: String,
        /// Loop body.
        body: Vec<Statement>,
    },
    /// Appends to an output sequence.
    Append {
        /// Output field.
        field: String,
        /// Appended value.
        value: Value,
    },
    /// Ends the procedure successfully.
    ReturnSuccess,
}

/// Signature of a generated procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureDescriptor {
    /// Receiver (target) type.
    pub receiver: String,
    /// Argument (source) type.
    pub parameter: String,
    /// Procedure name.
    pub name: String,
    /// Mapping direction.
    pub direction: Direction,
    /// Whether the procedure has a failure contract.
    pub fallible: bool,
}

/// Lowered procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedProcedure {
    /// Signature.
    pub descriptor: ProcedureDescriptor,
    /// Body.
    pub statements: Vec<Statement>,
    /// Ignored field names, for the summary comment.
    pub ignored: Vec<String>,
}

/// Converter registration emitted in the init routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Converter name.
    pub name: String,
    /// Registered function.
    pub function: String,
    /// Signature kind.
    pub kind: SignatureKind,
}

const VALUE: &str = "value";
const RESULT: &str = "converted";
const NESTED: &str = "nested";
const INDEX: &str = "i";
const ITEM: &str = "item";

/// Lowers a procedure plan.
#[must_use]
pub fn emit(plan: &ProcedurePlan) -> EmittedProcedure {
    let mut statements = vec![Statement::GuardArgument];
    for field in &plan.fields {
        statements.extend(lower_field(field));
    }
    statements.push(Statement::ReturnSuccess);

    debug!(
        dto = %plan.target,
        procedure = %plan.name,
        statements = statements.len(),
        "emitted procedure"
    );

    EmittedProcedure {
        descriptor: ProcedureDescriptor {
            receiver: plan.target.clone(),
            parameter: plan.source.clone(),
            name: plan.name.clone(),
            direction: plan.direction,
            fallible: !plan.safe,
        },
        statements,
        ignored: plan.ignored_fields(),
    }
}

/// Lists the converter registrations of a schema, in converter name order.
///
/// Converters whose function is not declared are left out.
#[must_use]
pub fn registrations(schema: &Schema) -> Vec<Registration> {
    schema
        .converters
        .values()
        .filter_map(|converter| {
            let Some(function) = schema.get_function(&converter.bound_function) else {
                debug!(converter = %converter.name, "converter function not declared, not registered");
                return None;
            };
            Some(Registration {
                name: converter.name.clone(),
                function: function.name.clone(),
                kind: function.signature_kind().unwrap_or(converter.signature_kind),
            })
        })
        .collect()
}

fn lower_field(field: &FieldPlan) -> Vec<Statement> {
    let name = &field.field;
    let Some(input) = field.input.as_deref() else {
        return match &field.plan {
            MappingPlan::Skipped { reason } | MappingPlan::Unsupported { reason } => {
                vec![Statement::Comment(format!("{name}: {reason}"))]
            }
            _ => Vec::new(),
        };
    };
    let output = &field.output;

    match &field.plan {
        MappingPlan::Ignored => Vec::new(),
        MappingPlan::Skipped { reason } | MappingPlan::Unsupported { reason } => {
            vec![Statement::Comment(format!("{name}: {reason}"))]
        }
        MappingPlan::Direct { raw: true, .. } => vec![
            Statement::Comment(format!("{name}: base types differ, assigned as is")),
            Statement::Assign {
                place: Place::Field(output.clone()),
                value: Value::Copy(Operand::Input(input.to_string())),
            },
        ],
        MappingPlan::Direct { adaptation, .. } => lower_direct(*adaptation, input, output),
        MappingPlan::Converter {
            adaptation,
            function,
            kind,
        } => lower_converter(*adaptation, function, *kind, name, input, output),
        MappingPlan::NestedScalar { adaptation, call } => {
            lower_nested_scalar(*adaptation, call, name, input, output)
        }
        MappingPlan::NestedSequence { elements, call } => {
            lower_nested_sequence(*elements, call, name, input, output)
        }
    }
}

/// Wraps `body` in a presence check of the input field when the adaptation
/// reads through a pointer, or in a plain block otherwise. `body` receives
/// the operand it reads from.
fn adapt(
    adaptation: ShapeAdaptation,
    input: &str,
    body: impl FnOnce(Operand) -> Vec<Statement>,
) -> Statement {
    if adaptation.is_guarded() {
        Statement::IfPresent {
            operand: Operand::Input(input.to_string()),
            binding: VALUE.to_string(),
            body: body(Operand::Binding(VALUE.to_string())),
        }
    } else {
        Statement::Block(body(Operand::Input(input.to_string())))
    }
}

fn lower_direct(adaptation: ShapeAdaptation, input: &str, output: &str) -> Vec<Statement> {
    let place = Place::Field(output.to_string());
    match adaptation {
        ShapeAdaptation::ValueToValue => vec![Statement::Assign {
            place,
            value: Value::Copy(Operand::Input(input.to_string())),
        }],
        ShapeAdaptation::ValueToPointer => vec![Statement::Block(vec![
            Statement::Let {
                binding: VALUE.to_string(),
                value: Value::Copy(Operand::Input(input.to_string())),
            },
            Statement::Assign {
                place,
                value: Value::Some(Box::new(Value::Move(VALUE.to_string()))),
            },
        ])],
        ShapeAdaptation::PointerToValue | ShapeAdaptation::PointerToPointer => {
            vec![adapt(adaptation, input, |operand| {
                vec![Statement::Assign {
                    place,
                    value: Value::Copy(operand).wrapped(adaptation.wraps()),
                }]
            })]
        }
    }
}

fn lower_converter(
    adaptation: ShapeAdaptation,
    function: &str,
    kind: SignatureKind,
    field: &str,
    input: &str,
    output: &str,
) -> Vec<Statement> {
    vec![adapt(adaptation, input, |operand| {
        let mut body = vec![Statement::Invoke {
            binding: RESULT.to_string(),
            function: function.to_string(),
            argument: Value::Copy(operand),
        }];
        if kind == SignatureKind::Fallible {
            body.push(Statement::CheckFailure {
                binding: RESULT.to_string(),
                context: ErrorContext::Convert {
                    field: field.to_string(),
                },
            });
        }
        body.push(Statement::Assign {
            place: Place::Field(output.to_string()),
            value: Value::Move(RESULT.to_string()).wrapped(adaptation.wraps()),
        });
        body
    })]
}

/// Allocates a nested record and maps `argument` into it.
fn map_into_fresh(call: &NestedCall, argument: Operand, check: Option<ErrorContext>) -> [Statement; 2] {
    [
        Statement::Allocate {
            binding: NESTED.to_string(),
            type_name: call.target.clone(),
        },
        Statement::MapNested {
            receiver: Operand::Binding(NESTED.to_string()),
            procedure: call.procedure.clone(),
            argument,
            check,
        },
    ]
}

fn lower_nested_scalar(
    adaptation: ShapeAdaptation,
    call: &NestedCall,
    field: &str,
    input: &str,
    output: &str,
) -> Vec<Statement> {
    let check = call.fallible.then(|| ErrorContext::Nested {
        field: field.to_string(),
    });
    vec![adapt(adaptation, input, |operand| {
        let mut body = Vec::from(map_into_fresh(call, operand, check));
        body.push(Statement::Assign {
            place: Place::Field(output.to_string()),
            value: Value::Move(NESTED.to_string()).wrapped(adaptation.wraps()),
        });
        body
    })]
}

fn lower_nested_sequence(
    elements: ShapeAdaptation,
    call: &NestedCall,
    field: &str,
    input: &str,
    output: &str,
) -> Vec<Statement> {
    // Compaction appends, so the index is only needed for error context.
    let indexed = elements != ShapeAdaptation::PointerToValue || call.fallible;
    let check = call.fallible.then(|| ErrorContext::NestedElement {
        field: field.to_string(),
        index: INDEX.to_string(),
    });
    let slot = Place::Element {
        field: output.to_string(),
        index: INDEX.to_string(),
    };
    let item = Operand::Binding(ITEM.to_string());

    let (fill, body) = match elements {
        ShapeAdaptation::ValueToValue => (
            Fill::Values(call.target.clone()),
            vec![Statement::MapNested {
                receiver: Operand::Output(slot),
                procedure: call.procedure.clone(),
                argument: item,
                check,
            }],
        ),
        ShapeAdaptation::ValueToPointer => {
            let mut body = Vec::from(map_into_fresh(call, item, check));
            body.push(Statement::Assign {
                place: slot,
                value: Value::Some(Box::new(Value::Move(NESTED.to_string()))),
            });
            (Fill::Absent, body)
        }
        ShapeAdaptation::PointerToPointer => {
            let mut guarded =
                Vec::from(map_into_fresh(call, Operand::Binding(VALUE.to_string()), check));
            guarded.push(Statement::Assign {
                place: slot,
                value: Value::Some(Box::new(Value::Move(NESTED.to_string()))),
            });
            (
                Fill::Absent,
                vec![Statement::IfPresent {
                    operand: item,
                    binding: VALUE.to_string(),
                    body: guarded,
                }],
            )
        }
        ShapeAdaptation::PointerToValue => {
            let mut guarded =
                Vec::from(map_into_fresh(call, Operand::Binding(VALUE.to_string()), check));
            guarded.push(Statement::Append {
                field: output.to_string(),
                value: Value::Move(NESTED.to_string()),
            });
            (
                Fill::Empty,
                vec![Statement::IfPresent {
                    operand: item,
                    binding: VALUE.to_string(),
                    body: guarded,
                }],
            )
        }
    };

    vec![
        Statement::Presize {
            field: output.to_string(),
            source: input.to_string(),
            fill,
        },
        Statement::Loop {
            source: input.to_string(),
            index: indexed.then(|| INDEX.to_string()),
            item: ITEM.to_string(),
            body,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Planner;
    use automap_schema::parse_schema;

    fn flatten(statements: &[Statement]) -> Vec<&Statement> {
        let mut out = Vec::new();
        for statement in statements {
            out.push(statement);
            match statement {
                Statement::Block(body)
                | Statement::IfPresent { body, .. }
                | Statement::Loop { body, .. } => out.extend(flatten(body)),
                _ => {}
            }
        }
        out
    }

    fn field_plan(plan: MappingPlan) -> ProcedurePlan {
        let safe = plan.is_failure_free();
        let nested = plan.is_nested();
        ProcedurePlan {
            name: "map_from".to_string(),
            direction: Direction::Forward,
            target: "T".to_string(),
            source: "S".to_string(),
            fields: vec![FieldPlan {
                field: "F".to_string(),
                input: Some("f".to_string()),
                output: "F".to_string(),
                plan,
                nested,
            }],
            safe,
        }
    }

    fn body(plan: MappingPlan) -> Vec<Statement> {
        let emitted = emit(&field_plan(plan));
        let n = emitted.statements.len();
        emitted.statements[1..n - 1].to_vec()
    }

    #[test]
    fn test_guard_and_return_framing() {
        let emitted = emit(&field_plan(MappingPlan::Ignored));
        assert_eq!(
            emitted.statements,
            vec![Statement::GuardArgument, Statement::ReturnSuccess]
        );
        assert_eq!(emitted.ignored, vec!["F"]);
        assert!(!emitted.descriptor.fallible);
    }

    #[test]
    fn test_direct_guard_table() {
        let cases = [
            (ShapeAdaptation::ValueToValue, false),
            (ShapeAdaptation::ValueToPointer, false),
            (ShapeAdaptation::PointerToValue, true),
            (ShapeAdaptation::PointerToPointer, true),
        ];
        for (adaptation, guarded) in cases {
            let statements = body(MappingPlan::Direct {
                adaptation,
                raw: false,
            });
            assert_eq!(statements.len(), 1);
            assert_eq!(
                matches!(statements[0], Statement::IfPresent { .. }),
                guarded,
                "{adaptation:?}"
            );
            let wrapped = flatten(&statements).into_iter().any(|s| {
                matches!(s, Statement::Assign { value: Value::Some(_), .. })
            });
            assert_eq!(wrapped, adaptation.wraps(), "{adaptation:?}");
        }
    }

    #[test]
    fn test_raw_direct_is_unguarded() {
        let statements = body(MappingPlan::Direct {
            adaptation: ShapeAdaptation::ValueToValue,
            raw: true,
        });
        assert!(matches!(statements[0], Statement::Comment(_)));
        assert_eq!(
            statements[1],
            Statement::Assign {
                place: Place::Field("F".to_string()),
                value: Value::Copy(Operand::Input("f".to_string())),
            }
        );
    }

    #[test]
    fn test_fallible_converter_checks_failure() {
        let statements = body(MappingPlan::Converter {
            adaptation: ShapeAdaptation::PointerToValue,
            function: "Parse".to_string(),
            kind: SignatureKind::Fallible,
        });
        let flat = flatten(&statements);
        assert!(flat.iter().any(|s| matches!(
            s,
            Statement::CheckFailure {
                context: ErrorContext::Convert { field },
                ..
            } if field == "F"
        )));

        let safe = body(MappingPlan::Converter {
            adaptation: ShapeAdaptation::ValueToValue,
            function: "Upper".to_string(),
            kind: SignatureKind::Safe,
        });
        assert!(
            !flatten(&safe)
                .iter()
                .any(|s| matches!(s, Statement::CheckFailure { .. }))
        );
    }

    fn call(fallible: bool) -> NestedCall {
        NestedCall {
            target: "ItemDTO".to_string(),
            procedure: "map_from".to_string(),
            fallible,
        }
    }

    #[test]
    fn test_pointer_to_value_sequence_compacts() {
        let statements = body(MappingPlan::NestedSequence {
            elements: ShapeAdaptation::PointerToValue,
            call: call(false),
        });
        assert_eq!(
            statements[0],
            Statement::Presize {
                field: "F".to_string(),
                source: "f".to_string(),
                fill: Fill::Empty,
            }
        );
        let Statement::Loop { index, .. } = &statements[1] else {
            panic!("expected loop");
        };
        assert!(index.is_none());
        let flat = flatten(&statements);
        assert!(flat.iter().any(|s| matches!(s, Statement::Append { .. })));
        assert!(!flat.iter().any(|s| matches!(s, Statement::Assign { .. })));
    }

    #[test]
    fn test_sequence_fills() {
        let cases = [
            (ShapeAdaptation::ValueToValue, Fill::Values("ItemDTO".to_string())),
            (ShapeAdaptation::ValueToPointer, Fill::Absent),
            (ShapeAdaptation::PointerToPointer, Fill::Absent),
        ];
        for (elements, expected) in cases {
            let statements = body(MappingPlan::NestedSequence {
                elements,
                call: call(true),
            });
            let Statement::Presize { fill, .. } = &statements[0] else {
                panic!("expected presize");
            };
            assert_eq!(fill, &expected);
            assert!(flatten(&statements).iter().any(|s| matches!(
                s,
                Statement::MapNested {
                    check: Some(ErrorContext::NestedElement { .. }),
                    ..
                }
            )));
        }
    }

    #[test]
    fn test_nested_scalar_without_failure_contract() {
        let statements = body(MappingPlan::NestedScalar {
            adaptation: ShapeAdaptation::PointerToPointer,
            call: call(false),
        });
        let flat = flatten(&statements);
        assert!(flat.iter().any(|s| matches!(
            s,
            Statement::MapNested { check: None, argument: Operand::Binding(_), .. }
        )));
    }

    #[test]
    fn test_reverse_skip_comment() {
        let xml = r#"<mappingSchema package="p">
            <sources>
                <source name="S"><field name="When" type="time.Time"/></source>
            </sources>
            <functions>
                <function name="Format" params="time.Time" returns="string" converter="true"/>
            </functions>
            <targets>
                <target name="T" from="S" bidirectional="true">
                    <field name="When" type="string" converter="Format"/>
                </target>
            </targets>
        </mappingSchema>"#;
        let schema = parse_schema(xml).expect("Failed to parse schema");
        let plans = Planner::new(&schema).plan_schema().expect("plans");
        let reverse = emit(&plans[1]);
        assert_eq!(reverse.descriptor.direction, Direction::Reverse);
        assert!(reverse.statements.contains(&Statement::Comment(
            "When: converter has no inverter, skipped".to_string()
        )));
    }

    #[test]
    fn test_registrations() {
        let xml = r#"<mappingSchema package="p">
            <functions>
                <function name="Upper" params="string" returns="string"/>
                <function name="ParseAge" params="string" returns="int, error" converter="true"/>
            </functions>
            <converters>
                <converter name="upper" function="Upper"/>
                <converter name="ghost" function="Missing"/>
            </converters>
        </mappingSchema>"#;
        let schema = parse_schema(xml).expect("Failed to parse schema");
        assert_eq!(
            registrations(&schema),
            vec![
                Registration {
                    name: "ParseAge".to_string(),
                    function: "ParseAge".to_string(),
                    kind: SignatureKind::Fallible,
                },
                Registration {
                    name: "upper".to_string(),
                    function: "Upper".to_string(),
                    kind: SignatureKind::Safe,
                },
            ]
        );
    }
}
