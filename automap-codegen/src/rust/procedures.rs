//! Mapping method rendering.

use super::types::{field_ident, function_path, type_path};
use crate::emit::{EmittedProcedure, ErrorContext, Fill, Operand, Place, Statement, Value};
use crate::plan::Direction;

/// Renders one emitted procedure as an inherent method.
pub struct ProcedureRenderer<'a> {
    procedure: &'a EmittedProcedure,
    /// Record read from.
    input: &'static str,
    /// Record written to.
    output: &'static str,
}

impl<'a> ProcedureRenderer<'a> {
    /// Creates a renderer for `procedure`.
    #[must_use]
    pub fn new(procedure: &'a EmittedProcedure) -> Self {
        let (input, output) = match procedure.descriptor.direction {
            Direction::Forward => ("src", "self"),
            Direction::Reverse => ("self", "dst"),
        };
        Self {
            procedure,
            input,
            output,
        }
    }

    /// Generates the method, indented for an impl block.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();
        let descriptor = &self.procedure.descriptor;
        let receiver = type_path(&descriptor.receiver);
        let parameter = type_path(&descriptor.parameter);

        match descriptor.direction {
            Direction::Forward => output.push_str(&format!(
                "    /// Populates `{receiver}` from `{parameter}`.\n"
            )),
            Direction::Reverse => output.push_str(&format!(
                "    /// Writes `{receiver}` back into `{parameter}`.\n"
            )),
        }
        if !self.procedure.ignored.is_empty() {
            output.push_str("    ///\n");
            output.push_str(&format!(
                "    /// Ignored fields: {}.\n",
                self.procedure.ignored.join(", ")
            ));
        }

        // Safe procedures borrow the argument directly; an absent record
        // only exists under the failure contract.
        let argument = match (descriptor.direction, descriptor.fallible) {
            (Direction::Forward, true) => format!("&mut self, src: Option<&{parameter}>"),
            (Direction::Forward, false) => format!("&mut self, src: &{parameter}"),
            (Direction::Reverse, true) => format!("&self, dst: Option<&mut {parameter}>"),
            (Direction::Reverse, false) => format!("&self, dst: &mut {parameter}"),
        };
        let returns = if descriptor.fallible {
            " -> Result<(), MapError>"
        } else {
            ""
        };
        output.push_str(&format!(
            "    pub fn {}({argument}){returns} {{\n",
            descriptor.name
        ));

        for statement in &self.procedure.statements {
            self.render_statement(&mut output, statement, 2);
        }

        output.push_str("    }\n");
        output
    }

    fn render_statement(&self, output: &mut String, statement: &Statement, depth: usize) {
        let pad = "    ".repeat(depth);
        match statement {
            Statement::GuardArgument => {
                if !self.procedure.descriptor.fallible {
                    return;
                }
                let (binding, error) = match self.procedure.descriptor.direction {
                    Direction::Forward => ("src", "MapError::NilSource"),
                    Direction::Reverse => ("dst", "MapError::NilDestination"),
                };
                output.push_str(&format!("{pad}let Some({binding}) = {binding} else {{\n"));
                output.push_str(&format!("{pad}    return Err({error});\n"));
                output.push_str(&format!("{pad}}};\n"));
            }
            Statement::Comment(text) => {
                output.push_str(&format!("{pad}// {text}\n"));
            }
            Statement::Block(body) => {
                output.push_str(&format!("{pad}{{\n"));
                self.render_body(output, body, depth + 1);
                output.push_str(&format!("{pad}}}\n"));
            }
            Statement::IfPresent {
                operand,
                binding,
                body,
            } => {
                let scrutinee = match operand {
                    Operand::Binding(name) => name.clone(),
                    other => format!("&{}", self.operand(other)),
                };
                output.push_str(&format!("{pad}if let Some({binding}) = {scrutinee} {{\n"));
                self.render_body(output, body, depth + 1);
                output.push_str(&format!("{pad}}}\n"));
            }
            Statement::Let { binding, value } => {
                output.push_str(&format!("{pad}let {binding} = {};\n", self.value(value)));
            }
            Statement::Assign { place, value } => {
                output.push_str(&format!(
                    "{pad}{} = {};\n",
                    self.place(place),
                    self.value(value)
                ));
            }
            Statement::Invoke {
                binding,
                function,
                argument,
            } => {
                output.push_str(&format!(
                    "{pad}let {binding} = {}({});\n",
                    function_path(function),
                    self.value(argument)
                ));
            }
            Statement::CheckFailure { binding, context } => {
                output.push_str(&format!(
                    "{pad}let {binding} = {binding}.map_err(|err| {})?;\n",
                    error_constructor(context)
                ));
            }
            Statement::Allocate { binding, type_name } => {
                output.push_str(&format!(
                    "{pad}let mut {binding} = {}::default();\n",
                    type_path(type_name)
                ));
            }
            Statement::MapNested {
                receiver,
                procedure,
                argument,
                check,
            } => {
                // Unchecked callees are safe and take a plain reference.
                let argument = match (argument, check.is_some()) {
                    (Operand::Binding(name), true) => format!("Some({name})"),
                    (Operand::Binding(name), false) => name.clone(),
                    (other, true) => format!("Some(&{})", self.operand(other)),
                    (other, false) => format!("&{}", self.operand(other)),
                };
                let call = format!("{}.{procedure}({argument})", self.operand(receiver));
                match check {
                    Some(context) => output.push_str(&format!(
                        "{pad}{call}.map_err(|err| {})?;\n",
                        error_constructor(context)
                    )),
                    None => output.push_str(&format!("{pad}{call};\n")),
                }
            }
            Statement::Presize {
                field,
                source,
                fill,
            } => {
                let len = format!("{}.{}.len()", self.input, field_ident(source));
                let init = match fill {
                    Fill::Values(type_name) => format!(
                        "std::iter::repeat_with({}::default).take({len}).collect()",
                        type_path(type_name)
                    ),
                    Fill::Absent => format!("std::iter::repeat_with(|| None).take({len}).collect()"),
                    Fill::Empty => format!("Vec::with_capacity({len})"),
                };
                output.push_str(&format!(
                    "{pad}{}.{} = {init};\n",
                    self.output,
                    field_ident(field)
                ));
            }
            Statement::Loop {
                source,
                index,
                item,
                body,
            } => {
                let sequence = format!("{}.{}", self.input, field_ident(source));
                match index {
                    Some(index) => output.push_str(&format!(
                        "{pad}for ({index}, {item}) in {sequence}.iter().enumerate() {{\n"
                    )),
                    None => output.push_str(&format!("{pad}for {item} in &{sequence} {{\n")),
                }
                self.render_body(output, body, depth + 1);
                output.push_str(&format!("{pad}}}\n"));
            }
            Statement::Append { field, value } => {
                output.push_str(&format!(
                    "{pad}{}.{}.push({});\n",
                    self.output,
                    field_ident(field),
                    self.value(value)
                ));
            }
            Statement::ReturnSuccess => {
                if self.procedure.descriptor.fallible {
                    output.push_str(&format!("{pad}Ok(())\n"));
                }
            }
        }
    }

    fn render_body(&self, output: &mut String, body: &[Statement], depth: usize) {
        for statement in body {
            self.render_statement(output, statement, depth);
        }
    }

    fn operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Input(field) => format!("{}.{}", self.input, field_ident(field)),
            Operand::Binding(name) => name.clone(),
            Operand::Output(place) => self.place(place),
        }
    }

    fn place(&self, place: &Place) -> String {
        match place {
            Place::Field(field) => format!("{}.{}", self.output, field_ident(field)),
            Place::Element { field, index } => {
                format!("{}.{}[{index}]", self.output, field_ident(field))
            }
        }
    }

    fn value(&self, value: &Value) -> String {
        match value {
            Value::Copy(operand) => format!("{}.clone()", self.operand(operand)),
            Value::Move(binding) => binding.clone(),
            Value::Some(inner) => format!("Some({})", self.value(inner)),
        }
    }
}

fn error_constructor(context: &ErrorContext) -> String {
    match context {
        ErrorContext::Convert { field } => format!("MapError::convert(\"{field}\", err)"),
        ErrorContext::Nested { field } => format!("MapError::nested(\"{field}\", err)"),
        ErrorContext::NestedElement { field, index } => {
            format!("MapError::nested_element(\"{field}\", {index}, err)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::emit;
    use crate::plan::{FieldPlan, MappingPlan, NestedCall, ProcedurePlan, ShapeAdaptation};

    fn render(direction: Direction, fields: Vec<FieldPlan>) -> String {
        let safe = crate::plan::is_safe(&fields);
        let plan = ProcedurePlan {
            name: direction.prefix().to_string(),
            direction,
            target: "UserDTO".to_string(),
            source: "db.User".to_string(),
            fields,
            safe,
        };
        ProcedureRenderer::new(&emit(&plan)).generate()
    }

    fn field(name: &str, input: &str, plan: MappingPlan) -> FieldPlan {
        FieldPlan {
            field: name.to_string(),
            input: Some(input.to_string()),
            output: name.to_string(),
            nested: plan.is_nested(),
            plan,
        }
    }

    #[test]
    fn test_safe_forward_method() {
        let code = render(
            Direction::Forward,
            vec![field(
                "ID",
                "ID",
                MappingPlan::Direct {
                    adaptation: ShapeAdaptation::ValueToValue,
                    raw: false,
                },
            )],
        );
        assert!(code.contains("pub fn map_from(&mut self, src: &db::User) {"));
        assert!(!code.contains("let Some(src)"));
        assert!(!code.contains("return"));
        assert!(code.contains("self.id = src.id.clone();"));
        assert!(!code.contains("Ok(())"));
    }

    #[test]
    fn test_fallible_forward_method() {
        let code = render(
            Direction::Forward,
            vec![field(
                "CreatedAt",
                "created_at",
                MappingPlan::Converter {
                    adaptation: ShapeAdaptation::PointerToValue,
                    function: "TimeToString".to_string(),
                    kind: automap_schema::SignatureKind::Fallible,
                },
            )],
        );
        assert!(code.contains("-> Result<(), MapError> {"));
        assert!(code.contains("return Err(MapError::NilSource);"));
        assert!(code.contains("if let Some(value) = &src.created_at {"));
        assert!(code.contains("let converted = time_to_string(value.clone());"));
        assert!(code.contains(
            "let converted = converted.map_err(|err| MapError::convert(\"CreatedAt\", err))?;"
        ));
        assert!(code.contains("self.created_at = converted;"));
        assert!(code.ends_with("        Ok(())\n    }\n"));
    }

    #[test]
    fn test_reverse_method() {
        let code = render(
            Direction::Reverse,
            vec![field(
                "Count",
                "Count",
                MappingPlan::Direct {
                    adaptation: ShapeAdaptation::ValueToPointer,
                    raw: false,
                },
            )],
        );
        assert!(code.contains("pub fn map_to(&self, dst: &mut db::User) {"));
        assert!(code.contains("let value = self.count.clone();"));
        assert!(code.contains("dst.count = Some(value);"));
    }

    #[test]
    fn test_nested_sequence_rendering() {
        let call = NestedCall {
            target: "ItemDTO".to_string(),
            procedure: "map_from".to_string(),
            fallible: true,
        };
        let code = render(
            Direction::Forward,
            vec![
                field(
                    "Items",
                    "items",
                    MappingPlan::NestedSequence {
                        elements: ShapeAdaptation::ValueToValue,
                        call: call.clone(),
                    },
                ),
                field(
                    "Extras",
                    "extras",
                    MappingPlan::NestedSequence {
                        elements: ShapeAdaptation::PointerToValue,
                        call,
                    },
                ),
            ],
        );
        assert!(code.contains(
            "self.items = std::iter::repeat_with(ItemDTO::default).take(src.items.len()).collect();"
        ));
        assert!(code.contains("for (i, item) in src.items.iter().enumerate() {"));
        assert!(code.contains(
            "self.items[i].map_from(Some(item)).map_err(|err| MapError::nested_element(\"Items\", i, err))?;"
        ));
        assert!(code.contains("self.extras = Vec::with_capacity(src.extras.len());"));
        assert!(code.contains("if let Some(value) = item {"));
        assert!(code.contains("self.extras.push(nested);"));
    }

    #[test]
    fn test_safe_callee_takes_reference() {
        let call = NestedCall {
            target: "ProfileDTO".to_string(),
            procedure: "map_from".to_string(),
            fallible: false,
        };
        let code = render(
            Direction::Forward,
            vec![
                field(
                    "Profile",
                    "profile",
                    MappingPlan::NestedScalar {
                        adaptation: ShapeAdaptation::ValueToPointer,
                        call: call.clone(),
                    },
                ),
                field(
                    "Backup",
                    "backup",
                    MappingPlan::NestedScalar {
                        adaptation: ShapeAdaptation::PointerToPointer,
                        call,
                    },
                ),
            ],
        );
        assert!(code.contains("-> Result<(), MapError> {"));
        assert!(code.contains("let mut nested = ProfileDTO::default();"));
        assert!(code.contains("nested.map_from(&src.profile);"));
        assert!(code.contains("self.profile = Some(nested);"));
        assert!(code.contains("if let Some(value) = &src.backup {"));
        assert!(code.contains("nested.map_from(value);"));
        assert!(!code.contains("map_from(Some("));
    }

    #[test]
    fn test_fallible_reverse_guard() {
        let code = render(
            Direction::Reverse,
            vec![field(
                "Count",
                "Count",
                MappingPlan::Converter {
                    adaptation: ShapeAdaptation::ValueToValue,
                    function: "ParseCount".to_string(),
                    kind: automap_schema::SignatureKind::Fallible,
                },
            )],
        );
        assert!(code.contains(
            "pub fn map_to(&self, dst: Option<&mut db::User>) -> Result<(), MapError> {"
        ));
        assert!(code.contains("let Some(dst) = dst else {"));
        assert!(code.contains("return Err(MapError::NilDestination);"));
        assert!(code.contains("let converted = parse_count(self.count.clone());"));
    }

    #[test]
    fn test_ignored_summary_and_skip_comment() {
        let code = render(
            Direction::Reverse,
            vec![
                FieldPlan {
                    field: "Secret".to_string(),
                    input: None,
                    output: "Secret".to_string(),
                    plan: MappingPlan::Ignored,
                    nested: false,
                },
                field(
                    "Inner",
                    "Inner",
                    MappingPlan::Skipped {
                        reason: "nested mapping is not inverted, skipped".to_string(),
                    },
                ),
            ],
        );
        assert!(code.contains("/// Ignored fields: Secret."));
        assert!(code.contains("// Inner: nested mapping is not inverted, skipped"));
        assert!(!code.contains("secret"));
    }
}
