//! File prelude and converter registration.

use super::types::function_path;
use crate::emit::Registration;
use automap_schema::SignatureKind;

/// Generates the file prelude: header comment and runtime imports.
#[must_use]
pub fn generate_prelude(header: &str, package: &str) -> String {
    let mut output = String::new();
    for line in header.lines() {
        output.push_str(&format!("// {line}\n"));
    }
    if !package.is_empty() {
        output.push_str(&format!("// Package: {package}\n"));
    }
    output.push('\n');
    output.push_str("#[allow(unused_imports)]\n");
    output.push_str("use automap_core::{ConverterRegistry, MapError};\n\n");
    output
}

/// Generates `register_converters`, which registers every catalogued
/// converter under its name.
#[must_use]
pub fn generate_registrations(registrations: &[Registration]) -> String {
    let mut output = String::new();
    output.push_str("/// Registers every catalogued converter.\n");
    output.push_str("pub fn register_converters(registry: &ConverterRegistry) {\n");
    for registration in registrations {
        let method = match registration.kind {
            SignatureKind::Safe => "register_safe",
            SignatureKind::Fallible => "register_fallible",
        };
        output.push_str(&format!(
            "    registry.{method}(\"{}\", {});\n",
            registration.name,
            function_path(&registration.function)
        ));
    }
    if registrations.is_empty() {
        output.push_str("    let _ = registry;\n");
    }
    output.push_str("}\n\n");
    output
}
