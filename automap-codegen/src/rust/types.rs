//! Rust spelling of schema names.

use automap_schema::resolve::camel_to_snake;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// Identifiers that cannot be written as raw identifiers.
const RESERVED: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Returns the snake_case field identifier for a schema field name.
#[must_use]
pub fn field_ident(name: &str) -> String {
    escape(camel_to_snake(name))
}

/// Returns the path of a record type: `module.Type` becomes `module::Type`.
#[must_use]
pub fn type_path(name: &str) -> String {
    name.split('.').collect::<Vec<_>>().join("::")
}

/// Returns the path of a converter function, with the function name in
/// snake_case: `strconv.Itoa` becomes `strconv::itoa`.
#[must_use]
pub fn function_path(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((module, function)) => format!("{}::{}", type_path(module), field_ident(function)),
        None => field_ident(name),
    }
}

fn escape(ident: String) -> String {
    if RESERVED.contains(&ident.as_str()) {
        format!("{ident}_")
    } else if KEYWORDS.contains(&ident.as_str()) {
        format!("r#{ident}")
    } else {
        ident
    }
}
