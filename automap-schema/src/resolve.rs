//! Field binding resolution.
//!
//! Binds a target field to the name of the source field that backs it.
//! Resolution order, first match wins: explicit source name, naming-policy
//! transliteration of each source field name, identical name.

use crate::types::{SourceRecordType, TargetField};
use serde::{Deserialize, Serialize};

/// Policy applied to source field names before comparing them with target
/// field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// No transliteration; only identical names bind.
    #[serde(rename = "none")]
    Identity,
    /// `created_at` binds to `CreatedAt`.
    #[default]
    SnakeToCamel,
}

impl NamingPolicy {
    /// Parses a naming policy from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "identity" | "" => Some(Self::Identity),
            "snake_to_camel" | "snaketocamel" => Some(Self::SnakeToCamel),
            _ => None,
        }
    }

    /// Returns the policy as written in schema and config documents.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "none",
            Self::SnakeToCamel => "snake_to_camel",
        }
    }

    /// Applies the policy to a source field name.
    #[must_use]
    pub fn transliterate(&self, name: &str) -> String {
        match self {
            Self::Identity => name.to_string(),
            Self::SnakeToCamel => snake_to_camel(name),
        }
    }
}

/// Splits on `_` and capitalizes the first letter of every segment.
#[must_use]
pub fn snake_to_camel(name: &str) -> String {
    name.split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Converts `CamelCase` to `snake_case`.
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// How a binding was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// The target field names its source field explicitly.
    Explicit,
    /// A source field transliterates to the target field name.
    Policy,
    /// The names are identical.
    Identical,
}

/// Resolved binding of a target field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Name of the bound source field.
    pub source_field: String,
    /// How the binding was established.
    pub kind: BindingKind,
    /// Other source fields that also matched under the naming policy.
    pub also_matched: Vec<String>,
}

impl Binding {
    /// Returns true if more than one source field matched.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        !self.also_matched.is_empty()
    }
}

/// Resolves target fields to source field names.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldResolver {
    policy: NamingPolicy,
}

impl FieldResolver {
    /// Creates a resolver with the given naming policy.
    #[must_use]
    pub const fn new(policy: NamingPolicy) -> Self {
        Self { policy }
    }

    /// Returns the naming policy.
    #[must_use]
    pub const fn policy(&self) -> NamingPolicy {
        self.policy
    }

    /// Returns the source field name the target field binds to, if any.
    ///
    /// An explicit source name is returned verbatim only if the source
    /// declares it.
    #[must_use]
    pub fn resolve(&self, field: &TargetField, source: &SourceRecordType) -> Option<String> {
        self.bind(field, source).map(|b| b.source_field)
    }

    /// Resolves the binding of `field` against `source`, recording how it was
    /// made and whether the naming policy matched more than one field.
    #[must_use]
    pub fn bind(&self, field: &TargetField, source: &SourceRecordType) -> Option<Binding> {
        if let Some(explicit) = &field.explicit_source_name {
            return source.get_field(explicit).map(|_| Binding {
                source_field: explicit.clone(),
                kind: BindingKind::Explicit,
                also_matched: Vec::new(),
            });
        }

        if self.policy != NamingPolicy::Identity {
            // Fields are kept sorted, so the first match is the
            // lexicographically smallest source name.
            let mut matches = source
                .fields
                .keys()
                .filter(|name| self.policy.transliterate(name) == field.name)
                .cloned();
            if let Some(first) = matches.next() {
                return Some(Binding {
                    source_field: first,
                    kind: BindingKind::Policy,
                    also_matched: matches.collect(),
                });
            }
        }

        source.get_field(&field.name).map(|_| Binding {
            source_field: field.name.clone(),
            kind: BindingKind::Identical,
            also_matched: Vec::new(),
        })
    }
}
