//! Mapping schema type definitions.
//!
//! This module contains the data structures describing what the generator
//! maps: target record types, the source record types they are populated
//! from, and the catalogue of converter functions. All of it is built once
//! by the schema provider and consumed read-only afterwards.

use crate::resolve::NamingPolicy;
use crate::shape::{TypeShape, base_types_compatible};
use std::collections::{BTreeMap, HashMap};

/// Return type marking the failure output of a fallible function.
pub const FAILURE_TYPE: &str = "error";

/// Complete mapping schema.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Package (module) the generated code belongs to.
    pub package: String,
    /// Naming policy used when binding target fields to source fields.
    pub naming_policy: NamingPolicy,
    /// Target record types, in declaration order.
    pub targets: Vec<TargetRecordType>,
    /// Source record types keyed by qualified name.
    pub sources: BTreeMap<String, SourceRecordType>,
    /// Declared functions keyed by name.
    pub functions: BTreeMap<String, FunctionSig>,
    /// Registered converters keyed by converter name.
    pub converters: BTreeMap<String, ConverterDef>,
    /// Target lookup map (built while adding targets).
    target_map: HashMap<String, usize>,
}

impl Schema {
    /// Creates a new empty schema.
    #[must_use]
    pub fn new(package: String) -> Self {
        Self {
            package,
            naming_policy: NamingPolicy::default(),
            targets: Vec::new(),
            sources: BTreeMap::new(),
            functions: BTreeMap::new(),
            converters: BTreeMap::new(),
            target_map: HashMap::new(),
        }
    }

    /// Adds a target record type.
    pub fn add_target(&mut self, target: TargetRecordType) {
        let index = self.targets.len();
        self.target_map.insert(target.name.clone(), index);
        self.targets.push(target);
    }

    /// Adds a source record type under its qualified name.
    pub fn add_source(&mut self, source: SourceRecordType) {
        self.sources.insert(source.qualified_name(), source);
    }

    /// Adds a function declaration.
    pub fn add_function(&mut self, function: FunctionSig) {
        self.functions.insert(function.name.clone(), function);
    }

    /// Adds a converter definition.
    pub fn add_converter(&mut self, converter: ConverterDef) {
        self.converters.insert(converter.name.clone(), converter);
    }

    /// Looks up a target by name.
    #[must_use]
    pub fn get_target(&self, name: &str) -> Option<&TargetRecordType> {
        self.target_map.get(name).map(|&idx| &self.targets[idx])
    }

    /// Returns true if a target with the given name exists.
    #[must_use]
    pub fn has_target(&self, name: &str) -> bool {
        self.target_map.contains_key(name)
    }

    /// Looks up a source by qualified name.
    #[must_use]
    pub fn get_source(&self, name: &str) -> Option<&SourceRecordType> {
        self.sources.get(name)
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn get_function(&self, name: &str) -> Option<&FunctionSig> {
        self.functions.get(name)
    }

    /// Looks up a converter by name.
    #[must_use]
    pub fn get_converter(&self, name: &str) -> Option<&ConverterDef> {
        self.converters.get(name)
    }

    /// Returns the inverter function of a converter if it is declared and
    /// has a valid safe or fallible signature.
    #[must_use]
    pub fn valid_inverter(&self, converter: &ConverterDef) -> Option<&FunctionSig> {
        let name = converter.inverter_function.as_deref()?;
        self.get_function(name)
            .filter(|function| function.signature_kind().is_some())
    }

    /// Builds the target lookup map from the targets vector.
    pub fn build_target_map(&mut self) {
        self.target_map.clear();
        for (idx, target) in self.targets.iter().enumerate() {
            self.target_map.insert(target.name.clone(), idx);
        }
    }

    /// Returns the total number of target fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.targets.iter().map(|t| t.fields.len()).sum()
    }
}

/// Field of a source record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceField {
    /// Field name.
    pub name: String,
    /// Classified field type.
    pub shape: TypeShape,
}

impl SourceField {
    /// Creates a new source field.
    #[must_use]
    pub fn new(name: String, shape: TypeShape) -> Self {
        Self { name, shape }
    }
}

/// Record type that supplies field values.
#[derive(Debug, Clone)]
pub struct SourceRecordType {
    /// Unqualified type name.
    pub name: String,
    /// Fields keyed by name.
    pub fields: BTreeMap<String, SourceField>,
    /// Module the type is declared in.
    pub origin_module: String,
    /// Whether the type comes from an external module.
    pub is_external: bool,
}

impl SourceRecordType {
    /// Creates a new local source record type.
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            fields: BTreeMap::new(),
            origin_module: String::new(),
            is_external: false,
        }
    }

    /// Adds a field.
    pub fn add_field(&mut self, field: SourceField) {
        self.fields.insert(field.name.clone(), field);
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&SourceField> {
        self.fields.get(name)
    }

    /// Returns the name under which the type is referenced: `module.Name`
    /// for external types, `Name` otherwise.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.is_external && !self.origin_module.is_empty() {
            format!("{}.{}", self.origin_module, self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Field of a target record type.
#[derive(Debug, Clone)]
pub struct TargetField {
    /// Field name.
    pub name: String,
    /// Classified declared type.
    pub declared_shape: TypeShape,
    /// Explicit source field name.
    pub explicit_source_name: Option<String>,
    /// Converter to apply.
    pub converter_ref: Option<String>,
    /// Target type to map this field through.
    pub nested_target_ref: Option<String>,
    /// Whether the field is excluded from mapping.
    pub ignored: bool,
}

impl TargetField {
    /// Creates a new target field without mapping directives.
    #[must_use]
    pub fn new(name: String, declared_shape: TypeShape) -> Self {
        Self {
            name,
            declared_shape,
            explicit_source_name: None,
            converter_ref: None,
            nested_target_ref: None,
            ignored: false,
        }
    }

    /// Returns true if the field carries any explicit mapping directive.
    #[must_use]
    pub fn has_directive(&self) -> bool {
        self.explicit_source_name.is_some()
            || self.converter_ref.is_some()
            || self.nested_target_ref.is_some()
    }
}

/// Record type populated by generated mapping code.
#[derive(Debug, Clone)]
pub struct TargetRecordType {
    /// Type name.
    pub name: String,
    /// Qualified names of the source types it maps from.
    pub declared_sources: Vec<String>,
    /// Fields in declaration order.
    pub fields: Vec<TargetField>,
    /// Whether reverse mapping procedures are generated.
    pub bidirectional: bool,
}

impl TargetRecordType {
    /// Creates a new target record type.
    #[must_use]
    pub fn new(name: String, declared_sources: Vec<String>) -> Self {
        Self {
            name,
            declared_sources,
            fields: Vec::new(),
            bidirectional: false,
        }
    }

    /// Adds a field.
    pub fn add_field(&mut self, field: TargetField) {
        self.fields.push(field);
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&TargetField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the declared source matching `type_name` under relaxed
    /// base type equality.
    #[must_use]
    pub fn declared_source_for(&self, type_name: &str) -> Option<&str> {
        self.declared_sources
            .iter()
            .find(|s| base_types_compatible(s, type_name))
            .map(String::as_str)
    }

    /// Returns the names of nested targets referenced by this target's fields.
    pub fn nested_references(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter_map(|f| f.nested_target_ref.as_deref())
    }
}

/// Converter signature kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    /// One input, one output, cannot fail.
    Safe,
    /// One input, a value output and a failure output.
    Fallible,
}

impl SignatureKind {
    /// Parses a signature kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "safe" => Some(Self::Safe),
            "fallible" | "error" => Some(Self::Fallible),
            _ => None,
        }
    }

    /// Returns the kind as written in schema documents.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Fallible => "fallible",
        }
    }

    /// Returns the expected signature in human-readable form.
    #[must_use]
    pub const fn expected_signature(&self) -> &'static str {
        match self {
            Self::Safe => "func(T) U",
            Self::Fallible => "func(T) (U, error)",
        }
    }
}

/// Declared function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    /// Function name.
    pub name: String,
    /// Parameter types.
    pub params: Vec<String>,
    /// Return types.
    pub returns: Vec<String>,
}

impl FunctionSig {
    /// Creates a new function signature.
    #[must_use]
    pub fn new(name: String, params: Vec<String>, returns: Vec<String>) -> Self {
        Self {
            name,
            params,
            returns,
        }
    }

    /// Returns the converter kind this signature satisfies, if any.
    #[must_use]
    pub fn signature_kind(&self) -> Option<SignatureKind> {
        if self.matches(SignatureKind::Safe) {
            Some(SignatureKind::Safe)
        } else if self.matches(SignatureKind::Fallible) {
            Some(SignatureKind::Fallible)
        } else {
            None
        }
    }

    /// Returns true if the signature has exactly the shape of `kind`.
    #[must_use]
    pub fn matches(&self, kind: SignatureKind) -> bool {
        match kind {
            SignatureKind::Safe => self.params.len() == 1 && self.returns.len() == 1,
            SignatureKind::Fallible => {
                self.params.len() == 1
                    && self.returns.len() == 2
                    && self.returns[1] == FAILURE_TYPE
            }
        }
    }

    /// Best guess at the intended kind, used when none is declared.
    #[must_use]
    pub fn intended_kind(&self) -> SignatureKind {
        self.signature_kind().unwrap_or(if self.returns.len() > 1 {
            SignatureKind::Fallible
        } else {
            SignatureKind::Safe
        })
    }
}

/// Registered converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterDef {
    /// Name referenced by target fields.
    pub name: String,
    /// Function invoked by the converter.
    pub bound_function: String,
    /// Declared signature kind.
    pub signature_kind: SignatureKind,
    /// Reverse-direction function, used only by bidirectional targets.
    pub inverter_function: Option<String>,
}

impl ConverterDef {
    /// Creates a new converter definition without an inverter.
    #[must_use]
    pub fn new(name: String, bound_function: String, signature_kind: SignatureKind) -> Self {
        Self {
            name,
            bound_function,
            signature_kind,
            inverter_function: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::classify;

    fn sig(params: &[&str], returns: &[&str]) -> FunctionSig {
        FunctionSig::new(
            "f".to_string(),
            params.iter().map(|s| s.to_string()).collect(),
            returns.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_signature_kind() {
        assert_eq!(
            sig(&["string"], &["string"]).signature_kind(),
            Some(SignatureKind::Safe)
        );
        assert_eq!(
            sig(&["string"], &["time.Time", "error"]).signature_kind(),
            Some(SignatureKind::Fallible)
        );
        assert_eq!(sig(&["string"], &["int", "bool"]).signature_kind(), None);
        assert_eq!(sig(&["a", "b"], &["c"]).signature_kind(), None);
        assert_eq!(sig(&[], &["c"]).signature_kind(), None);
    }

    #[test]
    fn test_intended_kind() {
        assert_eq!(sig(&["a", "b"], &["c"]).intended_kind(), SignatureKind::Safe);
        assert_eq!(
            sig(&["a"], &["c", "d"]).intended_kind(),
            SignatureKind::Fallible
        );
    }

    #[test]
    fn test_signature_kind_parse() {
        assert_eq!(SignatureKind::parse("safe"), Some(SignatureKind::Safe));
        assert_eq!(SignatureKind::parse("Fallible"), Some(SignatureKind::Fallible));
        assert_eq!(SignatureKind::parse("maybe"), None);
    }

    #[test]
    fn test_qualified_name() {
        let mut source = SourceRecordType::new("UserDB".to_string());
        assert_eq!(source.qualified_name(), "UserDB");

        source.origin_module = "db".to_string();
        assert_eq!(source.qualified_name(), "UserDB");

        source.is_external = true;
        assert_eq!(source.qualified_name(), "db.UserDB");
    }

    #[test]
    fn test_schema_lookup() {
        let mut schema = Schema::new("dtos".to_string());
        schema.add_target(TargetRecordType::new(
            "UserDTO".to_string(),
            vec!["User".to_string()],
        ));
        schema.add_source(SourceRecordType::new("User".to_string()));

        assert!(schema.has_target("UserDTO"));
        assert!(!schema.has_target("User"));
        assert!(schema.get_source("User").is_some());
    }

    #[test]
    fn test_schema_build_target_map() {
        let mut schema = Schema::new("dtos".to_string());
        schema
            .targets
            .push(TargetRecordType::new("A".to_string(), Vec::new()));
        schema
            .targets
            .push(TargetRecordType::new("B".to_string(), Vec::new()));
        schema.build_target_map();

        assert!(schema.has_target("A"));
        assert_eq!(schema.get_target("B").map(|t| t.name.as_str()), Some("B"));
    }

    #[test]
    fn test_valid_inverter() {
        let mut schema = Schema::new("dtos".to_string());
        schema.add_function(FunctionSig::new(
            "StringToTime".to_string(),
            vec!["string".to_string()],
            vec!["time.Time".to_string(), "error".to_string()],
        ));
        let mut converter = ConverterDef::new(
            "TimeToString".to_string(),
            "TimeToString".to_string(),
            SignatureKind::Safe,
        );
        assert!(schema.valid_inverter(&converter).is_none());

        converter.inverter_function = Some("StringToTime".to_string());
        assert!(schema.valid_inverter(&converter).is_some());

        converter.inverter_function = Some("Missing".to_string());
        assert!(schema.valid_inverter(&converter).is_none());
    }

    #[test]
    fn test_target_field_directives() {
        let mut field = TargetField::new("Name".to_string(), classify("string"));
        assert!(!field.has_directive());
        field.converter_ref = Some("upper".to_string());
        assert!(field.has_directive());
    }

    #[test]
    fn test_declared_source_for() {
        let target = TargetRecordType::new(
            "AddressDTO".to_string(),
            vec!["db.Address".to_string(), "Place".to_string()],
        );
        assert_eq!(target.declared_source_for("Address"), Some("db.Address"));
        assert_eq!(target.declared_source_for("Place"), Some("Place"));
        assert_eq!(target.declared_source_for("Street"), None);
    }
}
