//! Mapping schema XML parser.
//!
//! This module parses `<mappingSchema>` documents into the internal schema
//! representation. A document lists the source record types, the declared
//! functions, the converter catalogue and the target record types:
//!
//! ```xml
//! <mappingSchema package="dtos" namingPolicy="snake_to_camel">
//!   <sources>
//!     <source name="User">
//!       <field name="id" type="int64"/>
//!     </source>
//!   </sources>
//!   <functions>
//!     <function name="ToUpper" params="string" returns="string" converter="true"/>
//!   </functions>
//!   <targets>
//!     <target name="UserDTO" from="User">
//!       <field name="Id" type="int64"/>
//!     </target>
//!   </targets>
//! </mappingSchema>
//! ```

use crate::error::ParseError;
use crate::resolve::NamingPolicy;
use crate::shape::classify;
use crate::types::{
    ConverterDef, FunctionSig, Schema, SignatureKind, SourceField, SourceRecordType, TargetField,
    TargetRecordType,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use std::collections::HashSet;
use std::path::Path;

/// Parses a mapping schema from a string.
///
/// # Arguments
/// * `xml` - XML schema content
///
/// # Returns
/// Parsed schema or parse error.
///
/// # Errors
/// Returns `ParseError` if the XML is malformed, contains invalid schema
/// elements, or defines a name twice.
pub fn parse_schema(xml: &str) -> Result<Schema, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut builder: Option<SchemaBuilder> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                if name == "mappingSchema" {
                    builder = Some(SchemaBuilder::new(parse_mapping_schema(e)?));
                } else {
                    let Some(builder) = builder.as_mut() else {
                        return Err(ParseError::InvalidStructure {
                            message: format!("element '{name}' outside mappingSchema"),
                        });
                    };
                    match name {
                        "sources" => parse_sources(&mut reader, builder)?,
                        "functions" => parse_functions(&mut reader, builder)?,
                        "converters" => parse_converters(&mut reader, builder)?,
                        "targets" => parse_targets(&mut reader, builder)?,
                        other => return Err(ParseError::unknown_element(other, "mappingSchema")),
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name_bytes = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_bytes)?;
                if name == "mappingSchema" {
                    builder = Some(SchemaBuilder::new(parse_mapping_schema(e)?));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    builder
        .ok_or_else(|| ParseError::InvalidStructure {
            message: "No mappingSchema element found".to_string(),
        })?
        .finish()
}

/// Reads and parses a mapping schema file.
///
/// # Errors
/// Returns `ParseError::Io` if the file cannot be read, or any error
/// [`parse_schema`] reports.
pub fn parse_schema_file(path: impl AsRef<Path>) -> Result<Schema, ParseError> {
    let xml = std::fs::read_to_string(path)?;
    parse_schema(&xml)
}

/// Converter declared in `<converters>`; the kind may be inferred later.
struct PendingConverter {
    name: String,
    function: String,
    kind: Option<SignatureKind>,
    inverter: Option<String>,
}

/// Converter-related flags carried by a `<function>` element.
struct FunctionFlags {
    name: String,
    converter: bool,
    inverts: Option<String>,
}

/// Accumulates sections until the converter catalogue can be linked.
struct SchemaBuilder {
    schema: Schema,
    converters: Vec<PendingConverter>,
    function_flags: Vec<FunctionFlags>,
}

impl SchemaBuilder {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            converters: Vec::new(),
            function_flags: Vec::new(),
        }
    }

    fn add_source(&mut self, source: SourceRecordType) -> Result<(), ParseError> {
        let key = source.qualified_name();
        if self.schema.get_source(&key).is_some() {
            return Err(ParseError::duplicate("source", key));
        }
        self.schema.add_source(source);
        Ok(())
    }

    fn add_target(&mut self, target: TargetRecordType) -> Result<(), ParseError> {
        if self.schema.has_target(&target.name) {
            return Err(ParseError::duplicate("target", target.name));
        }
        self.schema.add_target(target);
        Ok(())
    }

    fn add_function(&mut self, function: FunctionSig, flags: FunctionFlags) -> Result<(), ParseError> {
        if self.schema.get_function(&function.name).is_some() {
            return Err(ParseError::duplicate("function", function.name));
        }
        self.schema.add_function(function);
        self.function_flags.push(flags);
        Ok(())
    }

    /// Registers converters and links inverters.
    fn finish(mut self) -> Result<Schema, ParseError> {
        for pending in std::mem::take(&mut self.converters) {
            let kind = pending.kind.unwrap_or_else(|| self.inferred_kind(&pending.function));
            let mut converter = ConverterDef::new(pending.name, pending.function, kind);
            converter.inverter_function = pending.inverter;
            self.register_converter(converter)?;
        }

        // Functions flagged as converters or inverters register under their
        // own name.
        let function_flags = std::mem::take(&mut self.function_flags);
        for flags in &function_flags {
            if !flags.converter && flags.inverts.is_none() {
                continue;
            }
            let kind = self.inferred_kind(&flags.name);
            let converter = ConverterDef::new(flags.name.clone(), flags.name.clone(), kind);
            if flags.converter {
                self.register_converter(converter)?;
            } else if self.schema.get_converter(&flags.name).is_none() {
                self.schema.add_converter(converter);
            }
        }

        for flags in &function_flags {
            let Some(inverted) = &flags.inverts else {
                continue;
            };
            let mut linked = 0usize;
            for converter in self.schema.converters.values_mut() {
                if &converter.bound_function == inverted && converter.inverter_function.is_none() {
                    converter.inverter_function = Some(flags.name.clone());
                    linked += 1;
                }
            }
            if linked == 0 {
                tracing::debug!(
                    function = %flags.name,
                    inverts = %inverted,
                    "inverter does not match any converter"
                );
            }
        }

        self.schema.build_target_map();
        Ok(self.schema)
    }

    fn register_converter(&mut self, converter: ConverterDef) -> Result<(), ParseError> {
        if self.schema.get_converter(&converter.name).is_some() {
            return Err(ParseError::duplicate("converter", converter.name));
        }
        self.schema.add_converter(converter);
        Ok(())
    }

    fn inferred_kind(&self, function: &str) -> SignatureKind {
        self.schema
            .get_function(function)
            .map_or(SignatureKind::Safe, FunctionSig::intended_kind)
    }
}

/// Parses the mappingSchema element attributes.
fn parse_mapping_schema(e: &BytesStart<'_>) -> Result<Schema, ParseError> {
    let mut package = String::new();
    let mut naming_policy = NamingPolicy::default();

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "package" => package = value.to_string(),
            "namingPolicy" => {
                naming_policy = NamingPolicy::parse(value).ok_or_else(|| {
                    ParseError::invalid_attr("mappingSchema", "namingPolicy", value)
                })?
            }
            _ => {}
        }
    }

    let mut schema = Schema::new(package);
    schema.naming_policy = naming_policy;
    Ok(schema)
}

/// Parses the sources section.
fn parse_sources(reader: &mut Reader<&[u8]>, builder: &mut SchemaBuilder) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                expect_element(e, "source", "sources")?;
                let mut source = parse_source_attrs(e)?;
                parse_source_fields(reader, &mut source)?;
                builder.add_source(source)?;
            }
            Ok(Event::Empty(ref e)) => {
                expect_element(e, "source", "sources")?;
                builder.add_source(parse_source_attrs(e)?)?;
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parses the attributes of a source element.
fn parse_source_attrs(e: &BytesStart<'_>) -> Result<SourceRecordType, ParseError> {
    let mut name = None;
    let mut module = String::new();
    let mut external = false;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "module" => module = value.to_string(),
            "external" => external = parse_bool("source", "external", value)?,
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr("source", "name"))?;
    let mut source = SourceRecordType::new(name);
    source.origin_module = module;
    source.is_external = external;
    Ok(source)
}

/// Parses the fields of a source element.
fn parse_source_fields(
    reader: &mut Reader<&[u8]>,
    source: &mut SourceRecordType,
) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                expect_element(e, "field", "source")?;
                let field = parse_source_field(e)?;
                skip_element(reader, e)?;
                add_source_field(source, field)?;
            }
            Ok(Event::Empty(ref e)) => {
                expect_element(e, "field", "source")?;
                add_source_field(source, parse_source_field(e)?)?;
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn add_source_field(source: &mut SourceRecordType, field: SourceField) -> Result<(), ParseError> {
    if source.get_field(&field.name).is_some() {
        return Err(ParseError::duplicate(
            "field",
            format!("{}.{}", source.name, field.name),
        ));
    }
    source.add_field(field);
    Ok(())
}

/// Parses a field within a source element.
fn parse_source_field(e: &BytesStart<'_>) -> Result<SourceField, ParseError> {
    let mut name = None;
    let mut type_text = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "type" => type_text = Some(value.to_string()),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr("field", "name"))?;
    let type_text = type_text.ok_or_else(|| ParseError::missing_attr("field", "type"))?;
    Ok(SourceField::new(name, classify(&type_text)))
}

/// Parses the functions section.
fn parse_functions(
    reader: &mut Reader<&[u8]>,
    builder: &mut SchemaBuilder,
) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                expect_element(e, "function", "functions")?;
                let (function, flags) = parse_function(e)?;
                skip_element(reader, e)?;
                builder.add_function(function, flags)?;
            }
            Ok(Event::Empty(ref e)) => {
                expect_element(e, "function", "functions")?;
                let (function, flags) = parse_function(e)?;
                builder.add_function(function, flags)?;
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parses a function declaration.
fn parse_function(e: &BytesStart<'_>) -> Result<(FunctionSig, FunctionFlags), ParseError> {
    let mut name = None;
    let mut params = Vec::new();
    let mut returns = Vec::new();
    let mut converter = false;
    let mut inverts = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "params" => params = split_list(value),
            "returns" => returns = split_list(value),
            "converter" => converter = parse_bool("function", "converter", value)?,
            "inverts" => inverts = Some(value.trim().to_string()).filter(|v| !v.is_empty()),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr("function", "name"))?;
    let flags = FunctionFlags {
        name: name.clone(),
        converter,
        inverts,
    };
    Ok((FunctionSig::new(name, params, returns), flags))
}

/// Parses the converters section.
fn parse_converters(
    reader: &mut Reader<&[u8]>,
    builder: &mut SchemaBuilder,
) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                expect_element(e, "converter", "converters")?;
                let converter = parse_converter(e)?;
                skip_element(reader, e)?;
                builder.converters.push(converter);
            }
            Ok(Event::Empty(ref e)) => {
                expect_element(e, "converter", "converters")?;
                builder.converters.push(parse_converter(e)?);
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parses a converter declaration.
fn parse_converter(e: &BytesStart<'_>) -> Result<PendingConverter, ParseError> {
    let mut name = None;
    let mut function = None;
    let mut kind = None;
    let mut inverter = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "function" => function = Some(value.to_string()),
            "kind" => {
                kind = Some(
                    SignatureKind::parse(value)
                        .ok_or_else(|| ParseError::invalid_attr("converter", "kind", value))?,
                )
            }
            "inverter" => inverter = Some(value.to_string()).filter(|v| !v.is_empty()),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr("converter", "name"))?;
    // A converter without an explicit function is bound to the function of
    // the same name.
    let function = function.unwrap_or_else(|| name.clone());
    Ok(PendingConverter {
        name,
        function,
        kind,
        inverter,
    })
}

/// Parses the targets section.
fn parse_targets(reader: &mut Reader<&[u8]>, builder: &mut SchemaBuilder) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                expect_element(e, "target", "targets")?;
                let mut target = parse_target_attrs(e)?;
                parse_target_fields(reader, &mut target)?;
                builder.add_target(target)?;
            }
            Ok(Event::Empty(ref e)) => {
                expect_element(e, "target", "targets")?;
                builder.add_target(parse_target_attrs(e)?)?;
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parses the attributes of a target element.
fn parse_target_attrs(e: &BytesStart<'_>) -> Result<TargetRecordType, ParseError> {
    let mut name = None;
    let mut from = Vec::new();
    let mut bidirectional = false;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "from" => from = split_list(value),
            "bidirectional" => bidirectional = parse_bool("target", "bidirectional", value)?,
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr("target", "name"))?;
    let mut target = TargetRecordType::new(name, from);
    target.bidirectional = bidirectional;
    Ok(target)
}

/// Parses the fields of a target element.
fn parse_target_fields(
    reader: &mut Reader<&[u8]>,
    target: &mut TargetRecordType,
) -> Result<(), ParseError> {
    let mut buf = Vec::new();
    let mut seen = HashSet::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                expect_element(e, "field", "target")?;
                let field = parse_target_field(e)?;
                skip_element(reader, e)?;
                add_target_field(target, &mut seen, field)?;
            }
            Ok(Event::Empty(ref e)) => {
                expect_element(e, "field", "target")?;
                add_target_field(target, &mut seen, parse_target_field(e)?)?;
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parses a field within a target element.
fn parse_target_field(e: &BytesStart<'_>) -> Result<TargetField, ParseError> {
    let mut name = None;
    let mut type_text = None;
    let mut source = None;
    let mut converter = None;
    let mut dto = None;
    let mut ignored = false;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "type" => type_text = Some(value.to_string()),
            // `source="-"` is shorthand for ignore.
            "source" if value == "-" => ignored = true,
            "source" => source = non_empty(value),
            "converter" => converter = non_empty(value),
            "dto" => dto = non_empty(value),
            "ignore" => ignored = parse_bool("field", "ignore", value)?,
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr("field", "name"))?;
    let type_text = type_text.ok_or_else(|| ParseError::missing_attr("field", "type"))?;

    let mut field = TargetField::new(name, classify(&type_text));
    field.explicit_source_name = source;
    field.converter_ref = converter;
    field.nested_target_ref = dto;
    field.ignored = ignored;
    Ok(field)
}

fn add_target_field(
    target: &mut TargetRecordType,
    seen: &mut HashSet<String>,
    field: TargetField,
) -> Result<(), ParseError> {
    if !seen.insert(field.name.clone()) {
        return Err(ParseError::duplicate(
            "field",
            format!("{}.{}", target.name, field.name),
        ));
    }
    target.add_field(field);
    Ok(())
}

/// Fails unless the element is named `expected`.
fn expect_element(e: &BytesStart<'_>, expected: &str, context: &str) -> Result<(), ParseError> {
    let name_bytes = e.name().as_ref().to_vec();
    let name = std::str::from_utf8(&name_bytes)?;
    if name == expected {
        Ok(())
    } else {
        Err(ParseError::unknown_element(name, context))
    }
}

/// Skips to the end of a leaf element opened with a start tag.
fn skip_element(reader: &mut Reader<&[u8]>, e: &BytesStart<'_>) -> Result<(), ParseError> {
    let name_bytes = e.name().as_ref().to_vec();
    let mut buf = Vec::new();
    reader.read_to_end_into(QName(&name_bytes), &mut buf)?;
    Ok(())
}

/// Splits a comma-separated list, dropping blank entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bool(element: &str, attribute: &str, value: &str) -> Result<bool, ParseError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ParseError::invalid_attr(element, attribute, value)),
    }
}
