//! Error types for generated mapping procedures and converter dispatch.

use thiserror::Error;

/// Boxed error produced by a fallible converter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by runtime converter dispatch.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No converter is registered under the requested name.
    #[error("converter {name} not registered")]
    NotRegistered {
        /// Converter name.
        name: String,
    },

    /// A converter is registered under the name but its input/output types
    /// differ from the call site.
    #[error("converter {name} has wrong type")]
    WrongType {
        /// Converter name.
        name: String,
    },

    /// The converter ran and reported a failure.
    #[error("converter {name} failed: {source}")]
    Failed {
        /// Converter name.
        name: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

/// Error returned by a generated mapping procedure.
#[derive(Debug, Error)]
pub enum MapError {
    /// The source argument was absent.
    #[error("source is nil")]
    NilSource,

    /// The destination argument was absent.
    #[error("destination is nil")]
    NilDestination,

    /// A fallible converter failed while populating a field.
    #[error("converting field {field}: {source}")]
    Convert {
        /// Target field name.
        field: String,
        /// Converter failure.
        #[source]
        source: BoxError,
    },

    /// A nested mapping procedure failed.
    #[error("mapping nested field {field}: {source}")]
    Nested {
        /// Target field name.
        field: String,
        /// Nested failure.
        #[source]
        source: Box<MapError>,
    },

    /// A nested mapping procedure failed for one sequence element.
    #[error("mapping nested field {field}[{index}]: {source}")]
    NestedElement {
        /// Target field name.
        field: String,
        /// Index of the failing source element.
        index: usize,
        /// Nested failure.
        #[source]
        source: Box<MapError>,
    },

    /// Runtime registry dispatch failed.
    #[error("registry error: {0}")]
    Registry(#[from] ConvertError),
}

impl MapError {
    /// Wraps a converter failure with the name of the field being populated.
    pub fn convert(field: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Convert {
            field: field.into(),
            source: source.into(),
        }
    }

    /// Wraps a nested mapping failure with the name of the field being populated.
    pub fn nested(field: impl Into<String>, source: MapError) -> Self {
        Self::Nested {
            field: field.into(),
            source: Box::new(source),
        }
    }

    /// Wraps a nested mapping failure for the element at `index`.
    pub fn nested_element(field: impl Into<String>, index: usize, source: MapError) -> Self {
        Self::NestedElement {
            field: field.into(),
            index,
            source: Box::new(source),
        }
    }

    /// Returns the name of the field the failure is attributed to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Convert { field, .. }
            | Self::Nested { field, .. }
            | Self::NestedElement { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type alias for generated mapping procedures.
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_error_names_field() {
        let err = MapError::convert("CreatedAt", "invalid time format");
        assert_eq!(err.field(), Some("CreatedAt"));
        assert_eq!(
            err.to_string(),
            "converting field CreatedAt: invalid time format"
        );
    }

    #[test]
    fn test_nested_element_display() {
        let err = MapError::nested_element(
            "Items",
            3,
            MapError::convert("Price", "negative price"),
        );
        assert_eq!(
            err.to_string(),
            "mapping nested field Items[3]: converting field Price: negative price"
        );
    }

    #[test]
    fn test_nested_keeps_source_chain() {
        let err = MapError::nested("Address", MapError::NilSource);
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "source is nil");
    }

    #[test]
    fn test_nil_errors_have_no_field() {
        assert_eq!(MapError::NilSource.field(), None);
        assert_eq!(MapError::NilDestination.to_string(), "destination is nil");
    }

    #[test]
    fn test_registry_error_from() {
        let err: MapError = ConvertError::NotRegistered {
            name: "upper".to_string(),
        }
        .into();
        assert!(matches!(err, MapError::Registry(_)));
        assert_eq!(
            err.to_string(),
            "registry error: converter upper not registered"
        );
    }
}
