//! Type shape classification.
//!
//! A declared field type is reduced to one of three shapes before any
//! comparison or planning happens. Only one wrapper level is modelled; the
//! element of a sequence additionally records whether it is a pointer.

use std::fmt;

/// Sigil marking a pointer type (`*T`).
pub const POINTER_SIGIL: &str = "*";

/// Sigil marking a sequence type (`[]T`).
pub const SEQUENCE_SIGIL: &str = "[]";

/// Shape of a declared field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    /// Plain value type.
    Scalar(String),
    /// Pointer to a value type; may be nil.
    PointerOf(String),
    /// Sequence of values.
    SequenceOf {
        /// Element base type name.
        element: String,
        /// Whether the elements are pointers (`[]*T`).
        pointer_elements: bool,
    },
}

impl TypeShape {
    /// Returns the innermost type name.
    #[must_use]
    pub fn base_type_name(&self) -> &str {
        match self {
            Self::Scalar(name) | Self::PointerOf(name) => name,
            Self::SequenceOf { element, .. } => element,
        }
    }

    /// Returns true if this is a pointer shape.
    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        matches!(self, Self::PointerOf(_))
    }

    /// Returns true if this is a sequence shape.
    #[must_use]
    pub const fn is_sequence(&self) -> bool {
        matches!(self, Self::SequenceOf { .. })
    }

    /// Returns true if this is a sequence whose elements are pointers.
    #[must_use]
    pub const fn has_pointer_elements(&self) -> bool {
        matches!(
            self,
            Self::SequenceOf {
                pointer_elements: true,
                ..
            }
        )
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(name) => f.write_str(name),
            Self::PointerOf(name) => write!(f, "{POINTER_SIGIL}{name}"),
            Self::SequenceOf {
                element,
                pointer_elements: true,
            } => write!(f, "{SEQUENCE_SIGIL}{POINTER_SIGIL}{element}"),
            Self::SequenceOf { element, .. } => write!(f, "{SEQUENCE_SIGIL}{element}"),
        }
    }
}

/// Classifies a textual type declaration.
///
/// Never fails: anything that is neither a pointer nor a sequence is an
/// opaque scalar.
#[must_use]
pub fn classify(type_text: &str) -> TypeShape {
    let text = type_text.trim();

    if let Some(inner) = text.strip_prefix(POINTER_SIGIL) {
        return TypeShape::PointerOf(inner.trim().to_string());
    }

    if let Some(element) = text.strip_prefix(SEQUENCE_SIGIL) {
        let element = element.trim();
        return match element.strip_prefix(POINTER_SIGIL) {
            Some(inner) => TypeShape::SequenceOf {
                element: inner.trim().to_string(),
                pointer_elements: true,
            },
            None => TypeShape::SequenceOf {
                element: element.to_string(),
                pointer_elements: false,
            },
        };
    }

    TypeShape::Scalar(text.to_string())
}

/// Returns the trailing segment of a possibly module-qualified name.
#[must_use]
pub fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Relaxed base type equality.
///
/// Two names match if they are equal, or if exactly one of them is qualified
/// (`module.Type`) and its trailing segment equals the other (`Type`).
#[must_use]
pub fn base_types_compatible(left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }

    match (left.contains('.'), right.contains('.')) {
        (true, false) => unqualified(left) == right,
        (false, true) => unqualified(right) == left,
        _ => false,
    }
}
