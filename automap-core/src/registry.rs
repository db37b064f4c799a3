//! Name-keyed converter registry.
//!
//! Generated code registers every catalogued converter once at program start
//! (see the generated `register_converters`) and may dispatch conversions by
//! name at runtime. The registry is an ordinary value: callers own it and
//! pass it where it is needed.

use crate::error::{BoxError, ConvertError};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased converter as stored in the registry.
pub type ConverterFn<F, T> = Arc<dyn Fn(F) -> Result<T, BoxError> + Send + Sync>;

/// Result of a typed registry lookup.
pub enum Lookup<F, T> {
    /// A converter exists and its input/output types match the call site.
    Found(ConverterFn<F, T>),
    /// A converter exists under the name but with different types.
    WrongType,
    /// Nothing is registered under the name.
    NotFound,
}

impl<F, T> Lookup<F, T> {
    /// Returns true if a matching converter was found.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl<F, T> std::fmt::Debug for Lookup<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found(_) => f.write_str("Found(..)"),
            Self::WrongType => f.write_str("WrongType"),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Thread-safe registry mapping converter names to functions.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl ConverterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter that cannot fail.
    ///
    /// Registering a name twice replaces the previous converter.
    pub fn register_safe<F, T, C>(&self, name: impl Into<String>, converter: C)
    where
        F: 'static,
        T: 'static,
        C: Fn(F) -> T + Send + Sync + 'static,
    {
        let erased: ConverterFn<F, T> = Arc::new(move |value| Ok(converter(value)));
        self.insert(name.into(), erased);
    }

    /// Registers a converter that reports failures.
    pub fn register_fallible<F, T, E, C>(&self, name: impl Into<String>, converter: C)
    where
        F: 'static,
        T: 'static,
        E: Into<BoxError>,
        C: Fn(F) -> Result<T, E> + Send + Sync + 'static,
    {
        let erased: ConverterFn<F, T> =
            Arc::new(move |value| converter(value).map_err(Into::into));
        self.insert(name.into(), erased);
    }

    fn insert<F: 'static, T: 'static>(&self, name: String, converter: ConverterFn<F, T>) {
        self.converters.write().insert(name, Box::new(converter));
    }

    /// Looks up a converter by name, checking its input/output types.
    #[must_use]
    pub fn lookup<F: 'static, T: 'static>(&self, name: &str) -> Lookup<F, T> {
        let converters = self.converters.read();
        match converters.get(name) {
            None => Lookup::NotFound,
            Some(stored) => match stored.downcast_ref::<ConverterFn<F, T>>() {
                Some(converter) => Lookup::Found(Arc::clone(converter)),
                None => Lookup::WrongType,
            },
        }
    }

    /// Converts `value` with the converter registered under `name`.
    ///
    /// # Errors
    /// Returns `ConvertError::NotRegistered` if the name is unknown,
    /// `ConvertError::WrongType` if the registered converter has different
    /// input/output types, or `ConvertError::Failed` if the converter fails.
    pub fn convert<F: 'static, T: 'static>(&self, name: &str, value: F) -> Result<T, ConvertError> {
        // The lock is released before the converter runs.
        let converter = match self.lookup::<F, T>(name) {
            Lookup::Found(converter) => converter,
            Lookup::WrongType => {
                return Err(ConvertError::WrongType {
                    name: name.to_string(),
                });
            }
            Lookup::NotFound => {
                return Err(ConvertError::NotRegistered {
                    name: name.to_string(),
                });
            }
        };

        converter(value).map_err(|source| ConvertError::Failed {
            name: name.to_string(),
            source,
        })
    }

    /// Returns true if a converter is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.converters.read().contains_key(name)
    }

    /// Returns the number of registered converters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.converters.read().len()
    }

    /// Returns true if no converter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.converters.read().is_empty()
    }

    /// Returns the registered converter names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.converters.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_upper(s: String) -> String {
        s.to_uppercase()
    }

    fn parse_age(s: String) -> Result<u32, std::num::ParseIntError> {
        s.parse()
    }

    #[test]
    fn test_register_and_convert_safe() {
        let registry = ConverterRegistry::new();
        registry.register_safe("upper", to_upper);

        let result: String = registry
            .convert("upper", "alice".to_string())
            .expect("conversion");
        assert_eq!(result, "ALICE");
    }

    #[test]
    fn test_fallible_failure_is_propagated() {
        let registry = ConverterRegistry::new();
        registry.register_fallible("age", parse_age);

        let ok: u32 = registry.convert("age", "42".to_string()).expect("valid age");
        assert_eq!(ok, 42);

        let err = registry
            .convert::<String, u32>("age", "forty".to_string())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Failed { ref name, .. } if name == "age"));
    }

    #[test]
    fn test_lookup_not_found() {
        let registry = ConverterRegistry::new();
        let lookup = registry.lookup::<String, String>("missing");
        assert!(matches!(lookup, Lookup::NotFound));

        let err = registry
            .convert::<String, String>("missing", String::new())
            .unwrap_err();
        assert!(matches!(err, ConvertError::NotRegistered { .. }));
    }

    #[test]
    fn test_lookup_wrong_type() {
        let registry = ConverterRegistry::new();
        registry.register_safe("upper", to_upper);

        let lookup = registry.lookup::<i64, String>("upper");
        assert!(matches!(lookup, Lookup::WrongType));
        assert!(registry.lookup::<String, String>("upper").is_found());

        let err = registry.convert::<i64, String>("upper", 7).unwrap_err();
        assert_eq!(err.to_string(), "converter upper has wrong type");
    }

    #[test]
    fn test_register_replaces_existing() {
        let registry = ConverterRegistry::new();
        registry.register_safe("id", |v: i64| v);
        registry.register_safe("id", |v: i64| v + 1);

        assert_eq!(registry.len(), 1);
        let value: i64 = registry.convert("id", 1_i64).expect("conversion");
        assert_eq!(value, 2);
    }

    #[test]
    fn test_names_sorted() {
        let registry = ConverterRegistry::default();
        assert!(registry.is_empty());
        registry.register_safe("b", |v: i32| v);
        registry.register_safe("a", |v: i32| v);
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.contains("a"));
        assert!(!registry.contains("c"));
    }

    #[test]
    fn test_shared_across_threads() {
        let registry = Arc::new(ConverterRegistry::new());
        registry.register_safe("double", |v: i64| v * 2);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.convert::<i64, i64>("double", i))
            })
            .collect();

        let mut results: Vec<i64> = handles
            .into_iter()
            .map(|h| h.join().expect("thread").expect("conversion"))
            .collect();
        results.sort_unstable();
        assert_eq!(results, vec![0, 2, 4, 6]);
    }
}
