use std::sync::RwLock;

use dashmap::DashMap;

use crate::{
    error::{EvalErrorKind, EvaluationError},
    resolve::TypeLocator,
    types::{TypeRef, builtins},
};

/// Finds types by name among registered types.
///
/// A name is tried as given, then with each import prefix (`lang` by
/// default), so `T(String)` finds `lang.String`. The primitive names `int`,
/// `long`, `float`, `double` and `boolean` denote their built-in
/// counterparts.
#[derive(Debug)]
pub struct StandardTypeLocator {
    types: DashMap<String, TypeRef>,
    prefixes: RwLock<Vec<String>>,
}

impl Default for StandardTypeLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardTypeLocator {
    pub fn new() -> Self {
        let b = builtins();
        let locator = StandardTypeLocator {
            types: DashMap::new(),
            prefixes: RwLock::new(vec!["lang".to_string()]),
        };
        for ty in [
            &b.object,
            &b.comparable,
            &b.char_sequence,
            &b.iterable,
            &b.collection,
            &b.number,
            &b.boolean,
            &b.integer,
            &b.long,
            &b.float,
            &b.double,
            &b.big_integer,
            &b.big_decimal,
            &b.string,
            &b.list,
            &b.map,
            &b.map_entry,
            &b.class,
            &b.function,
            &b.math,
        ] {
            locator.register_type(ty);
        }
        for (alias, ty) in [
            ("int", &b.integer),
            ("long", &b.long),
            ("float", &b.float),
            ("double", &b.double),
            ("boolean", &b.boolean),
        ] {
            locator.types.insert(alias.to_string(), ty.clone());
        }
        locator
    }

    /// Makes a host type findable by its full name.
    pub fn register_type(&self, ty: &TypeRef) {
        self.types.insert(ty.name().to_string(), ty.clone());
    }

    /// Adds a prefix tried for unqualified names.
    pub fn register_import(&self, prefix: &str) {
        let mut prefixes = self
            .prefixes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_string());
        }
    }

    pub fn import_prefixes(&self) -> Vec<String> {
        self.prefixes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn remove_import(&self, prefix: &str) {
        self.prefixes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|p| p != prefix);
    }
}

impl TypeLocator for StandardTypeLocator {
    fn find_type(&self, name: &str) -> Result<TypeRef, EvaluationError> {
        if let Some(ty) = self.types.get(name) {
            return Ok(ty.clone());
        }
        for prefix in self.import_prefixes() {
            if let Some(ty) = self.types.get(&format!("{}.{}", prefix, name)) {
                return Ok(ty.clone());
            }
        }
        Err(EvalErrorKind::TypeNotFound(name.to_string()).into())
    }
}

#[test]
fn test_prefixes_and_primitives() {
    let locator = StandardTypeLocator::new();
    assert_eq!(locator.find_type("String").unwrap().name(), "lang.String");
    assert_eq!(locator.find_type("int").unwrap().name(), "lang.Integer");
    assert!(locator.find_type("geo.Point").is_err());

    let point = crate::types::TypeBuilder::class("geo.Point").build();
    locator.register_type(&point);
    locator.register_import("geo");
    assert_eq!(locator.find_type("Point").unwrap().name(), "geo.Point");
}
