//! Ordered tables mapping label names to values.
//!
//! The same container backs the parser's label table (label → instruction index) and the
//! assembler's symbol table (label → byte address). Iteration follows definition order so that
//! compiling the same source always yields the same output.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for SymbolTable<V> {
    fn default() -> Self {
        SymbolTable {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

/// Normalizes a label name. Labels are case-insensitive and stored in uppercase.
pub fn normalize(label: &str) -> String {
    label.to_uppercase()
}

impl<V> SymbolTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a new symbol.
    ///
    /// # Errors
    /// Returns the rejected value if a symbol with the same (normalized) name already exists.
    pub fn define<S: AsRef<str>>(&mut self, label: S, value: V) -> Result<(), V> {
        let label = normalize(label.as_ref());

        if self.index.contains_key(&label) {
            return Err(value);
        }

        self.index.insert(label.clone(), self.entries.len());
        self.entries.push((label, value));

        Ok(())
    }

    pub fn get<S: AsRef<str>>(&self, label: S) -> Option<&V> {
        self.index
            .get(&normalize(label.as_ref()))
            .map(|i| &self.entries[*i].1)
    }

    pub fn contains<S: AsRef<str>>(&self, label: S) -> bool {
        self.index.contains_key(&normalize(label.as_ref()))
    }

    /// Iterates over the symbols in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(label, value)| (label.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a new table with the same labels in the same order.
    pub fn map<U, F>(&self, mut f: F) -> SymbolTable<U>
    where
        F: FnMut(&str, &V) -> U,
    {
        SymbolTable {
            entries: self
                .entries
                .iter()
                .map(|(label, value)| (label.clone(), f(label, value)))
                .collect(),
            index: self.index.clone(),
        }
    }

    /// Finds the defined label most similar to `label`, for "did you mean" hints.
    pub fn closest<S: AsRef<str>>(&self, label: S) -> Option<&str> {
        let label = normalize(label.as_ref());

        self.entries
            .iter()
            .map(|(name, _)| (edit_distance::edit_distance(&label, name), name.as_str()))
            .filter(|(distance, _)| *distance <= 2)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, name)| name)
    }
}

#[test]
fn test_define_and_lookup() {
    let mut table = SymbolTable::new();

    assert_eq!(table.define("loop", 3usize), Ok(()));
    assert_eq!(table.define("End", 7), Ok(()));
    assert_eq!(table.define("LOOP", 9), Err(9));

    assert_eq!(table.get("Loop"), Some(&3));
    assert_eq!(table.get("END"), Some(&7));
    assert_eq!(table.get("start"), None);
    assert_eq!(table.len(), 2);
}

#[test]
fn test_definition_order() {
    let mut table = SymbolTable::new();

    for (i, label) in ["zeta", "alpha", "mid"].iter().enumerate() {
        table.define(label, i).unwrap();
    }

    let labels: Vec<_> = table.iter().map(|(label, _)| label).collect();
    assert_eq!(labels, ["ZETA", "ALPHA", "MID"]);

    let doubled = table.map(|_, v| v * 2);
    assert_eq!(doubled.get("mid"), Some(&4));
    assert_eq!(doubled.iter().next(), Some(("ZETA", &0)));
}

#[test]
fn test_closest() {
    let mut table = SymbolTable::new();
    table.define("LOOP", 0).unwrap();
    table.define("DONE", 4).unwrap();

    assert_eq!(table.closest("lop"), Some("LOOP"));
    assert_eq!(table.closest("DONNE"), Some("DONE"));
    assert_eq!(table.closest("SOMETHING_ELSE"), None);
}
