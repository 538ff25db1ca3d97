//! Provider table
//!
//! Explicit registration of Rust implementations for declared imports. The
//! table is built at process start and handed to the environment; it replaces
//! weak-symbol linkage with an ordinary lookup.

use super::{Symbol, SymbolResolver};
use std::collections::HashMap;
use std::sync::Arc;

/// Name → registered handler
#[derive(Default, Clone)]
pub struct ProviderTable {
    handlers: HashMap<String, Symbol>,
}

impl ProviderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler of shape `F` under `name`
    ///
    /// `F` must be exactly the shape the declared import dispatches through
    /// (for example `dpi_dispatch::binding::TextFn`); a handler registered with
    /// another shape is found by name but fails to bind.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: Arc<F>) -> &mut Self
    where
        F: ?Sized + Send + Sync + 'static,
    {
        let name = name.into();
        if self.handlers.insert(name.clone(), Symbol::registered(handler)).is_some() {
            log::warn!("Replacing registered handler for {}", name);
        }
        self
    }

    /// Builder method: register a handler
    pub fn with<F>(mut self, name: impl Into<String>, handler: Arc<F>) -> Self
    where
        F: ?Sized + Send + Sync + 'static,
    {
        self.register(name, handler);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl SymbolResolver for ProviderTable {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        self.handlers.get(name).cloned()
    }

    fn describe(&self) -> String {
        format!("provider table ({} handlers)", self.handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Int4 = dyn Fn(i32, i32, i32, i32) + Send + Sync;

    #[test]
    fn test_register_and_resolve() {
        let table = ProviderTable::new()
            .with::<Int4>("print_reg", Arc::new(|_a: i32, _b: i32, _c: i32, _d: i32| {}));

        assert!(table.contains("print_reg"));
        assert_eq!(table.len(), 1);
        assert!(matches!(table.resolve("print_reg"), Some(Symbol::Registered(_))));
        assert!(table.resolve("print_membus").is_none());
    }

    #[test]
    fn test_replace_keeps_single_entry() {
        let mut table = ProviderTable::new();
        table.register::<Int4>("print_reg", Arc::new(|_: i32, _: i32, _: i32, _: i32| {}));
        table.register::<Int4>("print_reg", Arc::new(|_: i32, _: i32, _: i32, _: i32| {}));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let noop: Arc<dyn Fn() + Send + Sync> = Arc::new(|| {});
        let table = ProviderTable::new()
            .with("print_close", noop.clone())
            .with("print_cycles", noop);
        assert_eq!(table.names(), vec!["print_close", "print_cycles"]);
        assert!(!table.is_empty());
    }
}
