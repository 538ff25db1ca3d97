//! Symbol resolution
//!
//! A `SymbolResolver` answers one question: is there an implementation for a
//! given name, and if so where. Implementations either come from a
//! `ProviderTable` of Rust handlers registered at process start, or are native
//! C-ABI entry points found in loaded modules.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

mod native;
mod table;

pub use native::{LibraryResolver, ProcessResolver};
pub use table::ProviderTable;

/// Address of a C-ABI function found in a loaded module
///
/// Holds an optional owner (typically the module handle) that keeps the code
/// mapped for as long as the symbol, or any handler bound from it, is alive.
#[derive(Clone)]
pub struct NativeSymbol {
    addr: NonNull<c_void>,
    owner: Option<Arc<dyn Any + Send + Sync>>,
}

// SAFETY: the address refers to immutable code; the owner is Send + Sync.
unsafe impl Send for NativeSymbol {}
unsafe impl Sync for NativeSymbol {}

impl NativeSymbol {
    /// Wrap a raw symbol address. Returns `None` for a null address.
    ///
    /// # Safety
    /// `addr` must be the entry point of a C-ABI function whose parameter
    /// list matches every callback shape it is later bound to, and the code
    /// must stay mapped for the lifetime of the process unless an owner is
    /// attached. A name match is the only check the dispatch layer performs.
    pub unsafe fn from_raw(addr: *mut c_void) -> Option<Self> {
        NonNull::new(addr).map(|addr| Self { addr, owner: None })
    }

    /// Attach a keep-alive owner
    pub fn with_owner(mut self, owner: Arc<dyn Any + Send + Sync>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.addr.as_ptr()
    }
}

impl fmt::Debug for NativeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSymbol")
            .field("addr", &self.addr)
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

/// A located implementation
#[derive(Clone)]
pub enum Symbol {
    /// Native entry point in a loaded module
    Native(NativeSymbol),
    /// Rust handler from a `ProviderTable`; holds an `Arc<F>` for the
    /// handler shape `F` it was registered with
    Registered(Arc<dyn Any + Send + Sync>),
}

impl Symbol {
    /// Wrap a Rust handler of shape `F`
    pub fn registered<F: ?Sized + Send + Sync + 'static>(handler: Arc<F>) -> Self {
        Symbol::Registered(Arc::new(handler))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Symbol::Native(_))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Native(native) => f.debug_tuple("Native").field(native).finish(),
            Symbol::Registered(_) => f.write_str("Registered(..)"),
        }
    }
}

/// Finds implementations by name
///
/// Resolvers are consulted once per declared import; returning `None` is the
/// normal "not provided" answer, not an error.
pub trait SymbolResolver: Send + Sync {
    /// Look up an implementation for `name`
    fn resolve(&self, name: &str) -> Option<Symbol>;

    /// Short human-readable description for logs
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl<R: SymbolResolver + ?Sized> SymbolResolver for Arc<R> {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        (**self).resolve(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<R: SymbolResolver + ?Sized> SymbolResolver for Box<R> {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        (**self).resolve(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Resolver that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl SymbolResolver for NoopResolver {
    fn resolve(&self, _name: &str) -> Option<Symbol> {
        None
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

/// Ordered list of resolvers; the first hit wins
#[derive(Default)]
pub struct ChainResolver {
    resolvers: Vec<Box<dyn SymbolResolver>>,
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver to the end of the search order
    pub fn push(&mut self, resolver: impl SymbolResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    /// Builder method: append a resolver
    pub fn with(mut self, resolver: impl SymbolResolver + 'static) -> Self {
        self.push(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl SymbolResolver for ChainResolver {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        for resolver in &self.resolvers {
            if let Some(symbol) = resolver.resolve(name) {
                log::debug!("{} provided by {}", name, resolver.describe());
                return Some(symbol);
            }
        }
        log::trace!("{} not provided by any of {} resolvers", name, self.resolvers.len());
        None
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.resolvers.iter().map(|r| r.describe()).collect();
        format!("chain[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(name: &str) -> ProviderTable {
        let mut table = ProviderTable::new();
        let handler: Arc<dyn Fn() + Send + Sync> = Arc::new(|| {});
        table.register(name, handler);
        table
    }

    #[test]
    fn test_null_native_symbol() {
        let symbol = unsafe { NativeSymbol::from_raw(std::ptr::null_mut()) };
        assert!(symbol.is_none());
    }

    #[test]
    fn test_chain_first_hit_wins() {
        let chain = ChainResolver::new()
            .with(NoopResolver)
            .with(table_with("print_cycles"))
            .with(table_with("print_close"));

        assert_eq!(chain.len(), 3);
        assert!(chain.resolve("print_cycles").is_some());
        assert!(chain.resolve("print_close").is_some());
        assert!(chain.resolve("print_header").is_none());
    }

    #[test]
    fn test_chain_describe() {
        let chain = ChainResolver::new().with(NoopResolver).with(NoopResolver);
        assert_eq!(chain.describe(), "chain[none, none]");
        assert!(ChainResolver::new().is_empty());
    }

    #[test]
    fn test_symbol_debug() {
        let symbol = Symbol::registered::<dyn Fn() + Send + Sync>(Arc::new(|| {}));
        assert_eq!(format!("{:?}", symbol), "Registered(..)");
        assert!(!symbol.is_native());
    }
}
