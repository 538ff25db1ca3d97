//! DPI Dispatch Library
//!
//! Deferred-binding dispatch for a fixed set of externally declared DPI
//! imports. Each import may or may not have an implementation somewhere in the
//! process; the library finds it once, forwards calls to it, and reports a
//! diagnostic naming the call site when there is none.
//!
//! # Architecture
//!
//! - `resolver`: where implementations come from (registered Rust handlers,
//!   provider modules, the process namespace)
//! - `binding`: turning a located symbol into a typed handler
//! - `dispatcher`: the resolve-once cache and call forwarding
//! - `diagnostics` / `caller`: what gets reported when nothing was found
//! - `callbacks`: the declared imports and the process-wide environment
//!
//! A missing implementation is never an error for the caller. Calls return
//! normally and the configured `DiagnosticSink` receives a report.
//!
//! # Example Usage
//!
//! ```no_run
//! use dpi_dispatch::callbacks::{self, PrintHeaderFn};
//! use dpi_dispatch::{DispatchConfig, Environment, ProviderTable};
//! use std::sync::Arc;
//!
//! // Register Rust implementations at process start
//! let mut table = ProviderTable::new();
//! table.register::<PrintHeaderFn>("print_header", Arc::new(|text: &str| {
//!     println!("== {} ==", text);
//! }));
//!
//! // Search registered handlers, then provider modules, then the process
//! let config = DispatchConfig::new().add_provider("build/libtb_print.so");
//! callbacks::install(Environment::from_config(&config, table).unwrap()).unwrap();
//!
//! callbacks::print_header("pipeline trace"); // forwarded
//! callbacks::print_cycles(); // reported unless some module provides it
//! ```

// Public modules
pub mod binding;
pub mod caller;
pub mod callbacks;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod host;
pub mod resolver;
pub mod types;

#[cfg(feature = "c-abi")]
pub mod exports;

// Re-export main types for convenience
pub use binding::Binding;
pub use caller::{with_caller_site, CallerLocator};
pub use config::{DispatchConfig, SearchScope};
pub use diagnostics::{
    CountingSink, DiagnosticReport, DiagnosticSink, FanoutSink, LogSink, MemorySink,
    UNRESOLVED_IMPORT,
};
pub use dispatcher::{DeclaredImport, Environment, StubDispatcher};
pub use resolver::{
    ChainResolver, LibraryResolver, NativeSymbol, NoopResolver, ProcessResolver, ProviderTable,
    Symbol, SymbolResolver,
};
pub use types::{CallerSite, DispatchError, ResolutionState, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh dispatcher with an empty environment reports
        let sink = std::sync::Arc::new(MemorySink::new());
        let env = Environment::new(NoopResolver, sink.clone());
        let stub: StubDispatcher<binding::VoidFn> = StubDispatcher::new("print_cycles");

        stub.call(&env, |f| f());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.reports()[0].category, UNRESOLVED_IMPORT);
    }
}
