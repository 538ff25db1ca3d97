//! Stub dispatcher
//!
//! One `StubDispatcher` exists per declared import. On its first call it asks
//! the environment's resolver for an implementation, exactly once, and caches
//! the outcome for its whole lifetime. Later calls either forward to the bound
//! handler or, when nothing was found, report a diagnostic and return.

use crate::binding::{self, Binding};
use crate::caller::{self, CallerLocator};
use crate::config::{DispatchConfig, SearchScope};
use crate::diagnostics::{DiagnosticReport, DiagnosticSink, LogSink};
use crate::host::{HostCallerInfo, HostReportSink};
use crate::resolver::{
    ChainResolver, LibraryResolver, NativeSymbol, ProcessResolver, ProviderTable, Symbol,
    SymbolResolver,
};
use crate::types::{ResolutionState, Result};
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, OnceLock};

/// The collaborators a dispatcher needs: where to look, where to report, and
/// optionally how to name the caller.
#[derive(Clone)]
pub struct Environment {
    resolver: Arc<dyn SymbolResolver>,
    sink: Arc<dyn DiagnosticSink>,
    locator: Option<Arc<dyn CallerLocator>>,
}

impl Environment {
    /// Create an environment from a resolver and a sink
    pub fn new(
        resolver: impl SymbolResolver + 'static,
        sink: impl DiagnosticSink + 'static,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            sink: Arc::new(sink),
            locator: None,
        }
    }

    /// Builder method: set the caller locator
    pub fn with_locator(mut self, locator: impl CallerLocator + 'static) -> Self {
        self.locator = Some(Arc::new(locator));
        self
    }

    /// Builder method: replace the diagnostic sink
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Build an environment from configuration
    ///
    /// Search order: registered handlers in `table`, then each provider module
    /// in configuration order, then the process namespace.
    pub fn from_config(config: &DispatchConfig, table: ProviderTable) -> Result<Self> {
        let mut chain = ChainResolver::new();

        if !table.is_empty() {
            log::debug!("Registered handlers: {:?}", table.names());
            chain.push(table);
        }

        for path in &config.providers {
            chain.push(LibraryResolver::open(path)?);
        }

        if config.search_process {
            chain.push(ProcessResolver::new(config.scope));
        }

        log::info!("Dispatch search order: {}", chain.describe());
        let env = Self::new(chain, LogSink);

        Ok(if config.host_services {
            env.attach_host_services()
        } else {
            env
        })
    }

    /// Environment used when none was installed: the process namespace
    /// (excluding this module) plus any simulator services present.
    pub fn process() -> Self {
        Self::new(ProcessResolver::new(SearchScope::Next), LogSink).attach_host_services()
    }

    // Host services live in the simulator executable, so they are looked up
    // across every module.
    fn attach_host_services(mut self) -> Self {
        let host = ProcessResolver::new(SearchScope::Global);

        if let Some(sink) = HostReportSink::bind(&host) {
            self.sink = Arc::new(sink);
        }
        if let Some(locator) = HostCallerInfo::bind(&host) {
            self.locator = Some(Arc::new(locator));
        }
        self
    }

    pub fn resolver(&self) -> &dyn SymbolResolver {
        self.resolver.as_ref()
    }

    pub fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    /// Shared handle to the current sink, e.g. to wrap it in a `FanoutSink`
    pub fn sink_handle(&self) -> Arc<dyn DiagnosticSink> {
        self.sink.clone()
    }

    pub fn locator(&self) -> Option<&dyn CallerLocator> {
        self.locator.as_deref()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("resolver", &self.resolver.describe())
            .field("locator", &self.locator.is_some())
            .finish()
    }
}

// A bound implementation; `native` is kept for callers that hold C arguments
struct Bound<F: ?Sized> {
    handler: Arc<F>,
    native: Option<NativeSymbol>,
}

/// Dispatcher for one declared import with handler shape `F`
pub struct StubDispatcher<F: ?Sized + Binding> {
    name: &'static str,
    slot: OnceLock<Option<Bound<F>>>,
}

impl<F: ?Sized + Binding> StubDispatcher<F> {
    /// Create an unresolved dispatcher for `name`
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ResolutionState {
        match self.slot.get() {
            None => ResolutionState::Unresolved,
            Some(Some(_)) => ResolutionState::Present,
            Some(None) => ResolutionState::Absent,
        }
    }

    /// Settle resolution without calling; returns true if an implementation
    /// is bound. Has no effect once settled.
    pub fn resolve(&self, env: &Environment) -> bool {
        self.bound(env).is_some()
    }

    // Concurrent first callers block on the OnceLock until the single lookup
    // finishes, so every caller sees the same outcome.
    fn bound(&self, env: &Environment) -> Option<&Bound<F>> {
        self.slot
            .get_or_init(|| {
                let bound = env.resolver().resolve(self.name).and_then(|symbol| {
                    let native = match &symbol {
                        Symbol::Native(native) => Some(native.clone()),
                        Symbol::Registered(_) => None,
                    };
                    binding::bind::<F>(self.name, symbol).map(|handler| Bound { handler, native })
                });
                match bound {
                    Some(_) => log::debug!("Declared import {} bound", self.name),
                    None => log::debug!("Declared import {} has no implementation", self.name),
                }
                bound
            })
            .as_ref()
    }

    #[track_caller]
    fn report_absent(&self, env: &Environment) {
        let site = caller::locate(env.locator(), Location::caller());
        env.sink().report(&DiagnosticReport::unresolved(self.name, site));
    }

    /// Dispatch one call
    ///
    /// `forward` receives the bound handler and passes the caller's arguments
    /// through unchanged; its result is returned as `Some`. When no
    /// implementation exists a diagnostic naming the caller is reported and
    /// `None` is returned without running `forward`.
    #[track_caller]
    pub fn call<R>(&self, env: &Environment, forward: impl FnOnce(&F) -> R) -> Option<R> {
        match self.bound(env) {
            Some(bound) => Some(forward(bound.handler.as_ref())),
            None => {
                self.report_absent(env);
                None
            }
        }
    }

    /// Dispatch one call whose arguments are already in C form
    ///
    /// A native implementation is handed to `native` so the caller can pass
    /// its original arguments to the entry point byte for byte. A registered
    /// handler goes through `forward` as in [`call`](Self::call). Absence is
    /// reported the same way.
    #[track_caller]
    pub fn call_entry<R>(
        &self,
        env: &Environment,
        native: impl FnOnce(&NativeSymbol) -> R,
        forward: impl FnOnce(&F) -> R,
    ) -> Option<R> {
        match self.bound(env) {
            Some(Bound {
                native: Some(symbol),
                ..
            }) => Some(native(symbol)),
            Some(bound) => Some(forward(bound.handler.as_ref())),
            None => {
                self.report_absent(env);
                None
            }
        }
    }
}

impl<F: ?Sized + Binding> fmt::Debug for StubDispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubDispatcher")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Shape-independent view of a dispatcher, for listing the declared set
pub trait DeclaredImport: Send + Sync {
    fn name(&self) -> &'static str;
    fn state(&self) -> ResolutionState;
    fn resolve(&self, env: &Environment) -> bool;
}

impl<F: ?Sized + Binding> DeclaredImport for StubDispatcher<F> {
    fn name(&self) -> &'static str {
        StubDispatcher::name(self)
    }

    fn state(&self) -> ResolutionState {
        StubDispatcher::state(self)
    }

    fn resolve(&self, env: &Environment) -> bool {
        StubDispatcher::resolve(self, env)
    }
}
