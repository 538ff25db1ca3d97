//! Native symbol lookup through the dynamic loader
//!
//! `ProcessResolver` searches the modules already loaded into the process.
//! `LibraryResolver` opens one provider module explicitly and searches only
//! that module.

use super::{NativeSymbol, Symbol, SymbolResolver};
use crate::config::SearchScope;
use crate::types::{DispatchError, Result};
use std::any::Any;
use std::ffi::{c_void, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn symbol_name(name: &str) -> Option<CString> {
    match CString::new(name) {
        Ok(name) => Some(name),
        Err(_) => {
            log::warn!("Invalid symbol name {:?}: contains a NUL byte", name);
            None
        }
    }
}

/// Resolver over the process's global symbol namespace
pub struct ProcessResolver {
    scope: SearchScope,
    #[cfg(unix)]
    global: libloading::os::unix::Library,
}

impl ProcessResolver {
    pub fn new(scope: SearchScope) -> Self {
        Self {
            scope,
            #[cfg(unix)]
            global: libloading::os::unix::Library::this(),
        }
    }

    pub fn scope(&self) -> SearchScope {
        self.scope
    }
}

impl Default for ProcessResolver {
    fn default() -> Self {
        Self::new(SearchScope::default())
    }
}

#[cfg(unix)]
impl ProcessResolver {
    fn lookup(&self, name: &CString) -> *mut c_void {
        match self.scope {
            // SAFETY: RTLD_NEXT is a valid pseudo-handle and `name` is
            // NUL-terminated. The search starts after the module containing
            // this call, so our own definitions are never returned.
            SearchScope::Next => unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) },
            SearchScope::Global => {
                // SAFETY: the symbol is read as an address only.
                let found = unsafe { self.global.get::<*mut c_void>(name.as_bytes_with_nul()) };
                match found {
                    Ok(symbol) => past_own_module(*symbol, name),
                    Err(_) => std::ptr::null_mut(),
                }
            }
        }
    }
}

/// `addr`, unless it is this module's own definition of `name`; then the next
/// definition after this module in load order
///
/// A global lookup returns the first definition only. When that is ours, every
/// module loaded before us lacks the name, so continuing with `RTLD_NEXT`
/// covers the rest of the search.
#[cfg(unix)]
fn past_own_module(addr: *mut c_void, name: &CString) -> *mut c_void {
    if !is_own_module(addr) {
        return addr;
    }

    log::debug!("Skipping {:?} in the dispatch module itself; searching later modules", name);
    // SAFETY: as for `SearchScope::Next`.
    unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) }
}

/// True if `addr` lives in the same loaded module as this code
#[cfg(unix)]
fn is_own_module(addr: *mut c_void) -> bool {
    if addr.is_null() {
        return false;
    }

    let here = is_own_module as *const c_void;
    // SAFETY: dladdr only inspects the loader's module list and writes the
    // out-parameter; a zero return leaves it unspecified and is checked.
    unsafe {
        let mut found: libc::Dl_info = std::mem::zeroed();
        let mut own: libc::Dl_info = std::mem::zeroed();
        if libc::dladdr(addr as *const c_void, &mut found) == 0
            || libc::dladdr(here, &mut own) == 0
        {
            return false;
        }
        found.dli_fbase == own.dli_fbase
    }
}

impl SymbolResolver for ProcessResolver {
    #[cfg(unix)]
    fn resolve(&self, name: &str) -> Option<Symbol> {
        let c_name = symbol_name(name)?;
        let addr = self.lookup(&c_name);
        // SAFETY: a name match in the process namespace is taken as the
        // declared C function; see `NativeSymbol::from_raw`.
        unsafe { NativeSymbol::from_raw(addr) }.map(Symbol::Native)
    }

    #[cfg(not(unix))]
    fn resolve(&self, name: &str) -> Option<Symbol> {
        static WARNED: std::sync::Once = std::sync::Once::new();
        WARNED.call_once(|| {
            log::warn!("Process namespace search is not supported on this platform");
        });
        log::trace!("{} not searched in process namespace", name);
        None
    }

    fn describe(&self) -> String {
        match self.scope {
            SearchScope::Next => "process (next)".to_string(),
            SearchScope::Global => "process (global)".to_string(),
        }
    }
}

/// Resolver over one explicitly loaded provider module
///
/// The module stays loaded while the resolver or any handler bound from one
/// of its symbols is alive.
pub struct LibraryResolver {
    path: PathBuf,
    library: Arc<libloading::Library>,
}

impl LibraryResolver {
    /// Load a provider module
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // SAFETY: loading runs the module's initialisers; provider modules are
        // trusted the same way the simulator trusts its DPI libraries.
        let library = unsafe { libloading::Library::new(&path) }.map_err(|e| {
            DispatchError::LibraryLoad {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        log::info!("Loaded provider module: {:?}", path);
        Ok(Self {
            path,
            library: Arc::new(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SymbolResolver for LibraryResolver {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        let c_name = symbol_name(name)?;
        // SAFETY: the symbol is read as an address only.
        let addr = match unsafe { self.library.get::<*mut c_void>(c_name.as_bytes_with_nul()) } {
            Ok(symbol) => *symbol,
            Err(_) => return None,
        };

        let owner: Arc<dyn Any + Send + Sync> = self.library.clone();
        // SAFETY: see `NativeSymbol::from_raw`; the owner keeps the module mapped.
        unsafe { NativeSymbol::from_raw(addr) }.map(|native| Symbol::Native(native.with_owner(owner)))
    }

    fn describe(&self) -> String {
        format!("module {}", self.path.display())
    }
}
