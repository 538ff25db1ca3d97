//! Simulator-provided services
//!
//! When running inside the simulator, two services are exported by the host
//! executable: `svGetCallerInfo` (source location of the HDL call into the
//! current import) and `vcsMsgReport1` (the simulator's message channel).
//! Both are optional; without them the dispatch layer falls back to Rust call
//! sites and the `log` facade.

use crate::caller::CallerLocator;
use crate::diagnostics::{DiagnosticReport, DiagnosticSink};
use crate::resolver::{NativeSymbol, Symbol, SymbolResolver};
use crate::types::CallerSite;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr;

type CallerInfoFn = unsafe extern "C" fn(*mut *const c_char, *mut c_int) -> c_int;
type MsgReportFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    c_int,
    *mut c_void,
    *mut c_void,
    *const c_char,
);

fn native(resolver: &dyn SymbolResolver, name: &str) -> Option<NativeSymbol> {
    match resolver.resolve(name)? {
        Symbol::Native(native) => Some(native),
        Symbol::Registered(_) => {
            log::debug!("Ignoring registered handler for host service {}", name);
            None
        }
    }
}

/// Caller locator backed by the simulator's `svGetCallerInfo`
pub struct HostCallerInfo {
    entry: CallerInfoFn,
    _symbol: NativeSymbol,
}

impl HostCallerInfo {
    pub const SYMBOL: &'static str = "svGetCallerInfo";

    /// Bind the service if `resolver` can find it
    pub fn bind(resolver: &dyn SymbolResolver) -> Option<Self> {
        let symbol = native(resolver, Self::SYMBOL)?;
        // SAFETY: svGetCallerInfo has this signature in the DPI C layer.
        let entry: CallerInfoFn = unsafe { std::mem::transmute_copy(&symbol.as_ptr()) };
        log::debug!("Bound host service {}", Self::SYMBOL);
        Some(Self {
            entry,
            _symbol: symbol,
        })
    }
}

impl CallerLocator for HostCallerInfo {
    fn locate(&self) -> Option<CallerSite> {
        let mut file: *const c_char = ptr::null();
        let mut line: c_int = 0;
        // SAFETY: both out-pointers are valid for writes.
        let in_context = unsafe { (self.entry)(&mut file, &mut line) };
        if in_context == 0 || file.is_null() {
            return None;
        }

        // SAFETY: on success the host returns a NUL-terminated file name it owns.
        let file = unsafe { CStr::from_ptr(file) }.to_string_lossy().into_owned();
        Some(CallerSite::new(file, u32::try_from(line).unwrap_or(0)))
    }
}

/// Diagnostic sink backed by the simulator's `vcsMsgReport1`
pub struct HostReportSink {
    entry: MsgReportFn,
    _symbol: NativeSymbol,
}

impl HostReportSink {
    pub const SYMBOL: &'static str = "vcsMsgReport1";

    /// Bind the service if `resolver` can find it
    pub fn bind(resolver: &dyn SymbolResolver) -> Option<Self> {
        let symbol = native(resolver, Self::SYMBOL)?;
        // SAFETY: vcsMsgReport1 has this signature in the simulator runtime.
        let entry: MsgReportFn = unsafe { std::mem::transmute_copy(&symbol.as_ptr()) };
        log::debug!("Bound host service {}", Self::SYMBOL);
        Some(Self {
            entry,
            _symbol: symbol,
        })
    }
}

fn c_string(text: &str) -> CString {
    CString::new(text.replace('\0', "")).unwrap_or_default()
}

impl DiagnosticSink for HostReportSink {
    fn report(&self, report: &DiagnosticReport) {
        let category = c_string(report.category);
        let file = c_string(&report.site.file);
        let symbol = c_string(report.symbol);
        let line = c_int::try_from(report.site.line).unwrap_or(c_int::MAX);
        // SAFETY: every string is NUL-terminated and outlives the call; the
        // context slots are opaque to the host and passed as given.
        unsafe {
            (self.entry)(
                category.as_ptr(),
                file.as_ptr(),
                line,
                report.context[0] as *mut c_void,
                report.context[1] as *mut c_void,
                symbol.as_ptr(),
            )
        }
    }
}
