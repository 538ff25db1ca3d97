//! Handler shapes and native marshalling
//!
//! A declared import dispatches through a handler of one fixed shape, for
//! example `dyn Fn(&str) + Send + Sync`. Registered handlers already have that
//! shape; native symbols are wrapped in a closure that converts the Rust
//! arguments to their C ABI form and calls the entry point.
//!
//! Known limitation: a native symbol is matched by name only. If the module
//! defines the name with a different parameter list, calling it is undefined
//! behavior.

use crate::resolver::{NativeSymbol, Symbol};
use std::ffi::{c_char, c_int, c_void, CString};
use std::sync::Arc;

/// `()` → `void`
pub type VoidFn = dyn Fn() + Send + Sync;
/// `(string)` → `void`
pub type TextFn = dyn Fn(&str) + Send + Sync;
/// `(string, int, int, int)` → `void`
pub type StageFn = dyn Fn(&str, i32, i32, i32) + Send + Sync;
/// `(int, int, int, int)` → `void`
pub type Int4Fn = dyn Fn(i32, i32, i32, i32) + Send + Sync;
/// `(int, int, int, int, int, int)` → `void`
pub type Int6Fn = dyn Fn(i32, i32, i32, i32, i32, i32) + Send + Sync;
/// `(int)` → `int`
pub type IntFn = dyn Fn(i32) -> i32 + Send + Sync;

/// A handler shape a declared import can dispatch through
pub trait Binding: Send + Sync + 'static {
    /// Wrap a native entry point as a handler of this shape
    ///
    /// Shapes without a C ABI mapping return `None`, so native symbols for
    /// them are treated as not found.
    ///
    /// # Safety
    /// `symbol` must be a C function whose parameter list and return type
    /// match this shape.
    unsafe fn from_native(symbol: NativeSymbol) -> Option<Arc<Self>> {
        let _ = symbol;
        None
    }
}

/// Turn a located symbol into a handler of shape `F`
pub fn bind<F: ?Sized + Binding>(name: &str, symbol: Symbol) -> Option<Arc<F>> {
    match symbol {
        Symbol::Registered(handler) => match handler.downcast_ref::<Arc<F>>() {
            Some(handler) => Some(handler.clone()),
            None => {
                log::warn!(
                    "Handler registered for {} does not have shape {}; treating as not found",
                    name,
                    std::any::type_name::<F>()
                );
                None
            }
        },
        Symbol::Native(native) => {
            // SAFETY: the resolver that produced the symbol vouched for the
            // name under `NativeSymbol::from_raw`'s contract.
            let handler = unsafe { F::from_native(native) };
            if handler.is_none() {
                log::warn!(
                    "{} resolved to a native symbol but shape {} has no C mapping",
                    name,
                    std::any::type_name::<F>()
                );
            }
            handler
        }
    }
}

/// NUL-terminated copy of `text`, cut at the first interior NUL as C would see it
fn c_text(text: &str) -> CString {
    let bytes = text.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    CString::new(&bytes[..end]).unwrap_or_default()
}

/// Reinterpret a symbol address as a function pointer of type `T`
///
/// # Safety
/// `T` must be a function pointer type matching the symbol.
pub(crate) unsafe fn entry<T: Copy>(symbol: &NativeSymbol) -> T {
    debug_assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());
    std::mem::transmute_copy(&symbol.as_ptr())
}

impl Binding for VoidFn {
    unsafe fn from_native(symbol: NativeSymbol) -> Option<Arc<Self>> {
        let f: unsafe extern "C" fn() = entry(&symbol);
        Some(Arc::new(move || {
            let _module = &symbol;
            unsafe { f() }
        }))
    }
}

impl Binding for TextFn {
    unsafe fn from_native(symbol: NativeSymbol) -> Option<Arc<Self>> {
        let f: unsafe extern "C" fn(*const c_char) = entry(&symbol);
        Some(Arc::new(move |text: &str| {
            let _module = &symbol;
            let text = c_text(text);
            unsafe { f(text.as_ptr()) }
        }))
    }
}

impl Binding for StageFn {
    unsafe fn from_native(symbol: NativeSymbol) -> Option<Arc<Self>> {
        let f: unsafe extern "C" fn(*const c_char, c_int, c_int, c_int) = entry(&symbol);
        Some(Arc::new(move |stage: &str, a: i32, b: i32, c: i32| {
            let _module = &symbol;
            let stage = c_text(stage);
            unsafe { f(stage.as_ptr(), a, b, c) }
        }))
    }
}

impl Binding for Int4Fn {
    unsafe fn from_native(symbol: NativeSymbol) -> Option<Arc<Self>> {
        let f: unsafe extern "C" fn(c_int, c_int, c_int, c_int) = entry(&symbol);
        Some(Arc::new(move |a: i32, b: i32, c: i32, d: i32| {
            let _module = &symbol;
            unsafe { f(a, b, c, d) }
        }))
    }
}

impl Binding for Int6Fn {
    unsafe fn from_native(symbol: NativeSymbol) -> Option<Arc<Self>> {
        let f: unsafe extern "C" fn(c_int, c_int, c_int, c_int, c_int, c_int) = entry(&symbol);
        Some(Arc::new(move |a: i32, b: i32, c: i32, d: i32, e: i32, g: i32| {
            let _module = &symbol;
            unsafe { f(a, b, c, d, e, g) }
        }))
    }
}

impl Binding for IntFn {
    unsafe fn from_native(symbol: NativeSymbol) -> Option<Arc<Self>> {
        let f: unsafe extern "C" fn(c_int) -> c_int = entry(&symbol);
        Some(Arc::new(move |value: i32| {
            let _module = &symbol;
            unsafe { f(value) }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_c_text_truncates_at_nul() {
        assert_eq!(c_text("fetch").as_bytes(), b"fetch");
        assert_eq!(c_text("fe\0tch").as_bytes(), b"fe");
        assert_eq!(c_text("").as_bytes(), b"");
    }

    #[test]
    fn test_bind_registered_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<TextFn> = Arc::new(move |text: &str| {
            sink.lock().unwrap().push(text.to_string());
        });

        let bound = bind::<TextFn>("print_header", Symbol::registered(handler)).unwrap();
        bound("cycle 0");
        assert_eq!(*seen.lock().unwrap(), vec!["cycle 0".to_string()]);
    }

    #[test]
    fn test_bind_wrong_shape_is_not_found() {
        let handler: Arc<VoidFn> = Arc::new(|| {});
        assert!(bind::<TextFn>("print_header", Symbol::registered(handler)).is_none());
    }

    extern "C" fn triple(value: c_int) -> c_int {
        value * 3
    }

    extern "C" fn ignore_text(_text: *const c_char) {}

    #[test]
    fn test_bind_native_int_shape() {
        let symbol = unsafe { NativeSymbol::from_raw(triple as *mut c_void) }.unwrap();
        let bound = bind::<IntFn>("triple", Symbol::Native(symbol)).unwrap();
        assert_eq!(bound(14), 42);
        assert_eq!(bound(-2), -6);
    }

    #[test]
    fn test_bind_native_text_shape() {
        let symbol = unsafe { NativeSymbol::from_raw(ignore_text as *mut c_void) }.unwrap();
        let bound = bind::<TextFn>("ignore_text", Symbol::Native(symbol)).unwrap();
        bound("with\0nul");
    }
}
