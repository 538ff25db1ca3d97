//! The declared imports
//!
//! Six `void` callbacks the testbench declares for the pipeline printer. Each
//! is backed by its own process-wide `StubDispatcher` and resolved against the
//! installed `Environment` on first use.
//!
//! | import         | handler shape                   |
//! |----------------|---------------------------------|
//! | `print_header` | [`TextFn`] `(text)`             |
//! | `print_cycles` | [`VoidFn`] `()`                 |
//! | `print_stage`  | [`StageFn`] `(stage, a, b, c)`  |
//! | `print_reg`    | [`Int4Fn`] `(a, b, c, d)`       |
//! | `print_membus` | [`Int6Fn`] `(a, b, c, d, e, f)` |
//! | `print_close`  | [`VoidFn`] `()`                 |

use crate::binding::{self, Int4Fn, Int6Fn, StageFn, TextFn, VoidFn};
use crate::dispatcher::{DeclaredImport, Environment, StubDispatcher};
use crate::types::{DispatchError, ResolutionState, Result};
use std::borrow::Cow;
use std::ffi::{c_char, c_int, CStr};
use std::sync::OnceLock;

pub type PrintHeaderFn = TextFn;
pub type PrintCyclesFn = VoidFn;
pub type PrintStageFn = StageFn;
pub type PrintRegFn = Int4Fn;
pub type PrintMembusFn = Int6Fn;
pub type PrintCloseFn = VoidFn;

/// Names of all declared imports, in declaration order
pub const DECLARED: [&str; 6] = [
    "print_header",
    "print_cycles",
    "print_stage",
    "print_reg",
    "print_membus",
    "print_close",
];

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

static PRINT_HEADER: StubDispatcher<PrintHeaderFn> = StubDispatcher::new("print_header");
static PRINT_CYCLES: StubDispatcher<PrintCyclesFn> = StubDispatcher::new("print_cycles");
static PRINT_STAGE: StubDispatcher<PrintStageFn> = StubDispatcher::new("print_stage");
static PRINT_REG: StubDispatcher<PrintRegFn> = StubDispatcher::new("print_reg");
static PRINT_MEMBUS: StubDispatcher<PrintMembusFn> = StubDispatcher::new("print_membus");
static PRINT_CLOSE: StubDispatcher<PrintCloseFn> = StubDispatcher::new("print_close");

/// Install the process-wide environment
///
/// Must happen before the first call to any declared import, otherwise the
/// default `Environment::process()` has already been installed.
pub fn install(env: Environment) -> Result<()> {
    ENVIRONMENT
        .set(env)
        .map_err(|_| DispatchError::AlreadyInstalled)?;
    log::info!("Dispatch environment installed");
    Ok(())
}

/// The installed environment, or the process default if none was installed
pub fn environment() -> &'static Environment {
    ENVIRONMENT.get_or_init(|| {
        log::debug!("No dispatch environment installed; using process defaults");
        Environment::process()
    })
}

fn declared() -> [&'static dyn DeclaredImport; 6] {
    [
        &PRINT_HEADER,
        &PRINT_CYCLES,
        &PRINT_STAGE,
        &PRINT_REG,
        &PRINT_MEMBUS,
        &PRINT_CLOSE,
    ]
}

/// Resolve every declared import now; returns how many are bound
pub fn resolve_all() -> usize {
    let env = environment();
    declared().iter().filter(|import| import.resolve(env)).count()
}

/// Current state of every declared import, in declaration order
pub fn resolution_report() -> Vec<(&'static str, ResolutionState)> {
    declared().iter().map(|import| (import.name(), import.state())).collect()
}

#[track_caller]
pub fn print_header(text: &str) {
    PRINT_HEADER.call(environment(), |f| f(text));
}

#[track_caller]
pub fn print_cycles() {
    PRINT_CYCLES.call(environment(), |f| f());
}

#[track_caller]
pub fn print_stage(stage: &str, a: i32, b: i32, c: i32) {
    PRINT_STAGE.call(environment(), |f| f(stage, a, b, c));
}

#[track_caller]
pub fn print_reg(a: i32, b: i32, c: i32, d: i32) {
    PRINT_REG.call(environment(), |f| f(a, b, c, d));
}

#[track_caller]
pub fn print_membus(a: i32, b: i32, c: i32, d: i32, e: i32, g: i32) {
    PRINT_MEMBUS.call(environment(), |f| f(a, b, c, d, e, g));
}

#[track_caller]
pub fn print_close() {
    PRINT_CLOSE.call(environment(), |f| f());
}

/// Text of a C string argument for a Rust handler; null reads as empty
///
/// # Safety
/// `text` must be null or point at a NUL-terminated string.
unsafe fn c_text_arg<'a>(text: *const c_char) -> Cow<'a, str> {
    if text.is_null() {
        Cow::Borrowed("")
    } else {
        CStr::from_ptr(text).to_string_lossy()
    }
}

#[track_caller]
unsafe fn dispatch_c_text(stub: &StubDispatcher<TextFn>, env: &Environment, text: *const c_char) {
    stub.call_entry(
        env,
        |symbol| {
            // SAFETY: the symbol was bound with the `(const char *)` shape.
            let f: unsafe extern "C" fn(*const c_char) = unsafe { binding::entry(symbol) };
            unsafe { f(text) }
        },
        |f| f(&*unsafe { c_text_arg(text) }),
    );
}

#[track_caller]
unsafe fn dispatch_c_stage(
    stub: &StubDispatcher<StageFn>,
    env: &Environment,
    stage: *const c_char,
    a: c_int,
    b: c_int,
    c: c_int,
) {
    stub.call_entry(
        env,
        |symbol| {
            // SAFETY: the symbol was bound with the `(const char *, int, int, int)` shape.
            let f: unsafe extern "C" fn(*const c_char, c_int, c_int, c_int) =
                unsafe { binding::entry(symbol) };
            unsafe { f(stage, a, b, c) }
        },
        |f| f(&*unsafe { c_text_arg(stage) }, a, b, c),
    );
}

/// `print_header` for a caller holding a C string
///
/// A native implementation receives `text` as passed, invalid UTF-8 and null
/// included. A registered handler sees it decoded lossily, with null as "".
///
/// # Safety
/// `text` must be null or point at a NUL-terminated string.
#[track_caller]
pub unsafe fn print_header_c(text: *const c_char) {
    dispatch_c_text(&PRINT_HEADER, environment(), text);
}

/// `print_stage` for a caller holding a C string; see [`print_header_c`]
///
/// # Safety
/// `stage` must be null or point at a NUL-terminated string.
#[track_caller]
pub unsafe fn print_stage_c(stage: *const c_char, a: c_int, b: c_int, c: c_int) {
    dispatch_c_stage(&PRINT_STAGE, environment(), stage, a, b, c);
}
