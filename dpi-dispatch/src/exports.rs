//! C entry points for the declared imports (feature `c-abi`)
//!
//! Exported unmangled with the same C signatures the simulator declares, so a
//! build of this crate can be linked in place of the generated stub module.
//! Implementations are searched with `RTLD_NEXT` semantics by default, which
//! never finds these definitions again. String arguments reach a native
//! implementation as the original pointer.

use crate::callbacks;
use std::ffi::{c_char, c_int};

/// # Safety
/// `a_1` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn print_header(a_1: *const c_char) {
    callbacks::print_header_c(a_1);
}

#[no_mangle]
pub extern "C" fn print_cycles() {
    callbacks::print_cycles();
}

/// # Safety
/// `a_1` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn print_stage(a_1: *const c_char, a_2: c_int, a_3: c_int, a_4: c_int) {
    callbacks::print_stage_c(a_1, a_2, a_3, a_4);
}

#[no_mangle]
pub extern "C" fn print_reg(a_1: c_int, a_2: c_int, a_3: c_int, a_4: c_int) {
    callbacks::print_reg(a_1, a_2, a_3, a_4);
}

#[no_mangle]
pub extern "C" fn print_membus(
    a_1: c_int,
    a_2: c_int,
    a_3: c_int,
    a_4: c_int,
    a_5: c_int,
    a_6: c_int,
) {
    callbacks::print_membus(a_1, a_2, a_3, a_4, a_5, a_6);
}

#[no_mangle]
pub extern "C" fn print_close() {
    callbacks::print_close();
}
