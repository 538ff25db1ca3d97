// The unmangled C entry points, built with `--features c-abi`
use dpi_dispatch::binding::Int4Fn;
use dpi_dispatch::{callbacks, exports, Environment, MemorySink, NativeSymbol, ProviderTable};
use dpi_dispatch::{Symbol, SymbolResolver};
use std::ffi::{c_char, c_void, CStr};
use std::sync::{Arc, Mutex, OnceLock};

static HEADERS: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());
static REGS: Mutex<Vec<[i32; 4]>> = Mutex::new(Vec::new());

extern "C" fn record_header(text: *const c_char) {
    let bytes = unsafe { CStr::from_ptr(text) }.to_bytes().to_vec();
    HEADERS.lock().unwrap().push(bytes);
}

// print_header is native, print_reg registered, everything else missing
struct TestProviders {
    table: ProviderTable,
}

impl SymbolResolver for TestProviders {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        match name {
            "print_header" => unsafe { NativeSymbol::from_raw(record_header as *mut c_void) }
                .map(Symbol::Native),
            _ => self.table.resolve(name),
        }
    }
}

fn sink() -> &'static MemorySink {
    static SINK: OnceLock<Arc<MemorySink>> = OnceLock::new();
    SINK.get_or_init(|| {
        let sink = Arc::new(MemorySink::new());
        let table = ProviderTable::new().with::<Int4Fn>(
            "print_reg",
            Arc::new(|a: i32, b: i32, c: i32, d: i32| REGS.lock().unwrap().push([a, b, c, d])),
        );
        callbacks::install(Environment::new(TestProviders { table }, sink.clone())).unwrap();
        sink
    })
}

#[test]
fn exported_header_passes_bytes_unchanged() {
    sink();
    unsafe { exports::print_header(b"stage\xff\xfeX\0".as_ptr() as *const c_char) };

    assert!(HEADERS
        .lock()
        .unwrap()
        .contains(&b"stage\xff\xfeX".to_vec()));
}

#[test]
fn exported_integer_import_forwards() {
    sink();
    exports::print_reg(4, 3, 2, 1);
    assert!(REGS.lock().unwrap().contains(&[4, 3, 2, 1]));
}

#[test]
fn exported_missing_import_reports() {
    let sink = sink();
    exports::print_close();
    exports::print_close();
    assert!(sink.count_for("print_close") >= 2);
}
