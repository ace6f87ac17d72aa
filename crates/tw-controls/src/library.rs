//! Shared-library backed entry points.

use std::ffi::{CString, c_char};
use std::path::Path;

use libloading::Library;
use tracing::info;

use crate::error::{ControlError, ControlResult};
use crate::plugin::{DtuEntryPoints, SwapEntryPoint};

/// Bladed-style entry point symbol.
pub const DISCON_SYMBOL: &[u8] = b"DISCON";
/// DTU-style entry point symbols.
pub const DTU_INIT_SYMBOL: &[u8] = b"init_regulation";
pub const DTU_UPDATE_SYMBOL: &[u8] = b"update_regulation";

type DisconFn = unsafe extern "C" fn(*mut f32, *mut i32, *const c_char, *const c_char, *mut c_char);
type DtuFn = unsafe extern "C" fn(*mut f64, *mut f64);

fn open(path: &Path) -> ControlResult<Library> {
    // SAFETY: loading runs the library's initialisers; controller libraries
    // are trusted user configuration.
    let lib = unsafe { Library::new(path) }.map_err(|e| ControlError::LibraryLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    info!(path = %path.display(), "controller library loaded");
    Ok(lib)
}

fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> ControlResult<T> {
    // SAFETY: the caller names the symbol with its documented ABI signature.
    unsafe { lib.get::<T>(name) }
        .map(|s| *s)
        .map_err(|e| ControlError::MissingSymbol {
            symbol: String::from_utf8_lossy(name).into_owned(),
            message: e.to_string(),
        })
}

/// `DISCON` resolved from a shared library.
pub struct LibrarySwapEntry {
    func: DisconFn,
    // keeps `func` valid; dropped last
    _lib: Library,
}

impl LibrarySwapEntry {
    pub fn load(path: &Path) -> ControlResult<Self> {
        let lib = open(path)?;
        let func = symbol::<DisconFn>(&lib, DISCON_SYMBOL)?;
        Ok(Self { func, _lib: lib })
    }
}

impl SwapEntryPoint for LibrarySwapEntry {
    fn call(&mut self, swap: &mut [f32], infile: &CString, outname: &CString, message: &mut [u8]) -> i32 {
        let mut fail: i32 = 0;
        // SAFETY: swap and message outlive the call and have the lengths
        // announced in the swap records; the strings are NUL terminated.
        unsafe {
            (self.func)(
                swap.as_mut_ptr(),
                &mut fail,
                infile.as_ptr(),
                outname.as_ptr(),
                message.as_mut_ptr().cast::<c_char>(),
            );
        }
        fail
    }
}

/// `init_regulation` / `update_regulation` resolved from a shared library.
pub struct LibraryDtuEntry {
    init: DtuFn,
    update: DtuFn,
    _lib: Library,
}

impl LibraryDtuEntry {
    pub fn load(path: &Path) -> ControlResult<Self> {
        let lib = open(path)?;
        let init = symbol::<DtuFn>(&lib, DTU_INIT_SYMBOL)?;
        let update = symbol::<DtuFn>(&lib, DTU_UPDATE_SYMBOL)?;
        Ok(Self {
            init,
            update,
            _lib: lib,
        })
    }
}

impl DtuEntryPoints for LibraryDtuEntry {
    fn init(&mut self, array1: &mut [f64], array2: &mut [f64]) {
        // SAFETY: both arrays are DTU_ARRAY_LEN long as the ABI requires.
        unsafe { (self.init)(array1.as_mut_ptr(), array2.as_mut_ptr()) }
    }

    fn update(&mut self, array1: &mut [f64], array2: &mut [f64]) {
        // SAFETY: as above.
        unsafe { (self.update)(array1.as_mut_ptr(), array2.as_mut_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_typed_error() {
        let err = LibrarySwapEntry::load(Path::new("/nonexistent/controller.so"))
            .err()
            .unwrap();
        assert!(matches!(err, ControlError::LibraryLoad { .. }));
        assert!(matches!(
            LibraryDtuEntry::load(Path::new("/nonexistent/dtu.so")).err().unwrap(),
            ControlError::LibraryLoad { .. }
        ));
    }
}
