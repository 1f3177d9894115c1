use std::ffi::{c_int, c_void};
use std::path::Path;

use libloading::Library;

use crate::codegen::ENTRY_SYMBOL;
use crate::error::{TtcError, TtcResult};
use crate::options::Arch;

/// Host entry: `void transpose(input, result, alpha, beta, lda, ldb)`.
pub type CpuEntry = unsafe extern "C" fn(
    *const c_void,
    *mut c_void,
    *const c_void,
    *const c_void,
    *const c_int,
    *const c_int,
);

/// Accelerator entry: the host signature plus `size` and `total_size`,
/// returning a CUDA status.
pub type GpuEntry = unsafe extern "C" fn(
    *const c_void,
    *mut c_void,
    *const c_void,
    *const c_void,
    *const c_int,
    *const c_int,
    *const c_int,
    c_int,
) -> c_int;

#[derive(Debug, Clone, Copy)]
pub enum Kernel {
    Cpu(CpuEntry),
    Gpu(GpuEntry),
}

/// A loaded artifact with its resolved entry point.
///
/// `kernel` points into `library` and must not outlive it.
pub struct LoadedKernel {
    pub(crate) kernel: Kernel,
    _library: Library,
}

impl LoadedKernel {
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }
}

impl std::fmt::Debug for LoadedKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedKernel").field("kernel", &self.kernel).finish()
    }
}

/// Loads `path` and resolves the entry symbol for `arch`.
pub fn load(path: &Path, arch: Arch) -> TtcResult<LoadedKernel> {
    if !path.exists() {
        return Err(TtcError::build(format!(
            "artifact {} was not produced",
            path.display()
        )));
    }
    let library = unsafe { Library::new(path) }
        .map_err(|err| TtcError::build(format!("failed to load {}: {err}", path.display())))?;

    let kernel = resolve(&library, arch).map_err(|err| TtcError::SymbolResolutionFailure {
        symbol: ENTRY_SYMBOL.to_string(),
        artifact: path.display().to_string(),
        reason: err.to_string(),
    })?;
    Ok(LoadedKernel {
        kernel,
        _library: library,
    })
}

fn resolve(library: &Library, arch: Arch) -> Result<Kernel, libloading::Error> {
    let symbol = ENTRY_SYMBOL.as_bytes();
    unsafe {
        if arch.is_accelerator() {
            library.get::<GpuEntry>(symbol).map(|entry| Kernel::Gpu(*entry))
        } else {
            library.get::<CpuEntry>(symbol).map(|entry| Kernel::Cpu(*entry))
        }
    }
}
