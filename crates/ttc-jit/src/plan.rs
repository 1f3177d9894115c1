use std::ffi::{c_int, c_void};
use std::fmt;
use std::path::{Path, PathBuf};

use num_complex::{Complex32, Complex64};
use serde::Serialize;

use crate::error::{TtcError, TtcResult};
use crate::loader::{Kernel, LoadedKernel};
use crate::options::{Arch, Datatype, ElementKind};
use crate::param::{PlanParam, Signature};
use crate::registry::Signed;

/// Buffer element types a plan can be called with.
pub trait Element: Copy + Send + Sync + 'static {
    const KIND: ElementKind;
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::F32;
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::F64;
}

impl Element for Complex32 {
    const KIND: ElementKind = ElementKind::Complex32;
}

impl Element for Complex64 {
    const KIND: ElementKind = ElementKind::Complex64;
}

/// Lifecycle of a plan while it is being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanStage {
    Requested,
    Generating,
    Built,
    Loaded,
    Ready,
    Failed,
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanStage::Requested => "requested",
            PlanStage::Generating => "generating",
            PlanStage::Built => "built",
            PlanStage::Loaded => "loaded",
            PlanStage::Ready => "ready",
            PlanStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A built, loaded transpose kernel together with the request it serves.
#[derive(Debug)]
pub struct Plan {
    param: PlanParam,
    datatype: Datatype,
    arch: Arch,
    header: String,
    artifact: PathBuf,
    loaded: LoadedKernel,
}

impl Plan {
    pub(crate) fn new(
        param: PlanParam,
        datatype: Datatype,
        arch: Arch,
        header: String,
        artifact: PathBuf,
        loaded: LoadedKernel,
    ) -> Self {
        Self {
            param,
            datatype,
            arch,
            header,
            artifact,
            loaded,
        }
    }

    pub fn param(&self) -> &PlanParam {
        &self.param
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn kernel(&self) -> Kernel {
        self.loaded.kernel()
    }

    /// Elements the input buffer must hold.
    pub fn input_len(&self) -> usize {
        required_len(self.param.total_elements(), self.param.lda.as_deref())
    }

    /// Elements the result buffer must hold.
    pub fn output_len(&self) -> usize {
        required_len(self.param.total_elements(), self.param.ldb.as_deref())
    }

    /// Transposes `input` into `result`, scaling by the plan's alpha and beta.
    pub fn execute<I: Element, O: Element>(&self, input: &[I], result: &mut [O]) -> TtcResult<()> {
        check_kind("input", I::KIND, self.datatype.input_kind())?;
        check_kind("result", O::KIND, self.datatype.output_kind())?;
        check_len("input", input.len(), self.input_len())?;
        check_len("result", result.len(), self.output_len())?;
        unsafe {
            self.dispatch(
                input.as_ptr() as *const c_void,
                result.as_mut_ptr() as *mut c_void,
            )
        }
    }

    /// Untyped form of [`Plan::execute`].
    ///
    /// # Safety
    /// `input` and `result` must point to buffers of at least
    /// [`Plan::input_len`] and [`Plan::output_len`] elements of the plan's
    /// input and output types.
    pub unsafe fn execute_raw(&self, input: *const c_void, result: *mut c_void) -> TtcResult<()> {
        if input.is_null() || result.is_null() {
            return Err(TtcError::invalid("input and result buffers must not be null"));
        }
        unsafe { self.dispatch(input, result) }
    }

    unsafe fn dispatch(&self, input: *const c_void, result: *mut c_void) -> TtcResult<()> {
        let alpha = self.param.alpha.as_ptr();
        let beta = self.param.beta.as_ptr();
        let lda = self.param.lda.as_ref().map_or(std::ptr::null(), |v| v.as_ptr() as *const c_int);
        let ldb = self.param.ldb.as_ref().map_or(std::ptr::null(), |v| v.as_ptr() as *const c_int);
        match self.loaded.kernel {
            Kernel::Cpu(entry) => {
                unsafe { entry(input, result, alpha, beta, lda, ldb) };
                Ok(())
            }
            Kernel::Gpu(entry) => {
                let size = self
                    .param
                    .size
                    .iter()
                    .map(|&extent| c_int::try_from(extent))
                    .collect::<Result<Vec<c_int>, _>>()
                    .map_err(|_| TtcError::invalid("tensor extent does not fit in a C int"))?;
                let total = self
                    .param
                    .size
                    .iter()
                    .rev()
                    .try_fold(1 as c_int, |acc, &extent| acc.checked_mul(extent as c_int))
                    .ok_or_else(|| {
                        TtcError::invalid("tensor element count does not fit in a C int")
                    })?;
                let code =
                    unsafe { entry(input, result, alpha, beta, lda, ldb, size.as_ptr(), total) };
                if code != 0 {
                    return Err(TtcError::KernelFailure { code });
                }
                Ok(())
            }
        }
    }
}

impl Signed for Plan {
    fn signature(&self) -> Signature<'_> {
        self.param.signature()
    }
}

fn required_len(total: usize, strides: Option<&[i32]>) -> usize {
    let strided = strides.map_or(0, |strides| {
        strides
            .iter()
            .fold(1usize, |acc, &ld| acc.saturating_mul(ld.max(1) as usize))
    });
    total.max(strided)
}

fn check_kind(buffer: &str, actual: ElementKind, expected: ElementKind) -> TtcResult<()> {
    if actual != expected {
        return Err(TtcError::invalid(format!(
            "{buffer} elements are {actual:?} but the plan expects {expected:?}"
        )));
    }
    Ok(())
}

fn check_len(buffer: &str, actual: usize, required: usize) -> TtcResult<()> {
    if actual == 0 {
        return Err(TtcError::invalid(format!("{buffer} buffer is empty")));
    }
    if actual < required {
        return Err(TtcError::invalid(format!(
            "{buffer} buffer holds {actual} elements, plan needs {required}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_buffers_need_the_padded_extent() {
        assert_eq!(required_len(24, None), 24);
        assert_eq!(required_len(24, Some(&[4, 4, 2])), 32);
        assert_eq!(required_len(24, Some(&[2, 3, 4])), 24);
    }

    #[test]
    fn buffer_checks_report_invalid_arguments() {
        assert!(check_kind("input", ElementKind::F64, ElementKind::F32).is_err());
        assert!(check_kind("input", ElementKind::Complex32, ElementKind::Complex32).is_ok());
        assert!(matches!(check_len("input", 0, 4), Err(TtcError::InvalidArgument(_))));
        assert!(matches!(check_len("result", 3, 4), Err(TtcError::InvalidArgument(_))));
        assert!(check_len("result", 4, 4).is_ok());
    }

    #[test]
    fn stages_render_lowercase() {
        assert_eq!(PlanStage::Generating.to_string(), "generating");
        assert_eq!(PlanStage::Failed.to_string(), "failed");
    }
}
