use std::collections::hash_map::DefaultHasher;
use std::ffi::c_void;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{TtcError, TtcResult};
use crate::options::{Datatype, Precision};

/// One transposition request.
///
/// `perm`, `size` and `loop_perm` form the signature that decides plan reuse.
/// `alpha`, `beta`, `lda` and `ldb` only affect how a plan is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransposeParam {
    pub perm: Vec<u32>,
    pub size: Vec<u32>,
    pub loop_perm: Option<Vec<u32>>,
    pub alpha: f64,
    pub beta: f64,
    pub lda: Option<Vec<i32>>,
    pub ldb: Option<Vec<i32>>,
}

impl TransposeParam {
    pub fn new(perm: &[u32], size: &[u32]) -> Self {
        Self {
            perm: perm.to_vec(),
            size: size.to_vec(),
            loop_perm: None,
            alpha: 1.0,
            beta: 0.0,
            lda: None,
            ldb: None,
        }
    }

    pub fn with_loop_perm(mut self, loop_perm: &[u32]) -> Self {
        self.loop_perm = Some(loop_perm.to_vec());
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_strides(mut self, lda: &[i32], ldb: &[i32]) -> Self {
        self.lda = Some(lda.to_vec());
        self.ldb = Some(ldb.to_vec());
        self
    }

    pub fn dim(&self) -> usize {
        self.perm.len()
    }

    pub fn validate(&self) -> TtcResult<()> {
        let dim = self.dim();
        if dim == 0 {
            return Err(TtcError::invalid("transpose param has no dimensions"));
        }
        if self.size.len() != dim {
            return Err(TtcError::invalid(format!(
                "size has {} entries, expected {dim}",
                self.size.len()
            )));
        }
        if self.size.contains(&0) {
            return Err(TtcError::invalid("tensor extents must be non-zero"));
        }
        let optional = [
            ("loop_perm", self.loop_perm.as_ref().map(Vec::len)),
            ("lda", self.lda.as_ref().map(Vec::len)),
            ("ldb", self.ldb.as_ref().map(Vec::len)),
        ];
        for (name, len) in optional {
            if let Some(len) = len {
                if len != dim {
                    return Err(TtcError::invalid(format!(
                        "{name} has {len} entries, expected {dim}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn signature(&self) -> Signature<'_> {
        Signature {
            perm: &self.perm,
            size: &self.size,
            loop_perm: self.loop_perm.as_deref(),
        }
    }

    /// Product of the extents, folded from the last axis to the first.
    pub fn total_elements(&self) -> usize {
        self.size
            .iter()
            .rev()
            .fold(1usize, |acc, &extent| acc.saturating_mul(extent as usize))
    }
}

/// Borrowed view over the signature members of a [`TransposeParam`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature<'a> {
    pub perm: &'a [u32],
    pub size: &'a [u32],
    pub loop_perm: Option<&'a [u32]>,
}

impl Signature<'_> {
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    pub fn dim(&self) -> usize {
        self.perm.len()
    }
}

/// alpha or beta stored at the precision the kernel reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Single(f32),
    Double(f64),
}

impl Scalar {
    pub fn new(value: f64, precision: Precision) -> Self {
        match precision {
            Precision::Single => Scalar::Single(value as f32),
            Precision::Double => Scalar::Double(value),
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Scalar::Single(v) => v == 0.0,
            Scalar::Double(v) => v == 0.0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Single(v) => v as f64,
            Scalar::Double(v) => v,
        }
    }

    pub(crate) fn as_ptr(&self) -> *const c_void {
        match self {
            Scalar::Single(v) => v as *const f32 as *const c_void,
            Scalar::Double(v) => v as *const f64 as *const c_void,
        }
    }
}

/// The private copy of a request a plan is built from and called with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanParam {
    pub perm: Vec<u32>,
    pub size: Vec<u32>,
    pub loop_perm: Option<Vec<u32>>,
    pub alpha: Scalar,
    pub beta: Scalar,
    pub lda: Option<Vec<i32>>,
    pub ldb: Option<Vec<i32>>,
}

impl PlanParam {
    /// Copies `param`, narrowing the scalars to the datatype's precision.
    ///
    /// alpha <= 0 becomes 1.0 and beta <= 0 becomes 0.0.
    pub fn normalize(param: &TransposeParam, datatype: Datatype) -> TtcResult<Self> {
        param.validate()?;
        let alpha = if param.alpha <= 0.0 { 1.0 } else { param.alpha };
        let beta = if param.beta <= 0.0 { 0.0 } else { param.beta };
        Ok(Self {
            perm: param.perm.clone(),
            size: param.size.clone(),
            loop_perm: param.loop_perm.clone(),
            alpha: Scalar::new(alpha, datatype.alpha_precision()),
            beta: Scalar::new(beta, datatype.beta_precision()),
            lda: param.lda.clone(),
            ldb: param.ldb.clone(),
        })
    }

    pub fn dim(&self) -> usize {
        self.perm.len()
    }

    pub fn signature(&self) -> Signature<'_> {
        Signature {
            perm: &self.perm,
            size: &self.size,
            loop_perm: self.loop_perm.as_deref(),
        }
    }

    pub fn total_elements(&self) -> usize {
        self.size
            .iter()
            .rev()
            .fold(1usize, |acc, &extent| acc.saturating_mul(extent as usize))
    }
}
