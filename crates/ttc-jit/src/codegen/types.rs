use crate::options::{Datatype, ElementKind, Precision};

use super::GlueTarget;

/// C spellings bound to `TENSOR_IN_T`, `TENSOR_OUT_T`, `ALPHA_T` and `BETA_T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeAliases {
    pub tensor_in: &'static str,
    pub tensor_out: &'static str,
    pub alpha: &'static str,
    pub beta: &'static str,
    pub complex: bool,
}

impl TypeAliases {
    pub fn new(datatype: Datatype, target: GlueTarget) -> Self {
        Self {
            tensor_in: element_name(datatype.input_kind(), target),
            tensor_out: element_name(datatype.output_kind(), target),
            alpha: precision_name(datatype.alpha_precision()),
            beta: precision_name(datatype.beta_precision()),
            complex: datatype.is_complex(),
        }
    }
}

fn element_name(kind: ElementKind, target: GlueTarget) -> &'static str {
    match (kind, target) {
        (ElementKind::F32, _) => "float",
        (ElementKind::F64, _) => "double",
        (ElementKind::Complex32, GlueTarget::Host) => "float complex",
        (ElementKind::Complex64, GlueTarget::Host) => "double complex",
        (ElementKind::Complex32, GlueTarget::Cuda) => "cuFloatComplex",
        (ElementKind::Complex64, GlueTarget::Cuda) => "cuDoubleComplex",
    }
}

fn precision_name(precision: Precision) -> &'static str {
    match precision {
        Precision::Single => "float",
        Precision::Double => "double",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_precision_rows() {
        let sd = TypeAliases::new(Datatype::SD, GlueTarget::Host);
        assert_eq!(
            (sd.tensor_in, sd.tensor_out, sd.alpha, sd.beta),
            ("float", "double", "float", "double")
        );

        let zc = TypeAliases::new(Datatype::ZC, GlueTarget::Cuda);
        assert_eq!(
            (zc.tensor_in, zc.tensor_out, zc.alpha, zc.beta),
            ("cuDoubleComplex", "cuFloatComplex", "double", "float")
        );
        assert!(zc.complex);

        assert_eq!(
            TypeAliases::new(Datatype::Default, GlueTarget::Host),
            TypeAliases::new(Datatype::S, GlueTarget::Host)
        );
    }
}
