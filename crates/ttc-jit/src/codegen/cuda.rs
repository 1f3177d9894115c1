use crate::generator::GeneratedHeader;
use crate::options::Datatype;
use crate::param::PlanParam;

use super::utils::{push_blank, push_block, push_line};
use super::{alias_defines, TypeAliases, ENTRY_SYMBOL};

/// Name the generator gives its device launcher.
///
/// For `zc` the generator writes the second character of the stem as `c`.
pub(super) fn kernel_name(stem: &str, datatype: Datatype) -> String {
    if datatype != Datatype::ZC || stem.len() < 2 {
        return stem.to_string();
    }
    let mut name = String::with_capacity(stem.len());
    name.push_str(&stem[..1]);
    name.push('c');
    name.push_str(&stem[2..]);
    name
}

pub(super) fn render(
    aliases: &TypeAliases,
    param: &PlanParam,
    header: &GeneratedHeader,
    datatype: Datatype,
) -> String {
    let kernel = kernel_name(header.stem(), datatype);
    let with_beta = !param.beta.is_zero();
    let beta_decl = if with_beta { "const BETA_T, " } else { "" };
    let beta_arg = if with_beta { "*(const BETA_T *)beta, " } else { "" };

    let mut out = String::new();
    push_line(&mut out, 0, "#include <cuda_runtime.h>");
    if aliases.complex {
        push_line(&mut out, 0, "#include <cuComplex.h>");
    }
    push_line(&mut out, 0, "#include <stddef.h>");
    push_blank(&mut out);
    alias_defines(&mut out, aliases);
    push_blank(&mut out);
    push_block(
        &mut out,
        0,
        r#"
        #define CHECK_CUDA(call)               \
          do {                                 \
            cudaError_t err = (call);          \
            if (err != cudaSuccess) {          \
              cudaFree(dev_input);             \
              cudaFree(dev_result);            \
              return (int)err;                 \
            }                                  \
          } while (0)
        "#,
    );
    push_blank(&mut out);
    push_line(&mut out, 0, "extern \"C\" {");
    push_line(
        &mut out,
        0,
        &format!(
            "void {kernel}(const TENSOR_IN_T *, TENSOR_OUT_T *, const ALPHA_T, {beta_decl}const int *, const int *, const int *);"
        ),
    );
    push_line(&mut out, 0, "}");
    push_blank(&mut out);
    push_line(
        &mut out,
        0,
        &format!(
            "extern \"C\" int {ENTRY_SYMBOL}(const void *input, void *result, const void *alpha, const void *beta, const int *lda, const int *ldb, const int *size, int total_size)"
        ),
    );
    push_line(&mut out, 0, "{");
    push_block(
        &mut out,
        1,
        r#"
        TENSOR_IN_T *dev_input = NULL;
        TENSOR_OUT_T *dev_result = NULL;
        const size_t in_bytes = sizeof(TENSOR_IN_T) * (size_t)total_size;
        const size_t out_bytes = sizeof(TENSOR_OUT_T) * (size_t)total_size;
        CHECK_CUDA(cudaMalloc((void **)&dev_input, in_bytes));
        CHECK_CUDA(cudaMalloc((void **)&dev_result, out_bytes));
        CHECK_CUDA(cudaMemcpy(dev_input, input, in_bytes, cudaMemcpyHostToDevice));
        "#,
    );
    if with_beta {
        push_line(
            &mut out,
            1,
            "CHECK_CUDA(cudaMemcpy(dev_result, result, out_bytes, cudaMemcpyHostToDevice));",
        );
    } else {
        push_line(&mut out, 1, "(void)beta;");
    }
    push_line(
        &mut out,
        1,
        &format!(
            "{kernel}(dev_input, dev_result, *(const ALPHA_T *)alpha, {beta_arg}size, lda, ldb);"
        ),
    );
    push_block(
        &mut out,
        1,
        r#"
        CHECK_CUDA(cudaMemcpy(result, dev_result, out_bytes, cudaMemcpyDeviceToHost));
        cudaFree(dev_input);
        cudaFree(dev_result);
        return 0;
        "#,
    );
    push_line(&mut out, 0, "}");
    out
}
