use crate::generator::GeneratedHeader;
use crate::param::PlanParam;

use super::utils::{join_ints, push_blank, push_block, push_line};
use super::{alias_defines, TypeAliases, ENTRY_SYMBOL};

pub(super) fn render(aliases: &TypeAliases, param: &PlanParam, header: &GeneratedHeader) -> String {
    let mut out = String::new();
    push_line(&mut out, 0, &format!("#include \"{}\"", header.file_name()));
    if aliases.complex {
        push_line(&mut out, 0, "#include <complex.h>");
    }
    push_blank(&mut out);
    alias_defines(&mut out, aliases);
    push_blank(&mut out);

    let signature = format!(
        "void {ENTRY_SYMBOL}(const void *input, void *result, const void *alpha, const void *beta, const int *lda, const int *ldb)"
    );
    push_line(&mut out, 0, "extern \"C\" {");
    push_line(&mut out, 0, &format!("{signature};"));
    push_line(&mut out, 0, "}");
    push_blank(&mut out);

    let beta = if param.beta.is_zero() {
        ""
    } else {
        "*(const BETA_T *)beta, "
    };
    push_line(&mut out, 0, &signature);
    push_line(&mut out, 0, "{");
    if param.beta.is_zero() {
        push_line(&mut out, 1, "(void)beta;");
    }
    push_block(
        &mut out,
        1,
        &format!(
            "{stem}<{sizes}>((const TENSOR_IN_T *)input, (TENSOR_OUT_T *)result, *(const ALPHA_T *)alpha, {beta}lda, ldb);",
            stem = header.stem(),
            sizes = join_ints(&param.size),
        ),
    );
    push_line(&mut out, 0, "}");
    out
}
