//! Glue translation units that bind the stable `transpose` symbol to the
//! generator's kernel.

mod cuda;
mod host;
mod types;
mod utils;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{TtcError, TtcResult};
use crate::generator::GeneratedHeader;
use crate::options::{Arch, Datatype, Options};
use crate::param::PlanParam;

pub use types::TypeAliases;

/// Exported entry symbol of every built artifact.
pub const ENTRY_SYMBOL: &str = "transpose";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlueTarget {
    Host,
    Cuda,
}

impl GlueTarget {
    pub fn for_arch(arch: Arch) -> TtcResult<Self> {
        match arch {
            Arch::Default | Arch::Avx | Arch::Avx512 | Arch::Knc => Ok(GlueTarget::Host),
            Arch::Cuda => Ok(GlueTarget::Cuda),
            Arch::Power => Err(TtcError::unsupported(
                "no glue target for the POWER architecture",
            )),
        }
    }
}

/// An emitted glue file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlueSource {
    pub stem: String,
    pub target: GlueTarget,
    pub path: PathBuf,
}

impl GlueSource {
    /// Object file names the link step consumes, in link order.
    pub fn object_names(&self) -> Vec<String> {
        match self.target {
            GlueTarget::Host => vec![format!("{}.o", self.stem)],
            GlueTarget::Cuda => vec![format!("{}.o", self.stem), format!("lib{}.o", self.stem)],
        }
    }

    pub fn artifact_name(&self) -> String {
        format!("lib{}{}", self.stem, lib_ext())
    }
}

/// Renders the glue source text without touching the filesystem.
pub fn render_glue(
    datatype: Datatype,
    target: GlueTarget,
    param: &PlanParam,
    header: &GeneratedHeader,
) -> String {
    let aliases = TypeAliases::new(datatype, target);
    match target {
        GlueTarget::Host => host::render(&aliases, param, header),
        GlueTarget::Cuda => cuda::render(&aliases, param, header, datatype),
    }
}

/// File name the glue source is written to for `target`.
pub fn glue_file_name(stem: &str, target: GlueTarget) -> String {
    match target {
        GlueTarget::Host => format!("{stem}.cpp"),
        GlueTarget::Cuda => format!("lib{stem}.cu"),
    }
}

/// Writes the glue file for the configured architecture into `work_dir`.
pub fn emit_glue_source(
    options: &Options,
    param: &PlanParam,
    header: &GeneratedHeader,
    work_dir: &Path,
) -> TtcResult<GlueSource> {
    let target = GlueTarget::for_arch(options.arch)?;
    let text = render_glue(options.datatype, target, param, header);
    let path = work_dir.join(glue_file_name(header.stem(), target));
    fs::write(&path, text)
        .map_err(|err| TtcError::resource(format!("writing {}", path.display()), err))?;
    Ok(GlueSource {
        stem: header.stem().to_string(),
        target,
        path,
    })
}

pub(crate) fn lib_ext() -> &'static str {
    if cfg!(target_os = "macos") {
        ".dylib"
    } else if cfg!(target_os = "windows") {
        ".dll"
    } else {
        ".so"
    }
}

fn alias_defines(out: &mut String, aliases: &TypeAliases) {
    utils::push_line(out, 0, &format!("#define TENSOR_IN_T {}", aliases.tensor_in));
    utils::push_line(out, 0, &format!("#define TENSOR_OUT_T {}", aliases.tensor_out));
    utils::push_line(out, 0, &format!("#define ALPHA_T {}", aliases.alpha));
    utils::push_line(out, 0, &format!("#define BETA_T {}", aliases.beta));
}
