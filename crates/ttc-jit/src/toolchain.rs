//! Compile and link steps for emitted glue sources.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, Span};

use crate::codegen::{GlueSource, GlueTarget};
use crate::config::{PipelineConfig, ToolchainFamily};
use crate::error::{TtcError, TtcResult};
use crate::generator::GeneratedHeader;
use crate::options::{Arch, Compiler, Datatype, Options};
use crate::param::PlanParam;
use crate::process;

/// A program with its fixed flags for one compile or link step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub program: &'static str,
    pub flags: &'static [&'static str],
}

/// The compile and link templates for one architecture/compiler pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toolchain {
    pub compile: Template,
    pub link: Template,
}

const GXX_AVX: Toolchain = Toolchain {
    compile: Template {
        program: "g++",
        flags: &["-c", "-O2", "-w", "-fPIC", "-fopenmp", "-march=native"],
    },
    link: Template {
        program: "g++",
        flags: &["-shared", "-fopenmp"],
    },
};

const ICPC_AVX: Toolchain = Toolchain {
    compile: Template {
        program: "icpc",
        flags: &["-c", "-O2", "-w", "-fPIC", "-xhost", "-openmp"],
    },
    link: Template {
        program: "icpc",
        flags: &["-shared", "-openmp"],
    },
};

const ICPC_AVX512: Toolchain = Toolchain {
    compile: Template {
        program: "icpc",
        flags: &["-c", "-O2", "-w", "-fPIC", "-xMIC-AVX512", "-openmp"],
    },
    link: Template {
        program: "icpc",
        flags: &["-shared", "-openmp"],
    },
};

const ICPC_KNC: Toolchain = Toolchain {
    compile: Template {
        program: "icpc",
        flags: &["-c", "-O2", "-w", "-fPIC", "-mmic", "-openmp"],
    },
    link: Template {
        program: "icpc",
        flags: &["-shared", "-openmp"],
    },
};

const NVCC: Toolchain = Toolchain {
    compile: Template {
        program: "nvcc",
        flags: &["-c", "-O2", "-rdc=true", "-Xcompiler", "-fPIC", "-lgomp"],
    },
    link: Template {
        program: "nvcc",
        flags: &["-rdc=true", "-shared", "-lgomp"],
    },
};

impl Toolchain {
    pub fn select(
        arch: Arch,
        compiler: Compiler,
        default_family: ToolchainFamily,
    ) -> TtcResult<Self> {
        match arch {
            Arch::Default => Ok(match compiler {
                Compiler::Gxx => GXX_AVX,
                Compiler::Icpc => ICPC_AVX,
                _ => match default_family {
                    ToolchainFamily::Gxx => GXX_AVX,
                    ToolchainFamily::Icpc => ICPC_AVX,
                },
            }),
            Arch::Avx if compiler == Compiler::Gxx => Ok(GXX_AVX),
            Arch::Avx => Ok(ICPC_AVX),
            Arch::Avx512 => Ok(ICPC_AVX512),
            Arch::Knc => Ok(ICPC_KNC),
            Arch::Cuda => Ok(NVCC),
            Arch::Power => Err(TtcError::unsupported(
                "no toolchain for the POWER architecture",
            )),
        }
    }
}

/// One concrete compile or link invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStep {
    pub program: String,
    pub args: Vec<String>,
}

impl BuildStep {
    fn new(template: Template, output: &str, inputs: &[String]) -> Self {
        let mut args: Vec<String> = template.flags.iter().map(|flag| flag.to_string()).collect();
        args.push("-o".to_string());
        args.push(output.to_string());
        args.extend(inputs.iter().cloned());
        Self {
            program: template.program.to_string(),
            args,
        }
    }

    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(&self, work_dir: &Path, config: &PipelineConfig) -> TtcResult<()> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(work_dir);
        let output = process::run(command, &self.program, config.build_timeout)?;
        if !output.status.success() {
            return Err(TtcError::process(process::failure_message(&self.program, &output)));
        }
        Ok(())
    }
}

/// The ordered steps that turn `glue` into a shared library.
pub fn plan_steps(toolchain: Toolchain, glue: &GlueSource) -> Vec<BuildStep> {
    let stem = &glue.stem;
    let mut steps = Vec::new();
    match glue.target {
        GlueTarget::Host => {
            steps.push(BuildStep::new(
                toolchain.compile,
                &format!("{stem}.o"),
                &[format!("{stem}.cpp")],
            ));
        }
        GlueTarget::Cuda => {
            steps.push(BuildStep::new(
                toolchain.compile,
                &format!("{stem}.o"),
                &[format!("{stem}.cu")],
            ));
            steps.push(BuildStep::new(
                toolchain.compile,
                &format!("lib{stem}.o"),
                &[format!("lib{stem}.cu")],
            ));
        }
    }
    steps.push(BuildStep::new(toolchain.link, &glue.artifact_name(), &glue.object_names()));
    steps
}

/// Record of one build, written next to the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct BuildManifest<'a> {
    pub perm: &'a [u32],
    pub size: &'a [u32],
    pub loop_perm: Option<&'a [u32]>,
    pub datatype: Datatype,
    pub arch: Arch,
    pub header: &'a str,
    pub steps: &'a [BuildStep],
    pub artifact: String,
}

/// Runs every step in `work_dir` and returns the artifact path.
///
/// The artifact's existence is not checked here; the loader reports it.
pub fn build(
    options: &Options,
    config: &PipelineConfig,
    param: &PlanParam,
    header: &GeneratedHeader,
    glue: &GlueSource,
    work_dir: &Path,
    span: &Span,
) -> TtcResult<PathBuf> {
    let _entered = span.enter();
    let toolchain = Toolchain::select(options.arch, options.compiler, config.default_family)?;
    let steps = plan_steps(toolchain, glue);
    for step in &steps {
        debug!(command = %step.display_line(), "running build step");
        step.run(work_dir, config)?;
    }

    let artifact = work_dir.join(glue.artifact_name());
    if config.write_manifest {
        let manifest = BuildManifest {
            perm: &param.perm,
            size: &param.size,
            loop_perm: param.loop_perm.as_deref(),
            datatype: options.datatype,
            arch: options.arch,
            header: header.file_name(),
            steps: &steps,
            artifact: artifact.display().to_string(),
        };
        write_manifest(&work_dir.join(format!("lib{}.json", glue.stem)), &manifest)?;
    }
    Ok(artifact)
}

fn write_manifest(path: &Path, manifest: &BuildManifest<'_>) -> TtcResult<()> {
    let text = serde_json::to_string_pretty(manifest)
        .map_err(|err| TtcError::build(format!("failed to serialise build manifest: {err}")))?;
    fs::write(path, text)
        .map_err(|err| TtcError::resource(format!("writing {}", path.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glue(target: GlueTarget) -> GlueSource {
        GlueSource {
            stem: "sT".to_string(),
            target,
            path: PathBuf::from("sT.cpp"),
        }
    }

    #[test]
    fn selection_follows_arch_then_compiler() {
        let select = |arch, compiler, family| Toolchain::select(arch, compiler, family).unwrap();
        assert_eq!(select(Arch::Default, Compiler::Default, ToolchainFamily::Icpc), ICPC_AVX);
        assert_eq!(select(Arch::Default, Compiler::Default, ToolchainFamily::Gxx), GXX_AVX);
        assert_eq!(select(Arch::Avx, Compiler::Gxx, ToolchainFamily::Icpc), GXX_AVX);
        assert_eq!(select(Arch::Avx, Compiler::Nvcc, ToolchainFamily::Gxx), ICPC_AVX);
        assert_eq!(select(Arch::Knc, Compiler::Gxx, ToolchainFamily::Gxx), ICPC_KNC);
        assert!(Toolchain::select(Arch::Power, Compiler::Default, ToolchainFamily::Icpc).is_err());
    }

    #[test]
    fn host_build_compiles_then_links() {
        let steps = plan_steps(GXX_AVX, &glue(GlueTarget::Host));
        let lines: Vec<String> = steps.iter().map(BuildStep::display_line).collect();
        let lib = format!("libsT{}", crate::codegen::lib_ext());
        assert_eq!(
            lines,
            [
                "g++ -c -O2 -w -fPIC -fopenmp -march=native -o sT.o sT.cpp".to_string(),
                format!("g++ -shared -fopenmp -o {lib} sT.o"),
            ]
        );
    }

    #[test]
    fn cuda_build_compiles_both_units() {
        let steps = plan_steps(NVCC, &glue(GlueTarget::Cuda));
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].args.last().map(String::as_str), Some("sT.cu"));
        assert_eq!(steps[1].args.last().map(String::as_str), Some("libsT.cu"));
        assert!(steps[2].args.ends_with(&["sT.o".to_string(), "libsT.o".to_string()]));
    }
}
