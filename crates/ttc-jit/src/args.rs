//! Generator command-line rendering.

use std::ffi::{c_char, CString};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{TtcError, TtcResult};
use crate::options::{Arch, Compiler, Options, StatusFlags};
use crate::param::PlanParam;

/// Argument vector for one generator run, built in the generator's flag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl GeneratorCommand {
    /// Renders `options` and `param` into generator flags.
    ///
    /// Configurations the pipeline cannot build are rejected here, before
    /// anything is spawned.
    pub fn build(program: &Path, options: &Options, param: &PlanParam) -> TtcResult<Self> {
        reject_unsupported(options, param)?;

        let mut command = Self {
            program: program.to_path_buf(),
            args: Vec::new(),
        };
        if options.max_impl != 0 {
            command.push("--maxImplementations=", options.max_impl);
        }
        if options.num_threads != 0 {
            command.push("--numThreads=", options.num_threads);
        }
        if let Some(distances) = &options.prefetch_distances {
            command.push("--prefetchDistances=", join(distances));
        }
        if let Some(blockings) = &options.blockings {
            let rendered: Vec<String> = blockings.iter().map(|(a, b)| format!("{a}x{b}")).collect();
            command.push("--blockings=", rendered.join(","));
        }
        if let Some(affinity) = &options.affinity {
            command.push("--affinity=", affinity);
        }
        if let Some(value) = options.compiler.flag_value() {
            command.push("--compiler=", value);
        }
        if let Some(value) = options.datatype.flag_value() {
            command.push("--dataType=", value);
        }
        if let Some(value) = options.arch.flag_value() {
            command.push("--architecture=", value);
        }
        if let Some(value) = options.thread_block.flag_value() {
            command.push("--threadsPerBlock=", value);
        }
        for (flag, token) in StatusFlags::TOKENS {
            if options.status.contains(flag) {
                command.args.push(token.to_string());
            }
        }
        command.push("--size=", join(&param.size));
        command.push("--perm=", join(&param.perm));
        if let Some(loop_perm) = &param.loop_perm {
            command.push("--loopPerm=", join(loop_perm));
        }
        if let Some(lda) = &param.lda {
            command.push("--lda=", join(lda));
        }
        if let Some(ldb) = &param.ldb {
            command.push("--ldb=", join(ldb));
        }
        if !param.beta.is_zero() {
            command.push("--beta=", format!("{:.6}", param.beta.as_f64()));
        }
        Ok(command)
    }

    fn push(&mut self, prefix: &str, value: impl Display) {
        self.args.push(format!("{prefix}{value}"));
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// argv length including the program slot and the null terminator.
    pub fn slot_count(&self) -> usize {
        self.args.len() + 2
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    pub fn to_c_argv(&self) -> TtcResult<CArgv> {
        let program = self.program.to_string_lossy().into_owned();
        let strings = std::iter::once(program)
            .chain(self.args.iter().cloned())
            .map(|arg| {
                CString::new(arg).map_err(|err| {
                    TtcError::invalid(format!("generator argument contains NUL: {err}"))
                })
            })
            .collect::<TtcResult<Vec<_>>>()?;
        let pointers = strings
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        Ok(CArgv { strings, pointers })
    }

    /// Space-joined rendering for logs.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Owned C-style argv. The pointer table ends with a null slot.
#[derive(Debug)]
pub struct CArgv {
    strings: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl CArgv {
    pub fn as_ptr(&self) -> *const *const c_char {
        self.pointers.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn strings(&self) -> &[CString] {
        &self.strings
    }

    pub fn pointers(&self) -> &[*const c_char] {
        &self.pointers
    }
}

fn reject_unsupported(options: &Options, param: &PlanParam) -> TtcResult<()> {
    if options.compiler == Compiler::Ibm {
        return Err(TtcError::unsupported("the IBM compiler is not supported"));
    }
    match options.arch {
        Arch::Power => Err(TtcError::unsupported("the POWER architecture is not supported")),
        Arch::Cuda if param.lda.is_none() || param.ldb.is_none() => Err(TtcError::unsupported(
            "the CUDA architecture requires both lda and ldb",
        )),
        _ => Ok(()),
    }
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
