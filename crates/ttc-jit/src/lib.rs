//! Just-in-time plans for tensor transpositions.
//!
//! A [`Handler`] turns a [`TransposeParam`] into a [`Plan`]: it runs the
//! `ttc` generator, wraps the generated kernel in a small glue unit, builds a
//! shared library and loads it. Plans are cached by signature (perm, size and
//! loop order) for the lifetime of the handler.

pub mod args;
pub mod codegen;
pub mod config;
pub mod error;
pub mod generator;
pub mod handler;
pub mod loader;
pub mod logging;
pub mod options;
pub mod param;
pub mod pipeline;
pub mod plan;
mod process;
pub mod registry;
pub mod toolchain;

pub use config::{PipelineConfig, ToolchainFamily};
pub use error::{TtcError, TtcResult};
pub use handler::Handler;
pub use options::{
    Arch, Compiler, Datatype, ElementKind, OptionKind, OptionValue, Options, Precision,
    StatusFlags, ThreadBlock,
};
pub use param::{PlanParam, Scalar, Signature, TransposeParam};
pub use plan::{Element, Plan, PlanStage};
