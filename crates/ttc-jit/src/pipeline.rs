use std::fs;

use tracing::{debug, info, info_span, warn, Span};

use crate::args::GeneratorCommand;
use crate::codegen::{self, GlueTarget};
use crate::config::PipelineConfig;
use crate::error::{TtcError, TtcResult};
use crate::generator;
use crate::loader;
use crate::options::Options;
use crate::param::PlanParam;
use crate::plan::{Plan, PlanStage};
use crate::toolchain;

/// Per-build state handed to every stage.
pub struct BuildContext {
    span: Span,
    stage: PlanStage,
}

impl BuildContext {
    pub fn new(param: &PlanParam) -> Self {
        let span = info_span!(
            "ttc.plan",
            signature = %format!("{:016x}", param.signature().fingerprint()),
            dim = param.dim(),
        );
        Self {
            span,
            stage: PlanStage::Requested,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn stage(&self) -> PlanStage {
        self.stage
    }

    fn advance(&mut self, next: PlanStage) {
        self.span.in_scope(|| debug!(from = %self.stage, to = %next, "plan stage"));
        self.stage = next;
    }

    fn fail(&mut self, err: &TtcError) {
        self.span.in_scope(|| {
            warn!(stage = %self.stage, kind = err.kind(), error = %err, "plan creation failed")
        });
        self.stage = PlanStage::Failed;
    }
}

/// Generates, builds and loads a plan for `param`.
///
/// Nothing is retained on failure except files the tools left in the work
/// directory.
pub fn create_plan(
    options: &Options,
    config: &PipelineConfig,
    param: PlanParam,
) -> TtcResult<Plan> {
    let mut ctx = BuildContext::new(&param);
    match run_stages(&mut ctx, options, config, param) {
        Ok(plan) => {
            ctx.advance(PlanStage::Ready);
            ctx.span.in_scope(|| {
                info!(
                    header = plan.header(),
                    artifact = %plan.artifact().display(),
                    "plan ready"
                )
            });
            Ok(plan)
        }
        Err(err) => {
            ctx.fail(&err);
            Err(err)
        }
    }
}

fn run_stages(
    ctx: &mut BuildContext,
    options: &Options,
    config: &PipelineConfig,
    param: PlanParam,
) -> TtcResult<Plan> {
    let command = GeneratorCommand::build(&config.generator, options, &param)?;
    GlueTarget::for_arch(options.arch)?;

    let work_dir = config.work_dir();
    fs::create_dir_all(&work_dir)
        .map_err(|err| TtcError::resource(format!("creating {}", work_dir.display()), err))?;

    ctx.advance(PlanStage::Generating);
    let header = generator::invoke_generator(
        &command,
        config.root(),
        config.generator_timeout,
        ctx.span(),
    )?;
    let glue = codegen::emit_glue_source(options, &param, &header, &work_dir)?;
    let artifact = toolchain::build(
        options,
        config,
        &param,
        &header,
        &glue,
        &work_dir,
        ctx.span(),
    )?;

    ctx.advance(PlanStage::Built);
    let loaded = loader::load(&artifact, options.arch)?;

    ctx.advance(PlanStage::Loaded);
    Ok(Plan::new(
        param,
        options.datatype,
        options.arch,
        header.file_name().to_string(),
        artifact,
        loaded,
    ))
}
