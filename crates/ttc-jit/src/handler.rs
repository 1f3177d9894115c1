use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::TtcResult;
use crate::options::{OptionKind, OptionValue, Options};
use crate::param::{PlanParam, TransposeParam};
use crate::pipeline;
use crate::plan::{Element, Plan};
use crate::registry::PlanRegistry;

struct HandlerState {
    options: Options,
    registry: PlanRegistry<Plan>,
}

/// Owns the options, pipeline configuration and every plan built so far.
///
/// Plan creation is serialised behind one lock, so a handler can be shared
/// across threads.
pub struct Handler {
    config: PipelineConfig,
    state: Mutex<HandlerState>,
}

impl Handler {
    /// A handler configured from `TTC_*` environment variables.
    pub fn new() -> TtcResult<Self> {
        Ok(Self::with_config(PipelineConfig::from_env()?))
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HandlerState {
                options: Options::new(),
                registry: PlanRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn options(&self) -> Options {
        self.lock().options.clone()
    }

    pub fn set_option(&self, value: OptionValue) {
        debug!(kind = ?value.kind(), "option set");
        self.lock().options.apply(value);
    }

    /// Decodes and applies an untyped option assignment.
    ///
    /// # Safety
    /// See [`OptionValue::from_raw`].
    pub unsafe fn set_option_raw(
        &self,
        kind: OptionKind,
        value: *const c_void,
        length: u32,
    ) -> TtcResult<()> {
        let decoded = unsafe { OptionValue::from_raw(kind, value, length) }?;
        self.set_option(decoded);
        Ok(())
    }

    pub fn plan_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Returns the plan for `param`'s signature, building it on first use.
    ///
    /// A reused plan keeps the alpha, beta and strides it was created with.
    pub fn create_or_reuse_plan(&self, param: &TransposeParam) -> TtcResult<Arc<Plan>> {
        let mut guard = self.lock();
        let HandlerState { options, registry } = &mut *guard;
        let normalized = PlanParam::normalize(param, options.datatype)?;
        let (plan, reused) = registry.find_or_try_insert_with(&param.signature(), || {
            pipeline::create_plan(&*options, &self.config, normalized)
        })?;
        if reused {
            debug!(header = plan.header(), "plan reused");
        }
        Ok(plan)
    }

    /// Finds or builds the plan for `param` and runs it once.
    pub fn transpose<I: Element, O: Element>(
        &self,
        param: &TransposeParam,
        input: &[I],
        result: &mut [O],
    ) -> TtcResult<()> {
        self.create_or_reuse_plan(param)?.execute(input, result)
    }

    fn lock(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().expect("handler state mutex poisoned")
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        let count = match self.state.get_mut() {
            Ok(state) => state.registry.len(),
            Err(poisoned) => poisoned.into_inner().registry.len(),
        };
        debug!(plans = count, "releasing handler");
    }
}
