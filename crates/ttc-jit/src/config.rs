use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TtcError, TtcResult};

pub const DEFAULT_GENERATOR: &str = "ttc";
pub const DEFAULT_WORK_SUBDIR: &str = "ttc_transpositions";

/// Compiler family used when neither architecture nor compiler is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolchainFamily {
    #[default]
    Icpc,
    Gxx,
}

impl ToolchainFamily {
    fn parse(value: &str) -> TtcResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "icpc" | "intel" => Ok(ToolchainFamily::Icpc),
            "g++" | "gxx" | "gcc" | "gnu" => Ok(ToolchainFamily::Gxx),
            other => Err(TtcError::invalid(format!(
                "TTC_DEFAULT_COMPILER must be icpc or g++, got '{other}'"
            ))),
        }
    }
}

/// Where and how the pipeline runs its external tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub generator: PathBuf,
    pub root_dir: PathBuf,
    pub work_subdir: PathBuf,
    pub generator_timeout: Option<Duration>,
    pub build_timeout: Option<Duration>,
    pub default_family: ToolchainFamily,
    pub write_manifest: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generator: PathBuf::from(DEFAULT_GENERATOR),
            root_dir: PathBuf::from("."),
            work_subdir: PathBuf::from(DEFAULT_WORK_SUBDIR),
            generator_timeout: None,
            build_timeout: None,
            default_family: ToolchainFamily::default(),
            write_manifest: true,
        }
    }
}

impl PipelineConfig {
    /// Reads `TTC_*` variables over the defaults. Blank values are ignored.
    pub fn from_env() -> TtcResult<Self> {
        let mut config = Self::default();
        if let Some(value) = non_empty_var("TTC_GENERATOR") {
            config.generator = PathBuf::from(value);
        }
        if let Some(value) = non_empty_var("TTC_ROOT_DIR") {
            config.root_dir = PathBuf::from(value);
        }
        if let Some(value) = non_empty_var("TTC_WORK_SUBDIR") {
            config.work_subdir = PathBuf::from(value);
        }
        if let Some(value) = non_empty_var("TTC_GENERATOR_TIMEOUT_MS") {
            config.generator_timeout = Some(parse_millis("TTC_GENERATOR_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = non_empty_var("TTC_BUILD_TIMEOUT_MS") {
            config.build_timeout = Some(parse_millis("TTC_BUILD_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = non_empty_var("TTC_DEFAULT_COMPILER") {
            config.default_family = ToolchainFamily::parse(&value)?;
        }
        if let Some(value) = non_empty_var("TTC_WRITE_MANIFEST") {
            config.write_manifest = parse_bool(&value);
        }
        Ok(config)
    }

    pub fn with_root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = root.into();
        self
    }

    pub fn with_generator(mut self, generator: impl Into<PathBuf>) -> Self {
        self.generator = generator.into();
        self
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root_dir.join(&self.work_subdir)
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_millis(key: &str, value: &str) -> TtcResult<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|err| {
            TtcError::invalid(format!("{key}='{value}' is not a millisecond count: {err}"))
        })
}

pub(crate) fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}
