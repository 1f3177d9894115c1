#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use ttc_jit::{PipelineConfig, ToolchainFamily};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Scratch directory removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let path = std::env::temp_dir().join(format!(
            "ttc-jit-{label}-{}-{}-{nanos}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// A `/bin/sh` stand-in for the generator that logs each invocation.
pub struct FakeGenerator {
    pub dir: TempDir,
    pub script: PathBuf,
    pub log: PathBuf,
}

impl FakeGenerator {
    /// `body` runs after the invocation has been logged to `$log`.
    pub fn new(label: &str, body: &str) -> Self {
        let dir = TempDir::new(label);
        let script = dir.path().join("fake-ttc");
        let log = dir.path().join("invocations.log");
        let text = format!(
            "#!/bin/sh\nlog='{}'\necho \"$*\" >> \"$log\"\n{body}\n",
            log.display()
        );
        fs::write(&script, text).expect("write generator script");
        let mut permissions = fs::metadata(&script).expect("stat script").permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&script, permissions).expect("chmod script");
        Self { dir, script, log }
    }

    /// Prints a fixed hand-off line without producing a kernel.
    pub fn printing(label: &str, stdout: &str) -> Self {
        Self::new(label, &format!("printf '%s\\n' '{stdout}'"))
    }

    /// Writes a working header-only kernel for the requested perm into
    /// `ttc_transpositions/` and reports it.
    pub fn stub_kernels(label: &str) -> Self {
        Self::new(label, STUB_KERNEL_BODY)
    }

    pub fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_root_dir(self.dir.path())
            .with_generator(&self.script);
        config.default_family = ToolchainFamily::Gxx;
        config
    }

    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("ttc_transpositions")
    }
}

/// Column-major reference kernel: output axis `i` is input axis `perm[i]`.
const STUB_KERNEL_BODY: &str = r##"
perm=''
for arg in "$@"; do
  case "$arg" in
    --perm=*) perm="${arg#--perm=}" ;;
  esac
done
runs=$(wc -l < "$log" | tr -d ' ')
name="ttc_stub_$(echo "$perm" | tr ',' '_')_$runs"
mkdir -p ttc_transpositions
cat > "ttc_transpositions/$name.h" <<EOF
template<int... Sizes>
void $name(const float *A, float *B, const float alpha, const int *lda, const int *ldb)
{
  const int dim = sizeof...(Sizes);
  const long size[] = {Sizes...};
  const int perm[] = {$perm};
  long out_stride[dim];
  long stride = 1;
  for (int i = 0; i < dim; ++i) {
    out_stride[perm[i]] = stride;
    stride *= size[perm[i]];
  }
  for (long idx = 0; idx < stride; ++idx) {
    long rem = idx;
    long offset = 0;
    for (int d = 0; d < dim; ++d) {
      offset += (rem % size[d]) * out_stride[d];
      rem /= size[d];
    }
    B[offset] = alpha * A[idx];
  }
  (void)lda;
  (void)ldb;
}
EOF
echo "[ttc] generated 1 candidate"
echo "#include \"$name.h\""
"##;

/// True when `g++` can build an OpenMP shared object.
pub fn host_compiler_available() -> bool {
    let dir = TempDir::new("probe");
    let source = dir.path().join("probe.cpp");
    if fs::write(&source, "extern \"C\" int probe() { return 0; }\n").is_err() {
        return false;
    }
    Command::new("g++")
        .args(["-shared", "-fPIC", "-fopenmp", "-o", "libprobe.so", "probe.cpp"])
        .current_dir(dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Column-major transpose matching the stub kernel.
pub fn reference_transpose(perm: &[u32], size: &[u32], input: &[f32], alpha: f32) -> Vec<f32> {
    let dim = size.len();
    let mut out_stride = vec![0usize; dim];
    let mut stride = 1usize;
    for &axis in perm {
        out_stride[axis as usize] = stride;
        stride *= size[axis as usize] as usize;
    }
    let mut output = vec![0.0f32; stride];
    for (idx, value) in input.iter().enumerate().take(stride) {
        let mut rem = idx;
        let mut offset = 0;
        for d in 0..dim {
            let extent = size[d] as usize;
            offset += (rem % extent) * out_stride[d];
            rem /= extent;
        }
        output[offset] = alpha * value;
    }
    output
}
