//! Per-handler generator options.
//!
//! Options mirror the generator's command-line surface one field per flag.
//! Defaults emit nothing and leave the choice to the generator.

use std::ffi::c_void;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::{TtcError, TtcResult};

/// Compiler the generator is asked to target (`--compiler=`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compiler {
    #[default]
    Default,
    Gxx,
    Icpc,
    /// IBM XL for AIX. Known to the generator but rejected by the pipeline.
    Ibm,
    Nvcc,
}

impl Compiler {
    pub fn flag_value(self) -> Option<&'static str> {
        match self {
            Compiler::Default => None,
            Compiler::Gxx => Some("g++"),
            Compiler::Icpc => Some("icpc"),
            Compiler::Ibm => Some("ibm"),
            Compiler::Nvcc => Some("nvcc"),
        }
    }

    fn from_code(code: u32) -> TtcResult<Self> {
        match code {
            0 => Ok(Compiler::Default),
            1 => Ok(Compiler::Gxx),
            2 => Ok(Compiler::Icpc),
            3 => Ok(Compiler::Ibm),
            4 => Ok(Compiler::Nvcc),
            other => Err(TtcError::unsupported(format!("unknown compiler code {other}"))),
        }
    }
}

/// Element types of the input and output tensors (`--dataType=`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    #[default]
    Default,
    /// single -> single
    S,
    /// double -> double
    D,
    /// single complex -> single complex
    C,
    /// double complex -> double complex
    Z,
    /// single -> double
    SD,
    /// double -> single
    DS,
    /// single complex -> double complex
    CZ,
    /// double complex -> single complex
    ZC,
}

/// Scalar representation of one tensor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    F32,
    F64,
    Complex32,
    Complex64,
}

impl ElementKind {
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElementKind::F32 => 4,
            ElementKind::F64 => 8,
            ElementKind::Complex32 => 8,
            ElementKind::Complex64 => 16,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, ElementKind::Complex32 | ElementKind::Complex64)
    }
}

/// Floating-point width of alpha or beta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    Single,
    Double,
}

impl Datatype {
    pub fn flag_value(self) -> Option<&'static str> {
        match self {
            Datatype::Default => None,
            Datatype::S => Some("s"),
            Datatype::D => Some("d"),
            Datatype::C => Some("c"),
            Datatype::Z => Some("z"),
            Datatype::SD => Some("sd"),
            Datatype::DS => Some("ds"),
            Datatype::CZ => Some("cz"),
            Datatype::ZC => Some("zc"),
        }
    }

    pub fn input_kind(self) -> ElementKind {
        match self {
            Datatype::Default | Datatype::S | Datatype::SD => ElementKind::F32,
            Datatype::D | Datatype::DS => ElementKind::F64,
            Datatype::C | Datatype::CZ => ElementKind::Complex32,
            Datatype::Z | Datatype::ZC => ElementKind::Complex64,
        }
    }

    pub fn output_kind(self) -> ElementKind {
        match self {
            Datatype::Default | Datatype::S | Datatype::DS => ElementKind::F32,
            Datatype::D | Datatype::SD => ElementKind::F64,
            Datatype::C | Datatype::ZC => ElementKind::Complex32,
            Datatype::Z | Datatype::CZ => ElementKind::Complex64,
        }
    }

    /// Alpha scales the input and shares its precision.
    pub fn alpha_precision(self) -> Precision {
        match self {
            Datatype::Default | Datatype::S | Datatype::C | Datatype::SD | Datatype::CZ => {
                Precision::Single
            }
            Datatype::D | Datatype::Z | Datatype::DS | Datatype::ZC => Precision::Double,
        }
    }

    /// Beta scales the existing output and shares its precision.
    pub fn beta_precision(self) -> Precision {
        match self {
            Datatype::Default | Datatype::S | Datatype::C | Datatype::DS | Datatype::ZC => {
                Precision::Single
            }
            Datatype::D | Datatype::Z | Datatype::SD | Datatype::CZ => Precision::Double,
        }
    }

    pub fn is_complex(self) -> bool {
        self.input_kind().is_complex() || self.output_kind().is_complex()
    }

    fn from_code(code: u32) -> TtcResult<Self> {
        match code {
            0 => Ok(Datatype::Default),
            1 => Ok(Datatype::S),
            2 => Ok(Datatype::D),
            3 => Ok(Datatype::C),
            4 => Ok(Datatype::Z),
            5 => Ok(Datatype::SD),
            6 => Ok(Datatype::DS),
            7 => Ok(Datatype::CZ),
            8 => Ok(Datatype::ZC),
            other => Err(TtcError::unsupported(format!("unknown datatype code {other}"))),
        }
    }
}

/// Target architecture (`--architecture=`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[default]
    Default,
    Avx,
    /// POWER is experimental in the generator and rejected by the pipeline.
    Power,
    Avx512,
    Knc,
    Cuda,
}

impl Arch {
    pub fn flag_value(self) -> Option<&'static str> {
        match self {
            Arch::Default => None,
            Arch::Avx => Some("avx"),
            Arch::Power => Some("power"),
            Arch::Avx512 => Some("avx512"),
            Arch::Knc => Some("knc"),
            Arch::Cuda => Some("cuda"),
        }
    }

    pub fn is_accelerator(self) -> bool {
        matches!(self, Arch::Cuda)
    }

    fn from_code(code: u32) -> TtcResult<Self> {
        match code {
            0 => Ok(Arch::Default),
            1 => Ok(Arch::Avx),
            2 => Ok(Arch::Power),
            3 => Ok(Arch::Avx512),
            4 => Ok(Arch::Knc),
            5 => Ok(Arch::Cuda),
            other => Err(TtcError::unsupported(format!(
                "unknown architecture code {other}"
            ))),
        }
    }
}

/// Threads per accelerator block (`--threadsPerBlock=`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadBlock {
    #[default]
    Default,
    Tb128,
    Tb256,
    Tb512,
}

impl ThreadBlock {
    pub fn flag_value(self) -> Option<&'static str> {
        match self {
            ThreadBlock::Default => None,
            ThreadBlock::Tb128 => Some("128"),
            ThreadBlock::Tb256 => Some("256"),
            ThreadBlock::Tb512 => Some("512"),
        }
    }

    fn from_code(code: u32) -> TtcResult<Self> {
        match code {
            0 => Ok(ThreadBlock::Default),
            1 => Ok(ThreadBlock::Tb128),
            2 => Ok(ThreadBlock::Tb256),
            3 => Ok(ThreadBlock::Tb512),
            other => Err(TtcError::unsupported(format!(
                "unknown thread block code {other}"
            ))),
        }
    }
}

/// Valueless generator switches, one bit each.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StatusFlags(u32);

impl StatusFlags {
    pub const KEEP: StatusFlags = StatusFlags(0x1);
    pub const IGNORE_DATABASE: StatusFlags = StatusFlags(0x2);
    pub const NO_ALIGN: StatusFlags = StatusFlags(0x4);
    pub const NO_VEC: StatusFlags = StatusFlags(0x8);
    pub const NO_TEST: StatusFlags = StatusFlags(0x10);
    pub const STREAMING_STORES: StatusFlags = StatusFlags(0x20);
    pub const HOT_A: StatusFlags = StatusFlags(0x40);
    pub const HOT_B: StatusFlags = StatusFlags(0x80);

    /// Flag tokens in the order the generator expects them.
    pub const TOKENS: [(StatusFlags, &'static str); 8] = [
        (StatusFlags::KEEP, "--keep"),
        (StatusFlags::IGNORE_DATABASE, "--ignoreDatabase"),
        (StatusFlags::NO_ALIGN, "--no-align"),
        (StatusFlags::NO_VEC, "--no-vec"),
        (StatusFlags::NO_TEST, "--noTest"),
        (StatusFlags::STREAMING_STORES, "--use-streamingStores"),
        (StatusFlags::HOT_A, "--hotA"),
        (StatusFlags::HOT_B, "--hotB"),
    ];

    pub const fn empty() -> Self {
        StatusFlags(0)
    }

    /// Union of every known flag.
    pub const ALL: StatusFlags = StatusFlags(0xff);

    /// `None` when `bits` sets anything outside [`StatusFlags::ALL`].
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL.0 != 0 {
            None
        } else {
            Some(StatusFlags(bits))
        }
    }

    pub const fn from_bits_truncate(bits: u32) -> Self {
        StatusFlags(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: StatusFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Number of set flags, one generator token each.
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl TryFrom<u32> for StatusFlags {
    type Error = TtcError;

    fn try_from(bits: u32) -> TtcResult<Self> {
        StatusFlags::from_bits(bits).ok_or_else(|| {
            TtcError::unsupported(format!(
                "unknown status flag bits {:#x}",
                bits & !StatusFlags::ALL.0
            ))
        })
    }
}

impl From<StatusFlags> for u32 {
    fn from(flags: StatusFlags) -> u32 {
        flags.0
    }
}

impl BitOr for StatusFlags {
    type Output = StatusFlags;

    fn bitor(self, rhs: StatusFlags) -> StatusFlags {
        StatusFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for StatusFlags {
    fn bitor_assign(&mut self, rhs: StatusFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = StatusFlags::TOKENS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, token)| token.trim_start_matches('-'))
            .collect();
        write!(f, "StatusFlags({:#x}: {})", self.0, names.join("|"))
    }
}

/// Tag selecting which option a setter call changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    MaxImpl,
    NumThreads,
    PrefetchDistances,
    Blockings,
    Affinity,
    Compiler,
    Datatype,
    Arch,
    ThreadBlock,
    Status,
}

/// A typed option assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    MaxImpl(u32),
    NumThreads(u32),
    PrefetchDistances(Vec<u32>),
    Blockings(Vec<(u32, u32)>),
    Affinity(String),
    Compiler(Compiler),
    Datatype(Datatype),
    Arch(Arch),
    ThreadBlock(ThreadBlock),
    Status(StatusFlags),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::MaxImpl(_) => OptionKind::MaxImpl,
            OptionValue::NumThreads(_) => OptionKind::NumThreads,
            OptionValue::PrefetchDistances(_) => OptionKind::PrefetchDistances,
            OptionValue::Blockings(_) => OptionKind::Blockings,
            OptionValue::Affinity(_) => OptionKind::Affinity,
            OptionValue::Compiler(_) => OptionKind::Compiler,
            OptionValue::Datatype(_) => OptionKind::Datatype,
            OptionValue::Arch(_) => OptionKind::Arch,
            OptionValue::ThreadBlock(_) => OptionKind::ThreadBlock,
            OptionValue::Status(_) => OptionKind::Status,
        }
    }

    /// Decodes an untyped value/length pair.
    ///
    /// Scalar and enum kinds read one `u32` and ignore `length`. Prefetch
    /// distances read `length` values, blockings read `length` pairs and
    /// affinity reads `length` bytes of UTF-8.
    ///
    /// # Safety
    /// `value` must point to readable memory of the shape described above.
    pub unsafe fn from_raw(kind: OptionKind, value: *const c_void, length: u32) -> TtcResult<Self> {
        if value.is_null() {
            return Err(TtcError::invalid("option value pointer is null"));
        }
        let len = length as usize;
        let scalar = || unsafe { *(value as *const u32) };
        let decoded = match kind {
            OptionKind::MaxImpl => OptionValue::MaxImpl(scalar()),
            OptionKind::NumThreads => OptionValue::NumThreads(scalar()),
            OptionKind::PrefetchDistances => {
                let values = unsafe { std::slice::from_raw_parts(value as *const u32, len) };
                OptionValue::PrefetchDistances(values.to_vec())
            }
            OptionKind::Blockings => {
                let flat = unsafe { std::slice::from_raw_parts(value as *const u32, len * 2) };
                OptionValue::Blockings(flat.chunks_exact(2).map(|p| (p[0], p[1])).collect())
            }
            OptionKind::Affinity => {
                let bytes = unsafe { std::slice::from_raw_parts(value as *const u8, len) };
                let text = std::str::from_utf8(bytes)
                    .map_err(|err| TtcError::invalid(format!("affinity is not UTF-8: {err}")))?;
                OptionValue::Affinity(text.to_string())
            }
            OptionKind::Compiler => OptionValue::Compiler(Compiler::from_code(scalar())?),
            OptionKind::Datatype => OptionValue::Datatype(Datatype::from_code(scalar())?),
            OptionKind::Arch => OptionValue::Arch(Arch::from_code(scalar())?),
            OptionKind::ThreadBlock => OptionValue::ThreadBlock(ThreadBlock::from_code(scalar())?),
            OptionKind::Status => OptionValue::Status(StatusFlags::try_from(scalar())?),
        };
        Ok(decoded)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub max_impl: u32,
    pub num_threads: u32,
    pub prefetch_distances: Option<Vec<u32>>,
    pub blockings: Option<Vec<(u32, u32)>>,
    pub affinity: Option<String>,
    pub compiler: Compiler,
    pub datatype: Datatype,
    pub arch: Arch,
    pub thread_block: ThreadBlock,
    pub status: StatusFlags,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one assignment. Empty lists and strings reset the field.
    pub fn apply(&mut self, value: OptionValue) {
        match value {
            OptionValue::MaxImpl(n) => self.max_impl = n,
            OptionValue::NumThreads(n) => self.num_threads = n,
            OptionValue::PrefetchDistances(values) => {
                self.prefetch_distances = (!values.is_empty()).then_some(values)
            }
            OptionValue::Blockings(pairs) => self.blockings = (!pairs.is_empty()).then_some(pairs),
            OptionValue::Affinity(text) => self.affinity = (!text.is_empty()).then_some(text),
            OptionValue::Compiler(compiler) => self.compiler = compiler,
            OptionValue::Datatype(datatype) => self.datatype = datatype,
            OptionValue::Arch(arch) => self.arch = arch,
            OptionValue::ThreadBlock(tb) => self.thread_block = tb,
            OptionValue::Status(status) => self.status = status,
        }
    }

    pub fn with(mut self, value: OptionValue) -> Self {
        self.apply(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_tables_follow_input_for_alpha_and_output_for_beta() {
        assert_eq!(Datatype::SD.alpha_precision(), Precision::Single);
        assert_eq!(Datatype::SD.beta_precision(), Precision::Double);
        assert_eq!(Datatype::ZC.alpha_precision(), Precision::Double);
        assert_eq!(Datatype::ZC.beta_precision(), Precision::Single);
        assert_eq!(Datatype::Default.input_kind(), ElementKind::F32);
        assert_eq!(Datatype::CZ.output_kind(), ElementKind::Complex64);
    }

    #[test]
    fn raw_setter_reads_pairs_and_strings() {
        let pairs = [4u32, 8, 16, 32];
        let value = unsafe {
            OptionValue::from_raw(OptionKind::Blockings, pairs.as_ptr() as *const c_void, 2)
        }
        .expect("blockings decode");
        assert_eq!(value, OptionValue::Blockings(vec![(4, 8), (16, 32)]));

        let text = "compact,1,0";
        let value = unsafe {
            OptionValue::from_raw(
                OptionKind::Affinity,
                text.as_ptr() as *const c_void,
                text.len() as u32,
            )
        }
        .expect("affinity decode");
        assert_eq!(value, OptionValue::Affinity(text.to_string()));
    }

    #[test]
    fn raw_setter_rejects_null_and_unknown_codes() {
        let err = unsafe { OptionValue::from_raw(OptionKind::MaxImpl, std::ptr::null(), 0) }
            .expect_err("null rejected");
        assert!(matches!(err, TtcError::InvalidArgument(_)));

        let code = 42u32;
        let err = unsafe {
            OptionValue::from_raw(OptionKind::Arch, &code as *const u32 as *const c_void, 0)
        }
        .expect_err("unknown arch rejected");
        assert!(matches!(err, TtcError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn empty_lists_clear_fields() {
        let mut options = Options::new().with(OptionValue::PrefetchDistances(vec![5, 6]));
        assert_eq!(options.prefetch_distances, Some(vec![5, 6]));
        options.apply(OptionValue::PrefetchDistances(Vec::new()));
        assert_eq!(options.prefetch_distances, None);
    }

    #[test]
    fn raw_status_rejects_unknown_bits() {
        let bits = 0x101u32;
        let err = unsafe {
            OptionValue::from_raw(OptionKind::Status, &bits as *const u32 as *const c_void, 0)
        }
        .expect_err("bit 0x100 is not a flag");
        assert!(matches!(err, TtcError::UnsupportedConfiguration(_)));

        let bits = 0x41u32;
        let value = unsafe {
            OptionValue::from_raw(OptionKind::Status, &bits as *const u32 as *const c_void, 0)
        }
        .expect("known bits decode");
        assert_eq!(value, OptionValue::Status(StatusFlags::KEEP | StatusFlags::HOT_A));
    }

    #[test]
    fn every_counted_flag_has_a_token() {
        let flags = StatusFlags::from_bits_truncate(u32::MAX);
        assert_eq!(flags, StatusFlags::ALL);
        assert_eq!(flags.count() as usize, StatusFlags::TOKENS.len());
        assert!(StatusFlags::from_bits(0x200).is_none());
        assert!(serde_json::from_str::<StatusFlags>("512").is_err());
        assert_eq!(
            serde_json::from_str::<StatusFlags>("3").unwrap(),
            StatusFlags::KEEP | StatusFlags::IGNORE_DATABASE
        );
    }

    #[test]
    fn status_flags_debug_lists_tokens() {
        let flags = StatusFlags::KEEP | StatusFlags::HOT_B;
        assert_eq!(flags.count(), 2);
        assert_eq!(format!("{flags:?}"), "StatusFlags(0x81: keep|hotB)");
    }
}
