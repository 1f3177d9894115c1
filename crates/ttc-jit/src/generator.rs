//! Generator process driver and its stdout hand-off protocol.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, Span};

use crate::args::GeneratorCommand;
use crate::error::{TtcError, TtcResult};
use crate::process;

/// Header the generator reported, e.g. `transpose_0x2x1.h`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedHeader {
    file_name: String,
}

impl GeneratedHeader {
    /// Accepts `<identifier>.h`.
    pub fn parse(name: &str) -> TtcResult<Self> {
        let Some(stem) = name.strip_suffix(".h") else {
            return Err(TtcError::protocol(format!(
                "generated header '{name}' does not end in .h"
            )));
        };
        if !is_c_identifier(stem) {
            return Err(TtcError::protocol(format!(
                "generated header stem '{stem}' is not a C identifier"
            )));
        }
        Ok(Self {
            file_name: name.to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Header name without `.h`. The generator names its template after it.
    pub fn stem(&self) -> &str {
        &self.file_name[..self.file_name.len() - 2]
    }
}

fn is_c_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Looking for `#`.
    Search,
    /// Matched this many bytes of `#include`.
    Directive(usize),
    /// After `#include`, skipping blanks before the opening quote.
    Blank,
    /// Inside the quotes.
    Name,
}

const DIRECTIVE: &[u8] = b"#include";

/// Byte-at-a-time scanner for `#include "<name>"` in generator output.
///
/// The first non-empty quoted name wins. Anything else the generator
/// prints is ignored.
#[derive(Debug)]
pub struct HeaderScanner {
    state: ScanState,
    name: Vec<u8>,
    found: Option<String>,
}

impl HeaderScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::Search,
            name: Vec::new(),
            found: None,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if self.found.is_some() {
                return;
            }
            self.step(byte);
        }
    }

    fn step(&mut self, byte: u8) {
        self.state = match self.state {
            ScanState::Search | ScanState::Directive(_) => self.match_directive(byte),
            ScanState::Blank => match byte {
                b' ' | b'\t' => ScanState::Blank,
                b'"' => ScanState::Name,
                _ => self.match_directive(byte),
            },
            ScanState::Name => match byte {
                b'"' => {
                    if !self.name.is_empty() {
                        self.found = Some(String::from_utf8_lossy(&self.name).into_owned());
                    }
                    self.name.clear();
                    ScanState::Search
                }
                b'\n' | b'\r' => {
                    self.name.clear();
                    ScanState::Search
                }
                _ => {
                    self.name.push(byte);
                    ScanState::Name
                }
            },
        };
    }

    fn match_directive(&self, byte: u8) -> ScanState {
        let matched = match self.state {
            ScanState::Directive(n) => n,
            _ => 0,
        };
        if byte == DIRECTIVE[matched] {
            if matched + 1 == DIRECTIVE.len() {
                ScanState::Blank
            } else {
                ScanState::Directive(matched + 1)
            }
        } else if byte == DIRECTIVE[0] {
            ScanState::Directive(1)
        } else {
            ScanState::Search
        }
    }

    pub fn finish(self) -> Option<String> {
        self.found
    }
}

impl Default for HeaderScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts and validates the header name from captured generator stdout.
pub fn scan_header(stdout: &[u8]) -> TtcResult<GeneratedHeader> {
    let mut scanner = HeaderScanner::new();
    scanner.feed(stdout);
    let name = scanner.finish().ok_or_else(|| {
        TtcError::protocol("generator output contains no #include \"<name>.h\" directive")
    })?;
    GeneratedHeader::parse(&name)
}

/// Runs the generator in `root` and returns the header it produced.
pub fn invoke_generator(
    command: &GeneratorCommand,
    root: &Path,
    timeout: Option<Duration>,
    span: &Span,
) -> TtcResult<GeneratedHeader> {
    let _entered = span.enter();
    let label = command.program().display().to_string();
    debug!(command = %command.display_line(), root = %root.display(), "spawning generator");

    let mut child = command.to_command();
    child.current_dir(root);
    let output = process::run(child, &label, timeout)?;
    if !output.status.success() {
        return Err(TtcError::process(process::failure_message(&label, &output)));
    }
    debug!(bytes = output.stdout.len(), "generator finished");
    scan_header(&output.stdout)
}
