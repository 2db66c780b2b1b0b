//! Line-oriented text form of a program.
//!
//! ```text
//! ; comments start with ';' or '//'
//! 0:
//!     leti r6, 1337
//!     arg_pushs "hello"
//!     window_msg
//!     ret
//! .data
//! 10:
//!     01 02 ff
//! .string
//! 11:
//!     "some text"
//! ```
//!
//! A `<label>[, <label>...]:` line opens a segment of the current section
//! (`.code` unless a `.data` or `.string` directive switched it). Registers
//! are written `rN`, integers in decimal or `0x` hex, and floats with a
//! decimal point.

use regex::Regex;
use thiserror::Error;

use qscript_ir::{
    Arg, BytecodeIr, DataSegment, Instruction, InstructionSegment, IrError, Label, Opcode,
    ParamKind, Segment, SourceLoc, StringSegment,
};

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: {source}")]
    Instruction {
        line: usize,
        #[source]
        source: IrError,
    },
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ListingError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Code,
    Data,
    String,
}

/// Parser for the listing format. Holds the compiled patterns, so build it
/// once and reuse it.
pub struct ListingParser {
    label_line: Regex,
    directive: Regex,
    instruction: Regex,
    token: Regex,
}

impl ListingParser {
    /// # Errors
    ///
    /// Returns [`ListingError::Pattern`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            label_line: Regex::new(r"^(-?\d+(?:\s*,\s*-?\d+)*)\s*:$")?,
            directive: Regex::new(r"^\.(code|data|string)$")?,
            instruction: Regex::new(r"^([A-Za-z_][A-Za-z0-9_!=<>]*)(?:\s+(.*))?$")?,
            token: Regex::new(r#""(?:[^"\\]|\\.)*"|[^,\s]+"#)?,
        })
    }

    /// Parse `text` into a program.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::Syntax`] for malformed lines and
    /// [`ListingError::Instruction`] for instructions whose arguments do not
    /// match their opcode.
    pub fn parse(&self, text: &str) -> Result<BytecodeIr> {
        let mut section = Section::Code;
        let mut segments: Vec<Segment> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = strip_comment(raw).trim();
            if content.is_empty() {
                continue;
            }

            if let Some(caps) = self.directive.captures(content) {
                section = match &caps[1] {
                    "data" => Section::Data,
                    "string" => Section::String,
                    _ => Section::Code,
                };
                continue;
            }

            if let Some(caps) = self.label_line.captures(content) {
                let labels = parse_labels(&caps[1], line)?;
                segments.push(match section {
                    Section::Code => InstructionSegment::new(labels, Vec::new()).into(),
                    Section::Data => DataSegment {
                        labels,
                        data: Vec::new(),
                    }
                    .into(),
                    Section::String => StringSegment {
                        labels,
                        value: String::new(),
                    }
                    .into(),
                });
                continue;
            }

            match segments.last_mut() {
                Some(Segment::Instructions(segment)) if section == Section::Code => {
                    let column = raw.len() - raw.trim_start().len() + 1;
                    let instruction = self.parse_instruction(content, line, column)?;
                    segment.instructions.push(instruction);
                }
                Some(Segment::Data(segment)) if section == Section::Data => {
                    for byte in content.split_whitespace() {
                        let value = u8::from_str_radix(byte, 16).map_err(|_| {
                            syntax(line, format!("invalid data byte `{byte}`"))
                        })?;
                        segment.data.push(value);
                    }
                }
                Some(Segment::String(segment)) if section == Section::String => {
                    let value = content
                        .strip_prefix('"')
                        .and_then(|rest| rest.strip_suffix('"'))
                        .ok_or_else(|| syntax(line, "expected a quoted string".to_string()))?;
                    segment.value.push_str(&unescape(value));
                }
                _ => return Err(syntax(line, "content outside of a segment".to_string())),
            }
        }

        Ok(BytecodeIr::new(segments))
    }

    fn parse_instruction(&self, content: &str, line: usize, column: usize) -> Result<Instruction> {
        let caps = self
            .instruction
            .captures(content)
            .ok_or_else(|| syntax(line, format!("cannot parse `{content}`")))?;
        let mnemonic = &caps[1];
        let opcode = Opcode::by_mnemonic(mnemonic)
            .ok_or_else(|| syntax(line, format!("unknown opcode `{mnemonic}`")))?;

        let args = match caps.get(2) {
            Some(args) => self
                .token
                .find_iter(args.as_str())
                .enumerate()
                .map(|(index, token)| parse_arg(token.as_str(), param_kind(opcode, index), line))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let loc = SourceLoc::new(
            u32::try_from(line).unwrap_or(u32::MAX),
            u32::try_from(column).unwrap_or(u32::MAX),
            u32::try_from(content.len()).unwrap_or(u32::MAX),
        );
        Instruction::new(opcode, args)
            .map(|instruction| instruction.with_source_loc(loc))
            .map_err(|source| ListingError::Instruction { line, source })
    }
}

/// Parse a listing with a fresh parser.
///
/// # Errors
///
/// Fails like [`ListingParser::new`] and [`ListingParser::parse`].
pub fn parse_listing(text: &str) -> Result<BytecodeIr> {
    ListingParser::new()?.parse(text)
}

const fn syntax(line: usize, message: String) -> ListingError {
    ListingError::Syntax { line, message }
}

fn param_kind(opcode: &Opcode, index: usize) -> Option<ParamKind> {
    opcode.params.get(index).copied().or_else(|| {
        opcode
            .params
            .last()
            .copied()
            .filter(|param| param.is_variadic())
    })
}

fn parse_labels(text: &str, line: usize) -> Result<Vec<Label>> {
    text.split(',')
        .map(|label| {
            let label = label.trim();
            label
                .parse()
                .map_err(|_| syntax(line, format!("invalid label `{label}`")))
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn parse_arg(token: &str, param: Option<ParamKind>, line: usize) -> Result<Arg> {
    if let Some(quoted) = token.strip_prefix('"') {
        let value = quoted
            .strip_suffix('"')
            .ok_or_else(|| syntax(line, format!("unterminated string {token}")))?;
        return Ok(Arg::Str(unescape(value)));
    }
    if let Some(register) = token.strip_prefix('r').and_then(|n| n.parse::<i32>().ok()) {
        return Ok(Arg::Int(register));
    }
    if let Some(value) = parse_int(token) {
        return Ok(match param {
            Some(ParamKind::Float) => Arg::Float(value as f32),
            _ => Arg::Int(value),
        });
    }
    if token.contains(['.', 'e', 'E']) {
        if let Ok(value) = token.parse::<f32>() {
            return Ok(Arg::Float(value));
        }
    }
    Err(syntax(line, format!("invalid argument `{token}`")))
}

/// Decimal or `0x` hex. Hex literals are bit patterns, so `0xffffffff` is -1.
fn parse_int(token: &str) -> Option<i32> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i32::from_ne_bytes(u32::from_str_radix(hex, 16).ok()?.to_ne_bytes()),
        None => return token.parse().ok(),
    };
    Some(if negative { value.wrapping_neg() } else { value })
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Drop a trailing `;` or `//` comment that is not inside a string.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b';' => return &line[..i],
            b'/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}
