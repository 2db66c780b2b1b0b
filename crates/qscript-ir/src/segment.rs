//! Program segments.

use crate::Label;
use crate::instruction::Instruction;

/// Kind of a segment, without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Instructions,
    Data,
    String,
}

/// Instructions reachable through the segment's labels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstructionSegment {
    pub labels: Vec<Label>,
    pub instructions: Vec<Instruction>,
}

impl InstructionSegment {
    #[must_use]
    pub const fn new(labels: Vec<Label>, instructions: Vec<Instruction>) -> Self {
        Self {
            labels,
            instructions,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Raw bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataSegment {
    pub labels: Vec<Label>,
    pub data: Vec<u8>,
}

/// A single string value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringSegment {
    pub labels: Vec<Label>,
    pub value: String,
}

/// One addressable chunk of a program.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Instructions(InstructionSegment),
    Data(DataSegment),
    String(StringSegment),
}

impl Segment {
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        match self {
            Self::Instructions(s) => &s.labels,
            Self::Data(s) => &s.labels,
            Self::String(s) => &s.labels,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> SegmentKind {
        match self {
            Self::Instructions(_) => SegmentKind::Instructions,
            Self::Data(_) => SegmentKind::Data,
            Self::String(_) => SegmentKind::String,
        }
    }

    #[must_use]
    pub const fn as_instructions(&self) -> Option<&InstructionSegment> {
        match self {
            Self::Instructions(s) => Some(s),
            Self::Data(_) | Self::String(_) => None,
        }
    }

    #[must_use]
    pub fn has_label(&self, label: Label) -> bool {
        self.labels().contains(&label)
    }
}

impl From<InstructionSegment> for Segment {
    fn from(segment: InstructionSegment) -> Self {
        Self::Instructions(segment)
    }
}

impl From<DataSegment> for Segment {
    fn from(segment: DataSegment) -> Self {
        Self::Data(segment)
    }
}

impl From<StringSegment> for Segment {
    fn from(segment: StringSegment) -> Self {
        Self::String(segment)
    }
}
