//! Floor designations: which map each floor of a quest loads.
//!
//! `map_designate` and `map_designate_ex` take their operands from
//! consecutive registers, so their values come from the register solver.
//! `bb_map_designate` carries literals. `set_floor_handler` only names a
//! floor (through the argument stack) and never overrides an explicit
//! designation.

use std::collections::BTreeMap;
use std::fmt;

use metrics::counter;
use rayon::prelude::*;
use tracing::{debug, trace_span, warn};

use qscript_ir::{BytecodeIr, Instruction, InstructionRef, InstructionSegment, OpClass};

use crate::analysis::{AnalysisConfig, ValueAnalysis};
use crate::graph::ControlFlowGraph;
use crate::value_set::ValueSet;

/// Instruction a designation was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DesignationSource {
    MapDesignate,
    MapDesignateEx,
    BbMapDesignate,
    FloorHandler,
}

impl DesignationSource {
    /// Explicit designations replace earlier ones; floor handlers only fill
    /// gaps.
    #[must_use]
    pub const fn overrides(self) -> bool {
        !matches!(self, Self::FloorHandler)
    }
}

impl fmt::Display for DesignationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MapDesignate => "map_designate",
            Self::MapDesignateEx => "map_designate_ex",
            Self::BbMapDesignate => "bb_map_designate",
            Self::FloorHandler => "set_floor_handler",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloorDesignation {
    pub floor_id: i32,
    /// `None` when only a floor handler names the floor.
    pub map_id: Option<i32>,
    pub variant_id: i32,
    pub source: DesignationSource,
    pub at: InstructionRef,
}

impl fmt::Display for FloorDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "floor {}: ", self.floor_id)?;
        match self.map_id {
            Some(map_id) => write!(f, "map {map_id:#x}")?,
            None => f.write_str("map ?")?,
        }
        write!(f, ", variant {} ({} at {})", self.variant_id, self.source, self.at)
    }
}

/// Collect the floor designations of every instruction segment, one per
/// floor, ordered by floor id.
#[must_use]
pub fn floor_designations(
    ir: &BytecodeIr,
    cfg: &ControlFlowGraph,
    config: &AnalysisConfig,
) -> Vec<FloorDesignation> {
    let _span = trace_span!("floor_designations").entered();
    let analysis = ValueAnalysis::new(ir, cfg).with_config(*config);

    let segments: Vec<(usize, &InstructionSegment)> = ir.instruction_segments().collect();
    let found: Vec<FloorDesignation> = segments
        .par_iter()
        .flat_map_iter(|&(segment, instructions)| scan_segment(&analysis, segment, instructions))
        .collect();

    // Floor handlers first, so explicit designations win regardless of
    // program order.
    let mut floors = BTreeMap::new();
    for designation in found.iter().filter(|d| !d.source.overrides()) {
        floors.entry(designation.floor_id).or_insert(*designation);
    }
    for designation in found.iter().filter(|d| d.source.overrides()) {
        floors.insert(designation.floor_id, *designation);
    }

    counter!("qscript_designations_total").increment(floors.len() as u64);
    debug!(
        candidates = found.len(),
        floors = floors.len(),
        "collected floor designations"
    );
    floors.into_values().collect()
}

fn scan_segment(
    analysis: &ValueAnalysis<'_>,
    segment: usize,
    instructions: &InstructionSegment,
) -> Vec<FloorDesignation> {
    instructions
        .instructions
        .iter()
        .enumerate()
        .filter_map(|(index, instruction)| {
            designation_at(analysis, InstructionRef::new(segment, index), instruction)
        })
        .collect()
}

fn designation_at(
    analysis: &ValueAnalysis<'_>,
    at: InstructionRef,
    instruction: &Instruction,
) -> Option<FloorDesignation> {
    let (source, floor_id, map_id, variant_id) = match instruction.opcode.class {
        OpClass::MapDesignate | OpClass::MapDesignateEx => {
            let extended = matches!(instruction.opcode.class, OpClass::MapDesignateEx);
            let base = instruction.int_arg(0)?;
            let read = |offset: i32, what: &str| {
                let register = u8::try_from(base + offset).ok()?;
                single(&analysis.register_value(at, register), instruction, what, register)
            };
            let floor_id = read(0, "floor")?;
            let map_id = if extended { read(1, "map")? } else { floor_id };
            let variant_id = read(if extended { 3 } else { 2 }, "variant")?;
            let source = if extended {
                DesignationSource::MapDesignateEx
            } else {
                DesignationSource::MapDesignate
            };
            (source, floor_id, Some(map_id), variant_id)
        }
        OpClass::BbMapDesignate => (
            DesignationSource::BbMapDesignate,
            instruction.int_arg(0)?,
            Some(instruction.int_arg(1)?),
            instruction.int_arg(2)?,
        ),
        OpClass::SetFloorHandler => {
            // The floor is pushed before the handler label.
            let values = analysis.stack_value(at, 1);
            if values.size() != 1 {
                warn!(%at, %values, "could not determine floor of set_floor_handler");
                return None;
            }
            (DesignationSource::FloorHandler, values.get(0)?, None, 0)
        }
        _ => return None,
    };

    Some(FloorDesignation {
        floor_id,
        map_id,
        variant_id,
        source,
        at,
    })
}

/// The single value of `values`, warning when it is not exactly one.
fn single(values: &ValueSet, instruction: &Instruction, what: &str, register: u8) -> Option<i32> {
    if values.size() == 1 {
        return values.get(0);
    }
    warn!(
        mnemonic = instruction.opcode.mnemonic,
        register,
        %values,
        "could not determine {what}"
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use qscript_ir::*;

    fn designations(ir: &BytecodeIr) -> Vec<FloorDesignation> {
        let cfg = ControlFlowGraph::create(ir);
        floor_designations(ir, &cfg, &AnalysisConfig::default())
    }

    #[test]
    fn test_map_designate_from_registers() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[40, 2])
            .op(&OP_LETI, &[41, 9])
            .op(&OP_LETI, &[42, 4])
            .op(&OP_MAP_DESIGNATE, &[40])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        let found = designations(&ir);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].floor_id, 2);
        // The plain form places the floor's own map.
        assert_eq!(found[0].map_id, Some(2));
        assert_eq!(found[0].variant_id, 4);
        assert_eq!(found[0].source, DesignationSource::MapDesignate);
    }

    #[test]
    fn test_map_designate_ex_reads_map_and_variant() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[10, 1])
            .op(&OP_LETI, &[11, 0x23])
            .op(&OP_LETI, &[12, 0])
            .op(&OP_LETI, &[13, 3])
            .op(&OP_MAP_DESIGNATE_EX, &[10])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        let found = designations(&ir);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].map_id, Some(0x23));
        assert_eq!(found[0].variant_id, 3);
    }

    #[test]
    fn test_ambiguous_registers_are_skipped() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_GET_DIFFLVL, &[40])
            .op(&OP_LETI, &[41, 1])
            .op(&OP_LETI, &[42, 0])
            .op(&OP_MAP_DESIGNATE, &[40])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert!(designations(&ir).is_empty());
    }

    #[test]
    fn test_floor_handler_has_lower_priority() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_BB_MAP_DESIGNATE, &[1, 0x23, 1, 0])
            .op(&OP_ARG_PUSHL, &[1])
            .op(&OP_ARG_PUSHW, &[100])
            .op(&OP_SET_FLOOR_HANDLER, &[])
            .op(&OP_ARG_PUSHL, &[2])
            .op(&OP_ARG_PUSHW, &[101])
            .op(&OP_SET_FLOOR_HANDLER, &[])
            .op(&OP_RET, &[])
            .segment(&[100])
            .op(&OP_RET, &[])
            .segment(&[101])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        let found = designations(&ir);
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].floor_id, 1);
        assert_eq!(found[0].source, DesignationSource::BbMapDesignate);
        assert_eq!(found[0].map_id, Some(0x23));
        assert_eq!(found[0].variant_id, 1);

        assert_eq!(found[1].floor_id, 2);
        assert_eq!(found[1].source, DesignationSource::FloorHandler);
        assert_eq!(found[1].map_id, None);
    }

    #[test]
    fn test_designations_across_segments() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_BB_MAP_DESIGNATE, &[3, 5, 0, 0])
            .op(&OP_RET, &[])
            .segment(&[1])
            .op(&OP_BB_MAP_DESIGNATE, &[3, 6, 2, 0])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        let found = designations(&ir);
        assert_eq!(found.len(), 1);
        // Later explicit designations replace earlier ones.
        assert_eq!(found[0].map_id, Some(6));
        assert_eq!(found[0].at, InstructionRef::new(1, 0));
    }

    #[test]
    fn test_display() {
        let designation = FloorDesignation {
            floor_id: 1,
            map_id: Some(0x23),
            variant_id: 0,
            source: DesignationSource::BbMapDesignate,
            at: InstructionRef::new(0, 4),
        };
        assert_eq!(
            designation.to_string(),
            "floor 1: map 0x23, variant 0 (bb_map_designate at 0:4)"
        );
    }
}
