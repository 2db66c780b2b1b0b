//! Backward value analysis over the control flow graph.
//!
//! Queries walk from an instruction towards the program entry, stopping at
//! the first instruction that defines the tracked register or argument stack
//! slot. At the top of a block the walk continues into every predecessor and
//! the results are joined. Loops and the iteration budget both degrade to
//! the full domain, so a query always terminates.

mod register;
mod stack;

use metrics::counter;
use rustc_hash::FxHashSet;
use tracing::{trace, warn};

use qscript_ir::{BytecodeIr, InstructionRef};

use crate::graph::{BlockId, ControlFlowGraph};
use crate::value_set::ValueSet;

/// Iteration budget of a single query.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Tuning knobs for value queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Block visits allowed per top-level query before giving up.
    pub max_iterations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl AnalysisConfig {
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Budget shared by every recursive step of one query.
#[derive(Debug)]
pub struct AnalysisContext {
    iterations: usize,
    max_iterations: usize,
    exhausted: bool,
}

impl AnalysisContext {
    #[must_use]
    pub const fn new(config: &AnalysisConfig) -> Self {
        Self {
            iterations: 0,
            max_iterations: config.max_iterations,
            exhausted: false,
        }
    }

    /// Count one step. Returns false once the budget is spent.
    fn tick(&mut self) -> bool {
        self.iterations += 1;
        if self.iterations <= self.max_iterations {
            return true;
        }
        if !self.exhausted {
            self.exhausted = true;
            counter!("qscript_solver_budget_exhausted_total").increment(1);
            warn!(max = self.max_iterations, "too many iterations");
        }
        false
    }

    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// True if the query ran out of budget and returned an approximation.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// What a walk is looking for.
#[derive(Clone, Copy, Debug)]
enum Target {
    Register(i32),
    /// Argument stack slot counted from the top, starting at 0.
    Stack(usize),
}

/// Value queries against one program and its graph.
#[derive(Clone, Copy)]
pub struct ValueAnalysis<'a> {
    ir: &'a BytecodeIr,
    cfg: &'a ControlFlowGraph,
    config: AnalysisConfig,
}

impl<'a> ValueAnalysis<'a> {
    #[must_use]
    pub fn new(ir: &'a BytecodeIr, cfg: &'a ControlFlowGraph) -> Self {
        Self {
            ir,
            cfg,
            config: AnalysisConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Values `register` may hold right before the instruction at `at`.
    #[must_use]
    pub fn register_value(&self, at: InstructionRef, register: u8) -> ValueSet {
        self.query(at, Target::Register(i32::from(register)))
    }

    /// Values of argument stack slot `position` (0 = top) right before the
    /// instruction at `at`.
    #[must_use]
    pub fn stack_value(&self, at: InstructionRef, position: usize) -> ValueSet {
        self.query(at, Target::Stack(position))
    }

    fn query(&self, at: InstructionRef, target: Target) -> ValueSet {
        let Some(block) = self.cfg.block_for_instruction(at) else {
            return ValueSet::empty();
        };
        let mut solver = Solver {
            ir: self.ir,
            cfg: self.cfg,
            ctx: AnalysisContext::new(&self.config),
        };
        let values = solver.find(&FxHashSet::default(), block, at.index, target);
        trace!(
            %at,
            ?target,
            iterations = solver.ctx.iterations(),
            %values,
            "value query"
        );
        values
    }
}

/// Values `register` may hold right before the instruction at `at`.
#[must_use]
pub fn register_value(
    cfg: &ControlFlowGraph,
    ir: &BytecodeIr,
    at: InstructionRef,
    register: u8,
) -> ValueSet {
    ValueAnalysis::new(ir, cfg).register_value(at, register)
}

/// Values of argument stack slot `position` right before the instruction at
/// `at`.
#[must_use]
pub fn stack_value(
    cfg: &ControlFlowGraph,
    ir: &BytecodeIr,
    at: InstructionRef,
    position: usize,
) -> ValueSet {
    ValueAnalysis::new(ir, cfg).stack_value(at, position)
}

struct Solver<'a> {
    ir: &'a BytecodeIr,
    cfg: &'a ControlFlowGraph,
    ctx: AnalysisContext,
}

/// Outcome of looking at one instruction during a backward scan.
enum Step {
    Found(ValueSet),
    Continue(Target),
}

impl Solver<'_> {
    /// Scan `block` backwards from `end` (exclusive), then its predecessors.
    fn find(
        &mut self,
        path: &FxHashSet<BlockId>,
        block: BlockId,
        end: usize,
        mut target: Target,
    ) -> ValueSet {
        if !self.ctx.tick() {
            return ValueSet::all();
        }
        let (ir, cfg) = (self.ir, self.cfg);
        let Some(basic_block) = cfg.block(block) else {
            return ValueSet::empty();
        };

        for index in (basic_block.start..end).rev() {
            let at = InstructionRef::new(basic_block.segment, index);
            let Some(instruction) = ir.instruction(at) else {
                continue;
            };
            let step = match target {
                Target::Register(register) => {
                    match self.register_effect(path, block, index, instruction, register) {
                        Some(values) => Step::Found(values),
                        None => Step::Continue(target),
                    }
                }
                Target::Stack(position) => {
                    self.stack_effect(path, block, index, instruction, position)
                }
            };
            match step {
                Step::Found(values) => return values,
                Step::Continue(next) => target = next,
            }
        }

        let mut path = path.clone();
        path.insert(block);
        let mut values = ValueSet::empty();
        for &pred in basic_block.predecessors() {
            if path.contains(&pred) {
                values = ValueSet::all();
                break;
            }
            let Some(pred_end) = cfg.block(pred).map(|b| b.end) else {
                continue;
            };
            let pred_values = self.find(&path, pred, pred_end, target);
            values.union(&pred_values);
        }
        values
    }
}
