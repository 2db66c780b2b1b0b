//! Hooks that decide whether the next instruction may run.

use rustc_hash::FxHashSet;
use tracing::debug;

use qscript_ir::InstructionRef;

/// Asked before every instruction. Returning `false` pauses the VM without
/// executing anything; the next `execute()` asks again.
pub trait ExecutionInterceptor {
    fn should_execute(&mut self, at: InstructionRef) -> bool;
}

impl<F> ExecutionInterceptor for F
where
    F: FnMut(InstructionRef) -> bool,
{
    fn should_execute(&mut self, at: InstructionRef) -> bool {
        self(at)
    }
}

/// Pauses at a set of instructions.
///
/// Arriving at a breakpoint pauses once. Resuming from that pause executes
/// the instruction, so a breakpoint never blocks progress.
#[derive(Clone, Debug, Default)]
pub struct Breakpoints {
    points: FxHashSet<InstructionRef>,
    paused_at: Option<InstructionRef>,
}

impl Breakpoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the breakpoint was already set.
    pub fn insert(&mut self, at: InstructionRef) -> bool {
        self.points.insert(at)
    }

    pub fn remove(&mut self, at: InstructionRef) -> bool {
        self.points.remove(&at)
    }

    #[must_use]
    pub fn contains(&self, at: InstructionRef) -> bool {
        self.points.contains(&at)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Where the last pause happened, if execution has not moved on since.
    #[must_use]
    pub const fn paused_at(&self) -> Option<InstructionRef> {
        self.paused_at
    }
}

impl FromIterator<InstructionRef> for Breakpoints {
    fn from_iter<I: IntoIterator<Item = InstructionRef>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
            paused_at: None,
        }
    }
}

impl ExecutionInterceptor for Breakpoints {
    fn should_execute(&mut self, at: InstructionRef) -> bool {
        if self.paused_at.take() == Some(at) || !self.points.contains(&at) {
            return true;
        }
        debug!(%at, "breakpoint hit");
        self.paused_at = Some(at);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoint_pauses_once_per_arrival() {
        let bp = InstructionRef::new(0, 2);
        let mut breakpoints: Breakpoints = [bp].into_iter().collect();

        assert!(breakpoints.should_execute(InstructionRef::new(0, 1)));
        assert!(!breakpoints.should_execute(bp));
        assert_eq!(breakpoints.paused_at(), Some(bp));
        assert!(breakpoints.should_execute(bp));
        assert_eq!(breakpoints.paused_at(), None);

        // Coming back around pauses again.
        assert!(breakpoints.should_execute(InstructionRef::new(0, 0)));
        assert!(!breakpoints.should_execute(bp));
    }

    #[test]
    fn test_closure_interceptor() {
        let mut seen = Vec::new();
        let mut interceptor = |at: InstructionRef| {
            seen.push(at);
            at.index < 1
        };
        assert!(interceptor.should_execute(InstructionRef::new(0, 0)));
        assert!(!interceptor.should_execute(InstructionRef::new(0, 1)));
        assert_eq!(seen.len(), 2);
    }
}
