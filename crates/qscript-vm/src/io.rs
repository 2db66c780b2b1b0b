//! Side channel between the VM and its host.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use qscript_ir::{InstructionRef, Label};

use crate::error::VmError;

/// Host callbacks for everything the VM cannot do itself: dialogs, floor
/// setup and diagnostics.
///
/// Every method has a no-op default, so implementors only override what
/// they care about.
pub trait VmIo {
    /// A fault halted the VM.
    fn error(&mut self, _err: &VmError, _at: Option<InstructionRef>) {}

    /// Something suspicious that does not stop execution.
    fn warning(&mut self, _message: &str, _at: Option<InstructionRef>) {}

    fn window_msg(&mut self, _message: &str) {}

    fn add_msg(&mut self, _message: &str) {}

    fn winend(&mut self) {}

    fn mesend(&mut self) {}

    /// Whether the player in `slot` is dead.
    fn p_dead_v3(&mut self, _slot: i32) -> bool {
        false
    }

    fn map_designate(&mut self, _floor_id: i32, _variant_id: i32) {}

    fn set_floor_handler(&mut self, _floor_id: i32, _label: Label) {}
}

/// Default host: reports everything through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingIo;

impl VmIo for TracingIo {
    fn error(&mut self, err: &VmError, at: Option<InstructionRef>) {
        match at {
            Some(at) => error!(%at, "{err}"),
            None => error!("{err}"),
        }
    }

    fn warning(&mut self, message: &str, at: Option<InstructionRef>) {
        match at {
            Some(at) => warn!(%at, "{message}"),
            None => warn!("{message}"),
        }
    }

    fn window_msg(&mut self, message: &str) {
        info!(message, "window_msg");
    }

    fn add_msg(&mut self, message: &str) {
        info!(message, "add_msg");
    }

    fn map_designate(&mut self, floor_id: i32, variant_id: i32) {
        info!(floor_id, variant_id, "map_designate");
    }

    fn set_floor_handler(&mut self, floor_id: i32, label: Label) {
        info!(floor_id, label, "set_floor_handler");
    }
}

/// Something the VM reported to its host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmEvent {
    Error(String),
    Warning(String),
    WindowMessage(String),
    AddMessage(String),
    WindowEnd,
    MessageEnd,
    MapDesignate { floor_id: i32, variant_id: i32 },
    FloorHandler { floor_id: i32, label: Label },
}

/// Host that records every event. Clones share the same log, so a clone can
/// be kept to inspect what the VM reported.
#[derive(Clone, Debug, Default)]
pub struct RecordingIo {
    events: Arc<Mutex<Vec<VmEvent>>>,
}

impl RecordingIo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events so far.
    #[must_use]
    pub fn events(&self) -> Vec<VmEvent> {
        self.events.lock().clone()
    }

    fn push(&self, event: VmEvent) {
        self.events.lock().push(event);
    }
}

impl VmIo for RecordingIo {
    fn error(&mut self, err: &VmError, _at: Option<InstructionRef>) {
        self.push(VmEvent::Error(err.to_string()));
    }

    fn warning(&mut self, message: &str, _at: Option<InstructionRef>) {
        self.push(VmEvent::Warning(message.to_string()));
    }

    fn window_msg(&mut self, message: &str) {
        self.push(VmEvent::WindowMessage(message.to_string()));
    }

    fn add_msg(&mut self, message: &str) {
        self.push(VmEvent::AddMessage(message.to_string()));
    }

    fn winend(&mut self) {
        self.push(VmEvent::WindowEnd);
    }

    fn mesend(&mut self) {
        self.push(VmEvent::MessageEnd);
    }

    fn map_designate(&mut self, floor_id: i32, variant_id: i32) {
        self.push(VmEvent::MapDesignate {
            floor_id,
            variant_id,
        });
    }

    fn set_floor_handler(&mut self, floor_id: i32, label: Label) {
        self.push(VmEvent::FloorHandler { floor_id, label });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_clones_share_log() {
        let io = RecordingIo::new();
        let mut handle: Box<dyn VmIo> = Box::new(io.clone());
        handle.window_msg("hello");
        handle.map_designate(1, 2);
        assert!(!handle.p_dead_v3(0));
        assert_eq!(
            io.events(),
            vec![
                VmEvent::WindowMessage("hello".to_string()),
                VmEvent::MapDesignate {
                    floor_id: 1,
                    variant_id: 2
                },
            ]
        );
    }
}
