//! Lifecycle State Machine - attach/detach tracking with a one-shot init bit.
//!
//! `Unattached -> Attached` may happen any number of times; the
//! `INITIALISED` bit is set on the first attach and never cleared, so the
//! caller can emit the Initialised notification exactly once.

use bitflags::bitflags;

bitflags! {
    /// Lifecycle state as a bitfield.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct LifecycleFlags: u8 {
        /// Currently part of a connected tree.
        const ATTACHED = 1 << 0;
        /// Has been attached at least once. Never cleared.
        const INITIALISED = 1 << 1;
    }
}

/// Outcome of an attach transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttachOutcome {
    /// First attachment ever: emit Initialised, then Connected.
    FirstAttach,
    /// Re-attachment after a detach: emit Connected only.
    Reattach,
}

/// Per-node lifecycle state machine.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    flags: LifecycleFlags,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enter the attached state. Returns whether this was the first attach.
    pub(crate) fn attach(&mut self) -> AttachOutcome {
        self.flags.insert(LifecycleFlags::ATTACHED);
        if self.flags.contains(LifecycleFlags::INITIALISED) {
            AttachOutcome::Reattach
        } else {
            self.flags.insert(LifecycleFlags::INITIALISED);
            AttachOutcome::FirstAttach
        }
    }

    /// Leave the attached state. The initialised bit is kept.
    pub(crate) fn detach(&mut self) {
        self.flags.remove(LifecycleFlags::ATTACHED);
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.flags.contains(LifecycleFlags::ATTACHED)
    }

    pub(crate) fn is_initialised(&self) -> bool {
        self.flags.contains(LifecycleFlags::INITIALISED)
    }
}
