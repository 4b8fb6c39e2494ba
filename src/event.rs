//! Event handling.
//!
//! The [Emulator](crate::emulator::Emulator) reports the effects of every executed
//! instruction as [Events](Event). [EventListeners](EventListener) are registered with the
//! [add_listener](crate::emulator::Emulator::add_listener) method.
//!
//! A blanket implementation of [EventListener] for all `Fn(&Event)` is provided.

use std::fmt;

use crate::instruction::Register;

/// Represents an event that occurred while executing a program.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The program modified a register.
    RegisterChange {
        /// The register which was modified.
        register: Register,

        /// The new value of the register.
        value: i32,
    },

    /// The program modified a memory cell.
    MemoryChange {
        /// Index of the changed cell.
        address: usize,

        /// New value of the cell.
        value: i32,
    },

    /// A jump transferred control to a non-sequential instruction.
    Jump {
        /// Instruction index of the jump.
        from: usize,

        /// Instruction index of the jump target.
        to: usize,
    },

    /// The processor halted. Carries the explanation of the halting step.
    Halted { reason: String },
}

/// Trait for consuming events.
pub trait EventListener {
    /// Called whenever a new event has been created.
    fn event(&mut self, event: &Event);
}

impl<F> EventListener for F
where
    F: Fn(&Event),
{
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

/// Delivers the events of each step to the registered listeners.
///
/// Listeners are called in registration order. Each listener sees every event of a step before
/// the next listener is called.
#[derive(Default)]
pub(crate) struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Sends a batch of events, in order, to every listener.
    pub fn dispatch(&mut self, events: &[Event]) {
        for listener in &mut self.listeners {
            for event in events {
                listener.event(event);
            }
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
