//! Execution history of the [Emulator](crate::emulator::Emulator).

use std::collections::VecDeque;

use crate::emulator::MachineState;
use crate::symbolic::Instruction;

/// Record of one execute phase.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Value of [MachineState::cycle] after the instruction was executed.
    pub cycle: u64,
    pub instruction: Instruction,
    pub explanation: String,

    /// Snapshot of the machine right after the instruction was executed.
    pub state: MachineState,
}

/// History of executed instructions, oldest first.
///
/// With a limit set, the oldest entries are dropped to make room for new ones.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: Option<usize>,
}

impl History {
    pub fn new(limit: Option<usize>) -> History {
        History {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if let Some(limit) = self.limit {
            if limit == 0 {
                return;
            }

            while self.entries.len() >= limit {
                self.entries.pop_front();
            }
        }

        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::symbolic::Program;

    fn entries(count: u64) -> Vec<HistoryEntry> {
        let program = Program::parse("HLT").unwrap();
        let state = MachineState::new(&program, &MachineConfig::default());

        (1..=count)
            .map(|cycle| HistoryEntry {
                cycle,
                instruction: program.instructions[0].clone(),
                explanation: format!("cycle {}", cycle),
                state: state.clone(),
            })
            .collect()
    }

    #[test]
    fn unbounded() {
        let mut history = History::new(None);

        for entry in entries(50) {
            history.push(entry);
        }

        assert_eq!(history.len(), 50);
        assert_eq!(history.iter().next().map(|e| e.cycle), Some(1));
    }

    #[test]
    fn bounded_drops_oldest() {
        let mut history = History::new(Some(3));

        for entry in entries(5) {
            history.push(entry);
        }

        let cycles: Vec<_> = history.iter().map(|e| e.cycle).collect();
        assert_eq!(cycles, vec![3, 4, 5]);
        assert_eq!(history.last().map(|e| e.explanation.as_str()), Some("cycle 5"));
    }

    #[test]
    fn zero_limit_keeps_nothing() {
        let mut history = History::new(Some(0));

        for entry in entries(2) {
            history.push(entry);
        }

        assert!(history.is_empty());
    }
}
