//! Limits and tunables for the assembler and the emulator.

/// Longest accepted source text, in characters.
pub const MAX_SOURCE_LENGTH: usize = 8000;

/// Largest program the assembler will emit, in bytes.
pub const MAX_PROGRAM_BYTES: usize = 256;

/// Number of memory cells in the emulated machine.
///
/// Matches the assembler's address space so that every address accepted by the assembler is
/// also addressable at runtime.
pub const MEMORY_SIZE: usize = 256;

/// Default number of execute phases [Emulator::run](crate::emulator::Emulator::run) performs
/// before giving up on a program that never halts.
pub const DEFAULT_MAX_CYCLES: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblerConfig {
    pub max_source_length: usize,
    pub max_program_bytes: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            max_source_length: MAX_SOURCE_LENGTH,
            max_program_bytes: MAX_PROGRAM_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineConfig {
    /// Number of memory cells.
    pub memory_size: usize,

    /// Maximum number of retained history entries. `None` keeps everything.
    pub history_limit: Option<usize>,

    /// Upper bound on execute phases for a single call to
    /// [Emulator::run](crate::emulator::Emulator::run).
    pub max_cycles: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            memory_size: MEMORY_SIZE,
            history_limit: None,
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}
