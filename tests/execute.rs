use toycpu::{
    config::MachineConfig,
    emulator::{step, Emulator, MachineState, Phase, RunOutcome},
    instruction::Register,
    symbolic::Program,
};

fn read_program(source: &str) -> Program {
    Program::parse(source).expect("could not parse program")
}

#[test]
fn test_sum_emulate_program() {
    let mut emulator = Emulator::new(read_program(include_str!("sum.asm")));

    assert_eq!(emulator.run(), RunOutcome::Halted);

    let state = emulator.state();
    assert_eq!(state.registers[Register::A], 5 + 4 + 3 + 2 + 1);
    assert_eq!(state.registers[Register::B], 0);
    assert_eq!(state.memory[0x20], 15);
    assert_eq!(emulator.history().len(), 2 + 5 * 3 + 2);
}

#[test]
fn test_countdown_emulate_program() {
    let mut emulator = Emulator::new(read_program(include_str!("countdown.asm")));

    assert_eq!(emulator.run(), RunOutcome::Halted);

    let state = emulator.state();
    assert_eq!(state.registers[Register::B], 3);
    assert_eq!(state.registers[Register::C], 0);
    assert_eq!(state.memory[0x10], 3);
    assert_eq!(state.memory[0x11], 3);
    assert!(state.flags.zero);
    assert_eq!(emulator.history().len(), 22);
    assert_eq!(state.cycle, 22);
}

/// Drives the free step function by hand, the way an animated front end would.
#[test]
fn test_manual_stepping() {
    let program = read_program("LOAD A,#5\nLOAD B,#7\nADD A,B\nSTORE A,[0x00]\nHLT");

    let mut state = MachineState::new(&program, &MachineConfig::default());
    let mut phase = Phase::Fetch;
    let mut fetched = None;
    let mut executed = 0;
    let mut states = vec![state.clone()];

    while !state.halted {
        let next = step(&state, fetched.as_ref(), phase, &program);

        if phase == Phase::Execute {
            executed += 1;
        }

        state = next.state;
        phase = next.phase;
        fetched = next.fetched;
        states.push(state.clone());
    }

    assert_eq!(state.registers[Register::A], 12);
    assert_eq!(state.memory[0], 12);
    assert_eq!(executed, 5);

    // Earlier states are untouched by later steps.
    assert_eq!(states[0], MachineState::new(&program, &MachineConfig::default()));
    assert_eq!(states[3].registers[Register::A], 5);
    assert_eq!(states[3].registers[Register::B], 0);
}

#[test]
fn test_history_limit() {
    let config = MachineConfig {
        history_limit: Some(4),
        ..MachineConfig::default()
    };

    let mut emulator = Emulator::with_config(read_program(include_str!("sum.asm")), config);
    emulator.run();

    let lines: Vec<_> = emulator
        .history()
        .iter()
        .map(|entry| entry.instruction.line)
        .collect();

    // DEC, JNZ, STORE, HLT of the final iteration.
    assert_eq!(lines, vec![7, 8, 10, 11]);
}

#[test]
fn test_compiled_and_interpreted_programs_agree() {
    let program = read_program(include_str!("countdown.asm"));
    let compiled = program.compile();
    let symbols = compiled.symbol_table().expect("compilation failed");

    // The compiler addresses labels in bytes, the emulator by instruction.
    assert_eq!(symbols.get("next"), Some(&12));
    assert_eq!(program.label_index("next"), Some(4));

    let mut emulator = Emulator::new(program);
    assert_eq!(emulator.run(), RunOutcome::Halted);
}
