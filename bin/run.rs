use std::fs;
use std::process;
use std::thread;

use clap::{value_t, App, Arg, ArgMatches};
use slog::{o, Discard, Drain, Level, Logger};
use slog_term::{FullFormat, TermDecorator};

use toycpu::{
    config::{MachineConfig, DEFAULT_MAX_CYCLES},
    emulator::{Emulator, RunOutcome},
    error::AssemblyError,
    symbolic::Program,
};

enum Error {
    Parse(Vec<AssemblyError>),
    Fault,
    CycleLimit(u64),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("toyrun")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Mitja Karhusaari <mitja@karhusaari.me>")
        .about("Executes toy CPU programs one phase at a time")
        .arg(
            Arg::with_name("source")
                .help("File containing assembly source")
                .value_name("SOURCE")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("animate")
                .help("Pauses between phases")
                .long("animate")
                .short("a"),
        )
        .arg(
            Arg::with_name("quiet")
                .help("Only prints the final state")
                .long("quiet")
                .short("q"),
        )
        .arg(
            Arg::with_name("max-cycles")
                .help("Stops after N executed instructions")
                .long("max-cycles")
                .value_name("N")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("history")
                .help("Keeps only the last N history entries")
                .long("history")
                .value_name("N")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .help("Enables verbose logging, repeat for more")
                .long("verbose")
                .short("v")
                .multiple(true),
        )
        .get_matches()
}

fn build_logger(verbosity: u64) -> Logger {
    let level = match verbosity {
        0 => return Logger::root(Discard, o!()),
        1 => Level::Debug,
        _ => Level::Trace,
    };

    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().filter_level(level).fuse();

    Logger::root(drain, o!())
}

fn machine_config(args: &ArgMatches) -> MachineConfig {
    let max_cycles = if args.is_present("max-cycles") {
        value_t!(args, "max-cycles", u64).unwrap_or_else(|e| e.exit())
    } else {
        DEFAULT_MAX_CYCLES
    };

    let history_limit = if args.is_present("history") {
        Some(value_t!(args, "history", usize).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };

    MachineConfig {
        max_cycles,
        history_limit,
        ..MachineConfig::default()
    }
}

fn run(args: &ArgMatches, logger: &Logger) -> Result<(), Error> {
    let file_path = args.value_of("source").unwrap_or_default();
    let source = fs::read_to_string(file_path)?;

    let program = Program::parse_with_logger(&*source, logger.clone()).map_err(Error::Parse)?;
    let config = machine_config(args);

    let mut emulator = Emulator::with_logger(program, config, logger.clone());

    let animate = args.is_present("animate");
    let quiet = args.is_present("quiet");

    let mut phase = emulator.phase();
    let mut faulted = false;

    let outcome = emulator.run_with(|step| {
        if !quiet {
            println!("{:>7}: {}", phase, step.explanation);
        }

        faulted |= step.fault.is_some();
        phase = step.phase;

        if animate && !step.state.halted {
            thread::sleep(step.phase.suggested_delay());
        }

        true
    });

    let state = emulator.state();

    println!("{}", state);

    for (address, value) in state.memory.iter().enumerate().filter(|(_, v)| **v != 0) {
        println!("  [{:02X}h] = {}", address, value);
    }

    match outcome {
        RunOutcome::CycleLimit => Err(Error::CycleLimit(config.max_cycles)),
        _ if faulted => Err(Error::Fault),
        _ => Ok(()),
    }
}

fn main() {
    let args = parse_arguments();
    let logger = build_logger(args.occurrences_of("verbose"));

    let code = match run(&args, &logger) {
        Ok(()) => 0,
        Err(Error::Parse(errors)) => {
            for error in &errors {
                eprintln!("error: {}", error);
            }
            1
        }
        Err(Error::Fault) => 1,
        Err(Error::CycleLimit(cycles)) => {
            eprintln!("stopped after {} instructions without halting", cycles);
            1
        }
        Err(Error::IO(io)) => {
            eprintln!("IO error: {}", io);
            2
        }
    };

    // Flushes the asynchronous drain.
    drop(logger);

    process::exit(code);
}
