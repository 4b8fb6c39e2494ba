use std::fs;
use std::process;

use clap::{App, Arg, ArgMatches};
use itertools::Itertools;
use slog::{o, Discard, Drain, Level, Logger};
use slog_term::{FullFormat, TermDecorator};

use toycpu::{
    compiler::{compile_with_logger, CompileResult},
    config::AssemblerConfig,
};

enum Error {
    Compilation(usize),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("toyasm")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Mitja Karhusaari <mitja@karhusaari.me>")
        .about("Compiles toy CPU assembly into machine code")
        .arg(
            Arg::with_name("source")
                .help("File containing assembly source")
                .value_name("SOURCE")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("listing")
                .help("Prints the address, bytes and source of every instruction")
                .long("listing")
                .short("l"),
        )
        .arg(
            Arg::with_name("symbols")
                .help("Prints the symbol table")
                .long("symbols")
                .short("s"),
        )
        .arg(
            Arg::with_name("output")
                .help("Writes the machine code to FILE")
                .long("output")
                .short("o")
                .value_name("FILE")
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

fn assemble(args: &ArgMatches, logger: &Logger) -> Result<(), Error> {
    let file_path = args.value_of("source").unwrap_or_default();
    let source = fs::read_to_string(file_path)?;

    let result = compile_with_logger(&source, &AssemblerConfig::default(), logger.clone());

    for warning in result.warnings() {
        eprintln!("warning: {}", warning);
    }

    let (bytes, listing, symbol_table) = match result {
        CompileResult::Success {
            bytes,
            listing,
            symbol_table,
            ..
        } => (bytes, listing, symbol_table),
        CompileResult::Failure { errors, .. } => {
            for error in &errors {
                eprintln!("error: {}", error);
            }

            return Err(Error::Compilation(errors.len()));
        }
    };

    if args.is_present("listing") {
        for line in &listing {
            println!("{}", line);
        }
    }

    if args.is_present("symbols") {
        for (label, address) in symbol_table.iter() {
            println!("{:<16} {:02X}", label, address);
        }
    }

    match args.value_of("output") {
        Some(output) => fs::write(output, &bytes)?,
        None if !args.is_present("listing") && !args.is_present("symbols") => {
            for chunk in bytes.chunks(16) {
                println!("{}", chunk.iter().map(|b| format!("{:02X}", b)).join(" "));
            }
        }
        None => (),
    }

    Ok(())
}

fn main() {
    let args = parse_arguments();
    let logger = build_logger(args.occurrences_of("verbose"));

    let code = match assemble(&args, &logger) {
        Ok(()) => 0,
        Err(Error::Compilation(count)) => {
            eprintln!("compilation failed with {} error(s)", count);
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
