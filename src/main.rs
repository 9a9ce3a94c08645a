//! Binary entry point (C8): parses CLI arguments, loads memory banks and
//! the execution trace, then runs the server loop. Exit codes follow the
//! reference server's `main()`: 0 clean shutdown, 1 configuration/load
//! error, 2 interactive interrupt.

use std::collections::BTreeMap;
use std::fs;
use std::io::BufReader;
use std::process::ExitCode;

use clap::Parser;

use gdbreplay::config::{Args, Config};
use gdbreplay::cursor::HartReplay;
use gdbreplay::error::{GdbReplayError, LoadError};
use gdbreplay::memory::MemoryMap;
use gdbreplay::session::Session;
use gdbreplay::{elf, server, trace};

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Load every ELF and raw blob into one memory map, deriving `xlen_bytes`
/// from the first ELF loaded (4 if none was loaded).
fn load_memory(config: &Config) -> Result<(MemoryMap, u8), GdbReplayError> {
    let mut memory = MemoryMap::new();
    let mut xlen_bytes: Option<u8> = None;

    for path in &config.elf_paths {
        let bytes = fs::read(path)?;
        let blob = elf::load(&bytes)?;
        let found = (blob.xlen_bits / 8) as u8;
        match xlen_bytes {
            None => xlen_bytes = Some(found),
            Some(expected) if expected != found => {
                return Err(LoadError::XlenMismatch {
                    expected: expected as u32 * 8,
                    found: blob.xlen_bits,
                }
                .into());
            }
            Some(_) => {}
        }
        memory.add(blob.load_address, blob.bytes);
    }

    for (addr, path) in &config.raw_blobs {
        let bytes = fs::read(path)?;
        memory.add(*addr, bytes);
    }

    Ok((memory, xlen_bytes.unwrap_or(4)))
}

fn run(config: Config) -> Result<(), GdbReplayError> {
    let (memory, xlen_bytes) = load_memory(&config)?;

    let trace_file = fs::File::open(&config.trace_path)?;
    let by_hart = trace::load(BufReader::new(trace_file))?;
    let harts: BTreeMap<u32, HartReplay> = by_hart
        .into_iter()
        .map(|(id, seq)| (id, HartReplay::new(seq)))
        .collect();
    for (id, hart) in &harts {
        log::info!("hart {}: {} instructions", id, hart.instruction_count());
    }

    let mut session = Session::new(memory, harts, xlen_bytes);

    let listener = server::bind_with_reuseaddr(&config.gdb_host, config.gdb_port)?;
    log::info!("listening on {}:{}", config.gdb_host, config.gdb_port);
    server::serve(&listener, &mut session)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    ctrlc::set_handler(|| {
        log::warn!("interrupted, exiting");
        std::process::exit(2);
    })
    .expect("failed to install Ctrl-C handler");

    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::from(1);
        }
    };

    match run(config) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(1)
        }
    }
}
