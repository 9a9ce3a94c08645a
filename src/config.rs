//! CLI / invocation layer (C8).
//!
//! Parses command-line arguments into a validated [`Config`], the struct
//! the loader and server consume. Modeled on the teacher's `clap::Parser`
//! `Args` struct in `riscv-vm/src/main.rs`.

use std::path::PathBuf;

use clap::Parser;

use crate::error::ConfigError;

/// Raw command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a captured RISC-V instruction trace over the GDB remote protocol", long_about = None)]
pub struct Args {
    /// host:port to listen on for the debugger client
    #[arg(long, default_value = "localhost:3333")]
    pub gdb: String,

    /// ELF executable(s) to load; load address and XLEN come from the file
    #[arg(long = "elf")]
    pub elf: Vec<PathBuf>,

    /// Raw binary blob to load, paired by position with --address
    #[arg(long = "bin")]
    pub bin: Vec<PathBuf>,

    /// Load address (hex, e.g. 80000000) for the --bin at the same position
    #[arg(long = "address")]
    pub address: Vec<String>,

    /// Execution trace log to replay (see trace.rs for the recognized line format)
    #[arg(long)]
    pub trace: PathBuf,

    /// Increase diagnostic verbosity (repeatable: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Validated configuration consumed by `main`.
pub struct Config {
    pub gdb_host: String,
    pub gdb_port: u16,
    pub elf_paths: Vec<PathBuf>,
    pub raw_blobs: Vec<(u64, PathBuf)>,
    pub trace_path: PathBuf,
    pub verbosity: u8,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if args.address.len() != args.bin.len() {
            return Err(ConfigError::AddressBinCountMismatch {
                addresses: args.address.len(),
                bins: args.bin.len(),
            });
        }

        let (host, port_text) = args
            .gdb
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidEndpoint(args.gdb.clone()))?;
        let port: u16 = port_text
            .parse()
            .map_err(|_| ConfigError::InvalidPort(args.gdb.clone()))?;

        let mut raw_blobs = Vec::with_capacity(args.bin.len());
        for (addr_text, path) in args.address.iter().zip(args.bin) {
            let digits = addr_text
                .trim_start_matches("0x")
                .trim_start_matches("0X");
            let addr = u64::from_str_radix(digits, 16)
                .map_err(|_| ConfigError::InvalidAddress(addr_text.clone()))?;
            raw_blobs.push((addr, path));
        }

        Ok(Config {
            gdb_host: host.to_string(),
            gdb_port: port,
            elf_paths: args.elf,
            raw_blobs,
            trace_path: args.trace,
            verbosity: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(gdb: &str, elf: Vec<&str>, bin: Vec<&str>, address: Vec<&str>, trace: &str) -> Args {
        Args {
            gdb: gdb.to_string(),
            elf: elf.into_iter().map(PathBuf::from).collect(),
            bin: bin.into_iter().map(PathBuf::from).collect(),
            address: address.into_iter().map(String::from).collect(),
            trace: PathBuf::from(trace),
            verbose: 0,
        }
    }

    #[test]
    fn accepts_well_formed_arguments() {
        let cfg = Config::from_args(args(
            "localhost:3333",
            vec!["a.elf"],
            vec!["boot.bin"],
            vec!["0x80000000"],
            "trace.log",
        ))
        .unwrap();
        assert_eq!(cfg.gdb_host, "localhost");
        assert_eq!(cfg.gdb_port, 3333);
        assert_eq!(cfg.raw_blobs, vec![(0x80000000, PathBuf::from("boot.bin"))]);
    }

    #[test]
    fn rejects_address_bin_count_mismatch() {
        let err = Config::from_args(args(
            "localhost:3333",
            vec![],
            vec!["a.bin", "b.bin"],
            vec!["0x1000"],
            "trace.log",
        ));
        assert!(matches!(
            err,
            Err(ConfigError::AddressBinCountMismatch { addresses: 1, bins: 2 })
        ));
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let err = Config::from_args(args("not-an-endpoint", vec![], vec![], vec![], "trace.log"));
        assert!(matches!(err, Err(ConfigError::InvalidEndpoint(_))));
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = Config::from_args(args("localhost:notaport", vec![], vec![], vec![], "trace.log"));
        assert!(matches!(err, Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn rejects_non_hex_address() {
        let err = Config::from_args(args(
            "localhost:3333",
            vec![],
            vec!["a.bin"],
            vec!["not-hex"],
            "trace.log",
        ));
        assert!(matches!(err, Err(ConfigError::InvalidAddress(_))));
    }
}
