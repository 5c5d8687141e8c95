use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::basereg::BaseRegister;
use cpu::{EngineConfig, InstructionEngine, MainStorage, ProgramAddressRegister, StorageLocks};

mod loader;

use loader::{load_image, parse_octal};

/// Basic mode images are fetched through B12.
const BASIC_MODE_CODE_BASE_REGISTER: usize = 12;

/// The BDI given to the image bank in extended mode.
const IMAGE_BDI: u64 = 0o40;

/// Basic mode lower limits are multiples of this.
const LOWER_LIMIT_GRANULE: u64 = 0o1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Basic,
    Extended,
}

fn octal(s: &str) -> Result<u64, String> {
    parse_octal(s).map_err(|e| format!("'{s}' is not an octal number: {e}"))
}

/// Run a program image on a 36-bit instruction processor.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// File holding one octal word per line
    image: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Extended)]
    mode: Mode,

    /// Storage segment to load the image into
    #[arg(long, default_value_t = 0)]
    segment: u64,

    /// Relative address (octal) of the first image word
    #[arg(long, value_parser = octal, default_value = "1000")]
    load_offset: u64,

    /// Initial program counter (octal); defaults to the load offset
    #[arg(long, value_parser = octal)]
    start: Option<u64>,

    /// Give up after this many cycles
    #[arg(long, default_value_t = 1_000_000)]
    max_cycles: u64,

    /// Initial processor privilege, 0 (most privileged) to 3
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=3))]
    privilege: u64,

    /// Print the activity state packet as JSON once the run ends
    #[arg(long)]
    dump_state: bool,
}

fn configure(args: &Args, image: &[Word36]) -> Result<InstructionEngine, Box<dyn Error>> {
    let storage = Arc::new(MainStorage::new(args.segment as usize + 1));
    let locks = Arc::new(StorageLocks::new());

    let lower = args.load_offset - args.load_offset % LOWER_LIMIT_GRANULE;
    let skip = args.load_offset - lower;
    let length = skip + image.len() as u64;
    storage.allocate_at(args.segment, length as usize)?;
    let base = AbsoluteAddress::new(args.segment, 0);
    storage.write_slice(base.add_offset(skip), image)?;
    let bd = BankDescriptor::new(
        args.mode == Mode::Basic,
        AccessLock::new(0, 0),
        AccessPermissions::ALL,
        AccessPermissions::ALL,
        base,
        false,
        lower,
        lower + length - 1,
        0,
    );
    event!(Level::DEBUG, "image bank: {bd:?}");

    let mut engine = InstructionEngine::with_config(
        EngineConfig {
            processor_privilege: args.privilege,
            ..EngineConfig::default()
        },
        storage,
        locks,
    );
    let start = args.start.unwrap_or(args.load_offset);
    match args.mode {
        Mode::Basic => {
            engine.set_base_register(BASIC_MODE_CODE_BASE_REGISTER, BaseRegister::from_bank_descriptor(bd));
            engine.asp_mut().dr.set_basic_mode_enabled(true);
            engine.asp_mut().par = ProgramAddressRegister::new(0, 0, start);
        }
        Mode::Extended => {
            engine.set_base_register(0, BaseRegister::from_bank_descriptor(bd));
            engine.asp_mut().par = ProgramAddressRegister::new(0, IMAGE_BDI, start);
        }
    }
    Ok(engine)
}

fn run_emulator() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();

    // RUST_LOG selects which events are printed; see the
    // tracing-subscriber EnvFilter documentation.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::registry().with(filter_layer).with(fmt_layer).init();

    let image = load_image(&args.image)?;
    event!(Level::INFO, "loaded {} words from {}", image.len(), args.image.display());
    let mut engine = configure(&args, &image)?;

    engine.clear_stop();
    let mut cycles = 0;
    while !engine.is_stopped() && cycles < args.max_cycles {
        engine.do_cycle();
        cycles += 1;
    }

    let status = if engine.is_stopped() {
        let (reason, detail) = engine.stop_reason();
        event!(Level::INFO, "stopped after {cycles} cycles: {reason} (detail {detail})");
        println!("{reason} {detail} at {}", engine.asp().par);
        ExitCode::SUCCESS
    } else {
        event!(Level::WARN, "still running after {cycles} cycles");
        engine.dump();
        ExitCode::from(2)
    };

    if args.dump_state {
        println!("{}", serde_json::to_string_pretty(engine.asp())?);
    }
    Ok(status)
}

fn main() -> ExitCode {
    match run_emulator() {
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
        Ok(code) => code,
    }
}
