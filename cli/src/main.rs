mod listing;

use anyhow::Context;
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;

use disbrowser::{
    addr::Addr,
    cart::{Rom, SnesMemory},
    disasm::Options,
    game::{Game, GameSource},
    metadata::{GameData, Metadata},
    state::State,
    vectors,
};

/// Disassembler for 65816 code in SNES LoROM images
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the ROM image
    #[arg(required_unless_present = "game")]
    pub rom: Option<PathBuf>,
    /// Annotations for the ROM as JSON, keyed by address
    #[arg(long, conflicts_with = "game")]
    pub metadata: Option<PathBuf>,
    /// Directory holding `<name>.json` game files
    #[arg(long, default_value = ".")]
    pub game_dir: PathBuf,
    /// Load a game from the game directory instead of a ROM path
    #[arg(long, conflicts_with = "rom")]
    pub game: Option<String>,
    /// Where to start, like `00:8000`. Defaults to the reset vector
    #[arg(short, long)]
    pub address: Option<String>,
    /// Register widths at the start: `M`/`m` for 8/16 bit A, `X`/`x` for 8/16 bit X and Y
    #[arg(long, default_value = "MX")]
    pub state: String,
    /// Follow calls and jumps, not only branches
    #[arg(long)]
    pub global: bool,
    /// Print the interrupt vectors
    #[arg(long)]
    pub vectors: bool,
    /// Print the ROM header
    #[arg(long)]
    pub info: bool,
    /// Log what the disassembler is doing
    #[arg(short, long)]
    pub verbose: bool,
}

fn open(args: &Args) -> anyhow::Result<Arc<Game>> {
    if let Some(name) = &args.game {
        return Ok(GameSource::new(&args.game_dir).get(name)?);
    }
    let Some(path) = &args.rom else {
        anyhow::bail!("no ROM given");
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut data = GameData::new(path.display().to_string(), path);
    if let Some(metadata) = &args.metadata {
        let json = std::fs::read_to_string(metadata)
            .with_context(|| format!("reading {}", metadata.display()))?;
        data.metadata = Metadata::from_json(&json)?;
    }
    let memory = SnesMemory::lorom(Rom::from_file_bytes(bytes));
    Ok(Arc::new(Game::new(data.name.clone(), memory, data)))
}

fn main_err() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let game = open(&args)?;
    if args.info {
        listing::print_info(&game.memory);
    }
    if args.vectors {
        listing::print_vectors(&game.vectors());
    }
    if (args.info || args.vectors) && args.address.is_none() {
        return Ok(());
    }

    let address = match &args.address {
        Some(address) => Addr::parse(address)?,
        None => {
            let data = game.data();
            vectors::reset(&game.memory, &*data)
                .context("the reset vector is unreadable")?
                .code_address
        }
    };
    let options = Options {
        exhaustive: args.global,
        ..Options::default()
    };
    let state = State::new(address, State::parse_flags(&args.state));
    let disassembly = game.disassemble(state, &options);
    listing::print_disassembly(&disassembly, &game.print(&disassembly));
    Ok(())
}

fn main() {
    if let Err(err) = main_err() {
        eprintln!("\x1b[1;31merror:\x1b[m {err:#}");
        std::process::exit(1);
    }
}
