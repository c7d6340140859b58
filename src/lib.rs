pub mod cli;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod writer;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use parser::source::{DirectorySource, ProjectSource};

/// Compile the project behind `source` into a finished bundle.
pub fn compile(source: &dyn ProjectSource) -> error::Result<Vec<u8>> {
    let data = parser::load(source)?;
    let tables = processor::run(source, data)?;
    writer::bundle::assemble(&tables)
}

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.default_filter())))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // 1. ── Parse ──────────────────────────────────────────────────────
    let source = DirectorySource::open(&args.input)
        .with_context(|| format!("Scanning {}", args.input.display()))?;
    let data = parser::load(&source).with_context(|| "Loading project definitions")?;

    // 2. ── Process ────────────────────────────────────────────────────
    let tables = processor::run(&source, data).with_context(|| "Compiling project")?;
    let bundle = writer::bundle::assemble(&tables).with_context(|| "Assembling bundle")?;

    // 3. ── Write outputs ──────────────────────────────────────────────
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Creating {}", args.output.display()))?;

    writer::bin::emit(&bundle, &args.output).with_context(|| "Writing game.dat")?;
    if args.header {
        writer::c::emit(&args.output).with_context(|| "Writing C header")?;
    }

    Ok(())
}
