use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Project folder containing scenario.json; searched recursively
    pub input: PathBuf,
    /// Output directory for game.dat
    pub output: PathBuf,
    /// Also write mage_encoder.h describing the bundle format
    #[arg(long)]
    pub header: bool,
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn default_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
