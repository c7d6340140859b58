//! Write the assembled bundle to disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

pub const BUNDLE_FILE: &str = "game.dat";

pub fn emit(bundle: &[u8], out_dir: &Path) -> io::Result<PathBuf> {
    let path = out_dir.join(BUNDLE_FILE);
    fs::write(&path, bundle)?;
    info!(path = %path.display(), bytes = bundle.len(), "bundle written");
    Ok(path)
}
