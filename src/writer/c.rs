//! Emit a C header describing the bundle format this encoder produces, so
//! the engine build can be checked against it.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::bundle::{ENGINE_VERSION, MAGIC};
use crate::processor::opcode::Opcode;
use crate::processor::project::ContentKind;

pub const HEADER_FILE: &str = "mage_encoder.h";

pub fn emit(out_dir: &Path) -> io::Result<PathBuf> {
    let path = out_dir.join(HEADER_FILE);
    let mut h = File::create(&path)?;
    write_header(&mut h)?;
    Ok(path)
}

fn write_header(h: &mut impl Write) -> io::Result<()> {
    writeln!(h, "#pragma once")?;
    writeln!(h, "#include <cstdint>")?;
    writeln!(h, "// Auto-generated – DO NOT EDIT\n")?;

    writeln!(h, "#define ENGINE_VERSION {ENGINE_VERSION}")?;
    writeln!(h, "#define ENGINE_MAGIC \"{}\"\n", String::from_utf8_lossy(MAGIC))?;

    // ---------------------------------------------------------------
    // 1. Opcode bytes, in action table order
    // ---------------------------------------------------------------
    writeln!(h, "enum class MageActionType : uint8_t {{")?;
    for (idx, name) in Opcode::NAMES.iter().enumerate() {
        writeln!(h, "    {name} = {idx},")?;
    }
    writeln!(h, "    NUM_ACTIONS = {}", Opcode::NAMES.len())?;
    writeln!(h, "}};\n")?;

    // ---------------------------------------------------------------
    // 2. Content kinds, in bundle order
    // ---------------------------------------------------------------
    writeln!(h, "enum class MageContentKind : uint8_t {{")?;
    for (idx, kind) in ContentKind::ALL.iter().enumerate() {
        writeln!(h, "    {} = {idx},", kind.label())?;
    }
    writeln!(h, "}};")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lists_opcodes_by_byte() {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("#pragma once\n"));
        assert!(text.contains("#define ENGINE_VERSION 3\n"));
        assert!(text.contains(&format!("    RUN_SCRIPT = {},\n", Opcode::RunScript.byte())));
        assert!(text.contains("    maps = 0,\n"));
        assert!(text.contains("    images = 14,\n"));
    }
}
