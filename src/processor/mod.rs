//! The compiler core.
//!
//! Everything here appends to the output tables in [`project::Project`];
//! the order the passes run in fixes every scenario index in the bundle.
pub mod binary;
pub mod dialog;
pub mod entity;
pub mod entity_type;
pub mod geometry;
pub mod image;
pub mod intern;
pub mod map;
pub mod opcode;
pub mod project;
pub mod properties;
pub mod resolve;
pub mod script;
pub mod tileset;

use tracing::info;

use crate::error::Result;
use crate::parser::ScenarioData;
use crate::parser::source::ProjectSource;
use project::{ContentKind, OutputTables, Project};

/// Runs every compile pass and returns the filled output tables.
pub fn run(source: &dyn ProjectSource, data: ScenarioData) -> Result<OutputTables> {
    let mut project = Project::new(source, data);

    script::variable_lookahead(&mut project)?;
    map::reserve_maps(&mut project)?;
    info!(
        maps = project.maps.len(),
        variables = project.tables.len(ContentKind::Variables),
        "project loaded"
    );

    entity_type::build_prototypes(&mut project)?;
    dialog::load_dialog_skins(&mut project)?;
    entity_type::encode_portraits(&mut project)?;
    entity_type::encode_entity_types(&mut project)?;
    info!(
        tilesets = project.tables.len(ContentKind::Tilesets),
        entity_types = project.tables.len(ContentKind::EntityTypes),
        portraits = project.tables.len(ContentKind::Portraits),
        "shared content encoded"
    );

    script::encode_null_script(&mut project)?;

    let maps = project.data.maps.clone();
    for (name, settings) in &maps {
        map::compile_map(name, settings, &mut project)?;
    }

    Ok(project.tables)
}
