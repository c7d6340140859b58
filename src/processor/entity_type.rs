//! Entity types and portraits: named bundles of directional animations.

use serde_json::Value;
use tracing::debug;

use super::binary::{DATA_ENDIAN, RecordWriter};
use super::project::{ContentKind, Project};
use super::properties::{PropertyBag, merge_properties};
use super::tileset::{Tileset, load_tileset};
use crate::error::{EncodeError, Result};
use crate::model::{DirectionTile, EntityTypeDef};

/// Animations always carry one tile per cardinal direction.
pub const DIRECTIONS_PER_ANIMATION: usize = 4;
/// Portrait byte written when an entity type has no portrait.
pub const NO_PORTRAIT: u8 = 255;

#[derive(Debug, Clone)]
pub struct EntityType {
    pub index: u16,
    /// Lowest tier of every entity of this type.
    pub prototype: PropertyBag,
    pub def: EntityTypeDef,
}

/// Properties an entity type gets when `object_types.json` does not list it.
pub fn default_prototype() -> PropertyBag {
    let mut bag = PropertyBag::new();
    for key in ["hackable_state_a", "hackable_state_b", "hackable_state_c", "hackable_state_d"] {
        bag.insert(key.into(), Value::from(0));
    }
    bag.insert("is_glitched".into(), Value::Bool(false));
    bag.insert("is_player".into(), Value::Bool(false));
    bag.insert("on_interact".into(), Value::from(""));
    bag.insert("on_tick".into(), Value::from(""));
    bag.insert("path".into(), Value::Null);
    bag
}

/// Reserve an entity type index per declared type and build its prototype.
/// Runs before any tileset is loaded so tile properties can inherit from it.
pub fn build_prototypes(project: &mut Project) -> Result<()> {
    let defs: Vec<(String, EntityTypeDef)> = project
        .data
        .entity_types
        .iter()
        .map(|(name, def)| (name.clone(), def.clone()))
        .collect();
    for (name, def) in defs {
        let mut prototype = PropertyBag::new();
        prototype.insert("type".into(), Value::from(name.as_str()));
        match project.data.object_types.iter().find(|t| t.name == name) {
            Some(object_type) => {
                merge_properties(&mut prototype, &object_type.properties, &format!("object type \"{name}\""))?;
            }
            None => prototype.extend(default_prototype()),
        }
        let index = project.tables.reserve(ContentKind::EntityTypes, &name)?;
        project.entity_types.insert(name, EntityType { index, prototype, def });
    }
    Ok(())
}

/// The 4 byte reference to one direction of an animation: an animation
/// index when the tile is animated, else a tile id with its tileset index
/// plus one.
pub fn direction_ref(tileset: &Tileset, tile: &DirectionTile, context: &str) -> Result<[u8; 4]> {
    let (id, source) = match tileset.tile(tile.tileid).and_then(|t| t.animation) {
        Some(animation) => (animation as u32, 0u32),
        None => (tile.tileid, tileset.index as u32 + 1),
    };
    let mut w = RecordWriter::new(4);
    w.uint(id, 2, DATA_ENDIAN, || format!("{context} tile id"))?
        .uint(source, 1, DATA_ENDIAN, || format!("{context} tileset index"))?
        .u8(tile.render_flags());
    let bytes = w.finish();
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub fn encode_portraits(project: &mut Project) -> Result<()> {
    let portraits: Vec<_> = project
        .data
        .portraits
        .iter()
        .map(|(name, def)| (name.clone(), def.clone()))
        .collect();
    for (name, def) in portraits {
        let index = project.tables.reserve(ContentKind::Portraits, &name)?;
        project.portraits.insert(name.clone(), index);
        let tileset = load_tileset(&def.tileset, project)?;
        let context = format!("portrait \"{name}\"");

        let count = u8::try_from(def.emotes.len()).map_err(|_| EncodeError::FieldOverflow {
            context: format!("{context} emote count"),
            value: def.emotes.len() as i64,
            width: 1,
        })?;
        let mut w = RecordWriter::new(32 + 4 + def.emotes.len() * 4);
        w.chars(&name, 32).skip(3).u8(count);
        for (emote, tile) in &def.emotes {
            let bytes = direction_ref(&tileset, tile, &format!("{context} emote \"{emote}\""))?;
            for b in bytes {
                w.u8(b);
            }
        }
        project.tables.fill(ContentKind::Portraits, index, w.finish())?;
        debug!(portrait = %name, index, emotes = count, "portrait encoded");
    }
    Ok(())
}

pub fn encode_entity_types(project: &mut Project) -> Result<()> {
    let types: Vec<(String, u16, EntityTypeDef)> = project
        .entity_types
        .iter()
        .map(|(name, t)| (name.clone(), t.index, t.def.clone()))
        .collect();
    for (name, index, def) in types {
        let bytes = encode_entity_type(&name, &def, project)?;
        project.tables.fill(ContentKind::EntityTypes, index, bytes)?;
        debug!(entity_type = %name, index, animations = def.animations.len(), "entity type encoded");
    }
    Ok(())
}

fn encode_entity_type(name: &str, def: &EntityTypeDef, project: &mut Project) -> Result<Vec<u8>> {
    let context = format!("entity type \"{name}\"");
    let tileset = load_tileset(&def.tileset, project)?;
    // Without an explicit portrait, one sharing the type's name is used if present.
    let portrait = match (def.portrait.as_deref(), project.portraits.get(def.portrait.as_deref().unwrap_or(name))) {
        (_, Some(index)) => u8::try_from(*index).map_err(|_| EncodeError::FieldOverflow {
            context: format!("{context} portrait"),
            value: *index as i64,
            width: 1,
        })?,
        (Some(portrait), None) => return Err(EncodeError::not_found(&context, "portrait", portrait, "")),
        (None, None) => NO_PORTRAIT,
    };
    let animation_count = u8::try_from(def.animations.len()).map_err(|_| EncodeError::FieldOverflow {
        context: format!("{context} animation count"),
        value: def.animations.len() as i64,
        width: 1,
    })?;

    let mut w = RecordWriter::new(32 + 4 + def.animations.len() * DIRECTIONS_PER_ANIMATION * 4);
    w.chars(name, 32).skip(2).u8(portrait).u8(animation_count);
    for (animation, directions) in &def.animations {
        if directions.len() != DIRECTIONS_PER_ANIMATION {
            return Err(EncodeError::malformed(
                &context,
                format!(
                    "animation \"{animation}\" has {} directions, expected {DIRECTIONS_PER_ANIMATION}",
                    directions.len()
                ),
            ));
        }
        for (i, tile) in directions.iter().enumerate() {
            let bytes = direction_ref(&tileset, tile, &format!("{context} animation \"{animation}\" direction {i}"))?;
            for b in bytes {
                w.u8(b);
            }
        }
    }
    Ok(w.finish())
}
