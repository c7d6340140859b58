//! Entities: tile-backed map objects composed from three property tiers.

use serde_json::Value;
use tracing::trace;

use super::binary::{DATA_ENDIAN, RecordWriter};
use super::geometry::coordinate;
use super::map::GidTile;
use super::project::{ContentKind, Project};
use super::properties::{PropertyBag, get_f64, get_flag, get_str, merge_properties, overlay};
use crate::error::{EncodeError, Result};
use crate::model::TiledObject;

pub const MAX_ENTITIES_PER_MAP: usize = 64;

pub const IS_GLITCHED_FLAG: u8 = 0b1000_0000;
pub const IS_DEBUG_FLAG: u8 = 0b0100_0000;
pub const IS_FLIPPED_DIAGONAL_FLAG: u8 = 0b0000_0001;

/// Script id slots patched after the map's scripts are compiled.
pub const ON_INTERACT_OFFSET: usize = 16;
pub const ON_TICK_OFFSET: usize = 18;
/// A path overwrites hackable states A and B with a u16 geometry index.
pub const PATH_OFFSET: usize = 28;

const ENTITY_RECORD_LEN: usize = 12 + 2 * 6 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryIdType {
    Tileset = 0,
    Animation = 1,
    EntityType = 2,
}

/// An entity after the map object, its tile and its type prototype have
/// been folded together.
#[derive(Debug, Clone)]
pub struct CompositeEntity {
    pub props: PropertyBag,
    pub tile: GidTile,
}

impl CompositeEntity {
    pub fn compose(object: &TiledObject, tile: GidTile, project: &Project) -> Result<Self> {
        let mut instance = PropertyBag::new();
        instance.insert("name".into(), Value::from(object.name.as_str()));
        instance.insert("type".into(), Value::from(object.kind.as_str()));
        instance.insert("x".into(), Value::from(object.x));
        instance.insert("y".into(), Value::from(object.y));
        merge_properties(&mut instance, &object.properties, &format!("object {}", object.label()))?;

        let empty = PropertyBag::new();
        let tile_props = tile
            .tileset
            .tile(tile.tile_index)
            .map_or(&empty, |t| &t.properties);
        let with_tile = overlay(&[tile_props, &instance]);
        let prototype = get_str(&with_tile, "type")
            .and_then(|kind| project.entity_types.get(kind))
            .map_or(&empty, |t| &t.prototype);
        let props = overlay(&[prototype, &with_tile]);
        Ok(CompositeEntity { props, tile })
    }

    pub fn is_debug(&self) -> bool {
        get_flag(&self.props, "is_debug")
    }

    pub fn is_player(&self) -> bool {
        get_flag(&self.props, "is_player")
    }

    pub fn kind(&self) -> Option<&str> {
        get_str(&self.props, "type")
    }

    /// Name, else type, else empty.
    pub fn label(&self) -> String {
        get_str(&self.props, "name")
            .or_else(|| self.kind())
            .unwrap_or_default()
            .to_string()
    }

    /// Tiled object id of the geometry this entity walks along.
    pub fn path_object(&self) -> Option<u32> {
        self.props
            .get("path")
            .and_then(Value::as_u64)
            .filter(|id| *id != 0)
            .map(|id| id as u32)
    }

    pub fn script(&self, property: &str) -> Option<String> {
        get_str(&self.props, property).map(str::to_string)
    }

    fn byte(&self, keys: &[&str]) -> Result<u8> {
        let Some((key, value)) = keys.iter().find_map(|k| get_f64(&self.props, k).map(|v| (*k, v))) else {
            return Ok(0);
        };
        let value = value.trunc();
        if !(0.0..=u8::MAX as f64).contains(&value) {
            return Err(EncodeError::FieldOverflow {
                context: format!("entity \"{}\" {key}", self.label()),
                value: value as i64,
                width: 1,
            });
        }
        Ok(value as u8)
    }
}

/// Encode an entity with zeroed script slots and append it to the entity
/// table.
pub fn encode_entity(entity: &CompositeEntity, path: Option<u16>, project: &mut Project) -> Result<u16> {
    let label = entity.label();
    let tile = &entity.tile;
    let x = coordinate(get_f64(&entity.props, "x").unwrap_or_default(), || {
        format!("entity \"{label}\" x")
    })?;
    let y = coordinate(get_f64(&entity.props, "y").unwrap_or_default(), || {
        format!("entity \"{label}\" y")
    })?;

    let animation = tile.tileset.tile(tile.tile_index).and_then(|t| t.animation);
    let entity_type = entity.kind().and_then(|kind| project.entity_types.get(kind));
    let (id_type, primary, secondary, mut flags) = match (entity_type, animation) {
        (Some(entity_type), _) => {
            let direction = entity_type
                .def
                .animations
                .values()
                .find_map(|directions| {
                    directions.iter().position(|d| {
                        d.tileid == tile.tile_index && d.flip_x == tile.flip_x && d.flip_y == tile.flip_y
                    })
                })
                .unwrap_or(0);
            (PrimaryIdType::EntityType, entity_type.index, 0, direction as u8)
        }
        (None, Some(animation)) => (PrimaryIdType::Animation, animation, 0, tile.render_flags()),
        (None, None) => {
            let tile_index = u16::try_from(tile.tile_index).map_err(|_| EncodeError::FieldOverflow {
                context: format!("entity \"{label}\" tile index"),
                value: tile.tile_index as i64,
                width: 2,
            })?;
            (PrimaryIdType::Tileset, tile.tileset.index, tile_index, tile.render_flags())
        }
    };
    if get_flag(&entity.props, "is_glitched") {
        flags |= IS_GLITCHED_FLAG;
    }
    if entity.is_debug() {
        flags |= IS_DEBUG_FLAG;
    }
    if get_flag(&entity.props, "is_flipped_diagonal") {
        flags |= IS_FLIPPED_DIAGONAL_FLAG;
    }

    let mut w = RecordWriter::new(ENTITY_RECORD_LEN);
    w.chars(&label, 12)
        .u16(x, DATA_ENDIAN)
        .u16(y, DATA_ENDIAN)
        .u16(0, DATA_ENDIAN)
        .u16(0, DATA_ENDIAN)
        .u16(primary, DATA_ENDIAN)
        .u16(secondary, DATA_ENDIAN)
        .u8(id_type as u8)
        .u8(entity.byte(&["current_animation", "currentAnimation"])?)
        .u8(entity.byte(&["current_frame"])?)
        .u8(flags);
    for key in ["hackable_state_a", "hackable_state_b", "hackable_state_c", "hackable_state_d"] {
        w.u8(entity.byte(&[key])?);
    }
    if let Some(path) = path {
        w.patch_u16(PATH_OFFSET, path, DATA_ENDIAN);
    }
    let index = project.tables.push(ContentKind::Entities, label.clone(), w.finish())?;
    trace!(entity = %label, index, kind = ?id_type, "entity encoded");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ScenarioData;
    use crate::parser::source::MemorySource;
    use crate::processor::entity_type::EntityType;
    use crate::processor::tileset::{Tile, Tileset};
    use serde_json::json;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn tileset() -> Rc<Tileset> {
        let mut tiles = HashMap::new();
        let mut sign = PropertyBag::new();
        sign.insert("type".into(), json!("sign"));
        sign.insert("on_interact".into(), json!("read_sign"));
        sign.insert("hackable_state_b".into(), json!(7));
        tiles.insert(
            3,
            Tile {
                properties: sign,
                animation: None,
            },
        );
        tiles.insert(
            4,
            Tile {
                properties: PropertyBag::new(),
                animation: Some(9),
            },
        );
        Rc::new(Tileset {
            name: "town".into(),
            index: 2,
            tile_count: 8,
            tiles,
        })
    }

    fn gid(tile_index: u32, flip_x: bool) -> GidTile {
        GidTile {
            tileset: tileset(),
            tile_index,
            flip_x,
            flip_y: false,
            flip_diag: false,
        }
    }

    fn object(value: serde_json::Value) -> TiledObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_instance_beats_tile_beats_type() {
        let source = MemorySource::new();
        let mut project = Project::new(&source, ScenarioData::default());
        let mut prototype = PropertyBag::new();
        prototype.insert("type".into(), json!("sign"));
        prototype.insert("hackable_state_a".into(), json!(1));
        prototype.insert("hackable_state_b".into(), json!(1));
        prototype.insert("on_tick".into(), json!("idle"));
        project.entity_types.insert(
            "sign".into(),
            EntityType {
                index: 5,
                prototype,
                def: serde_json::from_value(json!({"tileset": "town.json"})).unwrap(),
            },
        );

        let placed = object(json!({
            "id": 1, "name": "", "x": 32, "y": 48, "gid": 4,
            "properties": [{"name": "hackable_state_a", "type": "int", "value": 0}]
        }));
        let entity = CompositeEntity::compose(&placed, gid(3, false), &project).unwrap();
        assert_eq!(entity.props["hackable_state_a"], 0);
        assert_eq!(entity.props["hackable_state_b"], 7);
        assert_eq!(entity.script("on_interact").as_deref(), Some("read_sign"));
        assert_eq!(entity.script("on_tick").as_deref(), Some("idle"));
        assert_eq!(entity.label(), "sign");

        let index = encode_entity(&entity, None, &mut project).unwrap();
        let bytes = project.tables.records(ContentKind::Entities)[index as usize].bytes.clone().unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..4], b"sign");
        assert_eq!(&bytes[12..16], &[32, 0, 48, 0]);
        // entity type 5, direction 0
        assert_eq!(&bytes[20..22], &[5, 0]);
        assert_eq!(bytes[24], PrimaryIdType::EntityType as u8);
        assert_eq!(&bytes[28..32], &[0, 7, 0, 0]);
    }

    #[test]
    fn test_animated_and_plain_tiles() {
        let source = MemorySource::new();
        let mut project = Project::new(&source, ScenarioData::default());
        let placed = object(json!({
            "id": 2, "name": "torch", "x": 0, "y": 0, "gid": 5,
            "properties": [
                {"name": "is_glitched", "type": "bool", "value": true},
                {"name": "current_frame", "type": "int", "value": 2}
            ]
        }));
        let entity = CompositeEntity::compose(&placed, gid(4, true), &project).unwrap();
        encode_entity(&entity, Some(3), &mut project).unwrap();
        let bytes = project.tables.records(ContentKind::Entities)[0].bytes.clone().unwrap();
        assert_eq!(&bytes[20..22], &[9, 0]);
        assert_eq!(bytes[24], PrimaryIdType::Animation as u8);
        assert_eq!(bytes[26], 2);
        assert_eq!(bytes[27], IS_GLITCHED_FLAG | 0b100);
        assert_eq!(&bytes[28..30], &[3, 0]);

        let placed = object(json!({"id": 3, "name": "rock", "x": 1, "y": 2, "gid": 2}));
        let entity = CompositeEntity::compose(&placed, gid(1, false), &project).unwrap();
        encode_entity(&entity, None, &mut project).unwrap();
        let bytes = project.tables.records(ContentKind::Entities)[1].bytes.clone().unwrap();
        assert_eq!(&bytes[20..24], &[2, 0, 1, 0]);
        assert_eq!(bytes[24], PrimaryIdType::Tileset as u8);
    }

    #[test]
    fn test_hackable_state_must_fit_a_byte() {
        let source = MemorySource::new();
        let mut project = Project::new(&source, ScenarioData::default());
        let placed = object(json!({
            "id": 2, "name": "big", "x": 0, "y": 0, "gid": 2,
            "properties": [{"name": "hackable_state_c", "type": "int", "value": 300}]
        }));
        let entity = CompositeEntity::compose(&placed, gid(1, false), &project).unwrap();
        assert_eq!(
            encode_entity(&entity, None, &mut project).unwrap_err().to_string(),
            "entity \"big\" hackable_state_c: value 300 does not fit in 1 byte(s)"
        );
    }
}
