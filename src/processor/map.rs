//! Map compiler.
//!
//! A map is compiled in one pass: tilesets, tile layers, geometry, entities,
//! then every script the map (or anything on it) refers to. Script and
//! object indices inside a map are map-local; [`MapContext`] translates them.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info};

use super::binary::{DATA_ENDIAN, RecordWriter, combine, patch_u16};
use super::entity::{
    CompositeEntity, MAX_ENTITIES_PER_MAP, ON_INTERACT_OFFSET, ON_TICK_OFFSET, encode_entity,
};
use super::geometry;
use super::project::{ContentKind, Project};
use super::script::handle_script;
use super::tileset::{Tileset, load_tileset};
use crate::error::{EncodeError, Result};
use crate::model::{Layer, MapSettings, TiledMap, TiledObject};
use crate::parser::NULL_SCRIPT;
use crate::parser::source::{file_name, read_json};

/// Names that resolve to a fixed value instead of an object on the map.
pub const SPECIAL_KEYWORDS: [(&str, u16); 4] = [
    ("%MAP%", 255),
    ("%SELF%", 254),
    ("%PLAYER%", 253),
    ("%ENTITY_PATH%", 65535),
];

/// Player id written when no entity on the map is the player.
pub const NO_PLAYER: u8 = 255;

pub const FLIPPED_HORIZONTALLY_FLAG: u32 = 0x8000_0000;
pub const FLIPPED_VERTICALLY_FLAG: u32 = 0x4000_0000;
pub const FLIPPED_DIAGONALLY_FLAG: u32 = 0x2000_0000;

const MAP_SCRIPT_SLOTS: [&str; 3] = ["on_load", "on_tick", "on_look"];
const BYTES_PER_TILE: usize = 4;

pub fn special_index(token: &str) -> Option<u16> {
    SPECIAL_KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == token)
        .map(|(_, index)| *index)
}

/// A tile reference with its flip bits split out.
#[derive(Debug, Clone)]
pub struct GidTile {
    pub tileset: Rc<Tileset>,
    pub tile_index: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip_diag: bool,
}

impl GidTile {
    pub fn render_flags(&self) -> u8 {
        ((self.flip_x as u8) << 2) | ((self.flip_y as u8) << 1) | (self.flip_diag as u8)
    }
}

/// Resolve a Tiled global tile id against the map's tilesets, which are in
/// ascending `firstgid` order.
pub fn resolve_gid(gid: u32, tilesets: &[(u32, Rc<Tileset>)], context: &str) -> Result<GidTile> {
    let id = gid & !(FLIPPED_HORIZONTALLY_FLAG | FLIPPED_VERTICALLY_FLAG | FLIPPED_DIAGONALLY_FLAG);
    let (firstgid, tileset) = tilesets
        .iter()
        .take_while(|(firstgid, _)| *firstgid <= id)
        .last()
        .ok_or_else(|| EncodeError::malformed(context, format!("tile gid {id} belongs to no tileset")))?;
    Ok(GidTile {
        tileset: Rc::clone(tileset),
        tile_index: id - firstgid,
        flip_x: gid & FLIPPED_HORIZONTALLY_FLAG != 0,
        flip_y: gid & FLIPPED_VERTICALLY_FLAG != 0,
        flip_diag: gid & FLIPPED_DIAGONALLY_FLAG != 0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSlot {
    Entity(u16),
    Geometry(u16),
}

impl ObjectSlot {
    pub fn local_index(self) -> u16 {
        match self {
            ObjectSlot::Entity(i) | ObjectSlot::Geometry(i) => i,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    pub slot: ObjectSlot,
}

/// Per-map symbol tables, alive while one map compiles.
#[derive(Debug, Default)]
pub struct MapContext {
    pub name: String,
    pub index: u16,
    /// Every object in layer order.
    objects: Vec<MapObject>,
    pub entity_indices: Vec<u16>,
    pub geometry_indices: Vec<u16>,
    pub script_indices: Vec<u16>,
    script_cache: HashMap<String, u16>,
    pub player: Option<u16>,
}

impl MapContext {
    pub fn new(name: impl Into<String>, index: u16) -> Self {
        MapContext {
            name: name.into(),
            index,
            ..MapContext::default()
        }
    }

    pub fn add_object(&mut self, id: u32, name: impl Into<String>, slot: ObjectSlot) {
        self.objects.push(MapObject {
            id,
            name: name.into(),
            slot,
        });
    }

    fn scope(&self) -> String {
        format!(" on map \"{}\"", self.name)
    }

    fn find(&self, name: &str, matches: impl Fn(ObjectSlot) -> bool) -> Option<u16> {
        self.objects
            .iter()
            .find(|o| o.name == name && matches(o.slot))
            .map(|o| o.slot.local_index())
    }

    pub fn entity_local_index(&self, name: &str, context: &str) -> Result<u16> {
        special_index(name)
            .or_else(|| self.find(name, |s| matches!(s, ObjectSlot::Entity(_))))
            .ok_or_else(|| EncodeError::not_found(context, "entity", name, self.scope()))
    }

    pub fn geometry_local_index(&self, name: &str, context: &str) -> Result<u16> {
        special_index(name)
            .or_else(|| self.find(name, |s| matches!(s, ObjectSlot::Geometry(_))))
            .ok_or_else(|| EncodeError::not_found(context, "geometry", name, self.scope()))
    }

    /// First object of either kind called `name`.
    pub fn object_local_index(&self, name: &str, context: &str) -> Result<u16> {
        special_index(name)
            .or_else(|| self.find(name, |_| true))
            .ok_or_else(|| EncodeError::not_found(context, "object", name, self.scope()))
    }

    pub fn geometry_by_id(&self, id: u32) -> Option<u16> {
        self.objects
            .iter()
            .find(|o| o.id == id && matches!(o.slot, ObjectSlot::Geometry(_)))
            .map(|o| o.slot.local_index())
    }

    pub fn cached_script(&self, name: &str) -> Option<u16> {
        self.script_cache.get(name).copied()
    }

    /// Append a global script index to the local table and remember it under
    /// `name`. Returns the local index.
    pub fn add_script(&mut self, name: &str, global: u16) -> Result<u16> {
        let local = u16::try_from(self.script_indices.len()).map_err(|_| EncodeError::FieldOverflow {
            context: format!("map \"{}\" script count", self.name),
            value: self.script_indices.len() as i64,
            width: 2,
        })?;
        self.script_indices.push(global);
        self.script_cache.insert(name.to_string(), local);
        Ok(local)
    }
}

/// Claim a map index per manifest entry so maps can refer to each other
/// before they are compiled.
pub fn reserve_maps(project: &mut Project) -> Result<()> {
    let names: Vec<String> = project.data.maps.keys().cloned().collect();
    for name in names {
        let index = project.tables.reserve(ContentKind::Maps, &name)?;
        project.maps.insert(name, index);
    }
    Ok(())
}

pub fn compile_map(name: &str, settings: &MapSettings, project: &mut Project) -> Result<()> {
    let context = format!("map \"{name}\"");
    let path = settings.path.as_deref().ok_or_else(|| EncodeError::MissingField {
        context: context.clone(),
        field: "path",
    })?;
    let index = project
        .map_index(name)
        .ok_or_else(|| EncodeError::not_found(&context, "map", name, " in the scenario"))?;
    let tiled: TiledMap = read_json(project.source, file_name(path))?;
    let mut map = MapContext::new(name, index);

    let mut tilesets = Vec::with_capacity(tiled.tilesets.len());
    for reference in &tiled.tilesets {
        tilesets.push((reference.firstgid, load_tileset(&reference.source, project)?));
    }

    let layers = rasterize_layers(&tiled, &tilesets, &context)?;
    let entities = place_objects(&tiled, &tilesets, &mut map, project)?;
    let slots = compile_map_scripts(&tiled, settings, &mut map, project)?;
    let directions = compile_direction_scripts(settings, &mut map, project)?;
    wire_entity_scripts(&entities, &mut map, project)?;

    let header = encode_map_header(&tiled, &map, layers.len(), &slots, &directions)?;
    let bytes = layers.iter().fold(header, |acc, layer| combine(&acc, layer));
    project.tables.fill(ContentKind::Maps, index, bytes)?;
    info!(
        map = name,
        index,
        entities = map.entity_indices.len(),
        geometry = map.geometry_indices.len(),
        scripts = map.script_indices.len(),
        "map compiled"
    );
    Ok(())
}

/// Four bytes per cell: u16 tile index + 1 (0 is empty), u8 tileset index,
/// u8 render flags.
fn rasterize_layers(
    tiled: &TiledMap,
    tilesets: &[(u32, Rc<Tileset>)],
    context: &str,
) -> Result<Vec<Vec<u8>>> {
    let cells = tiled.width as usize * tiled.height as usize;
    let mut out = Vec::new();
    for layer in &tiled.layers {
        let Layer::Tilelayer { name, data } = layer else { continue };
        let layer_context = format!("{context} layer \"{name}\"");
        if data.len() != cells {
            return Err(EncodeError::malformed(
                layer_context,
                format!("has {} cells, expected {} x {} = {cells}", data.len(), tiled.width, tiled.height),
            ));
        }
        let mut bytes = vec![0u8; cells * BYTES_PER_TILE];
        for (i, gid) in data.iter().enumerate() {
            if *gid == 0 {
                continue;
            }
            let tile = resolve_gid(*gid, tilesets, &layer_context)?;
            let at = i * BYTES_PER_TILE;
            let value = u16::try_from(tile.tile_index + 1).map_err(|_| EncodeError::FieldOverflow {
                context: format!("{layer_context} tile index"),
                value: tile.tile_index as i64 + 1,
                width: 2,
            })?;
            let tileset = u8::try_from(tile.tileset.index).map_err(|_| EncodeError::FieldOverflow {
                context: format!("{layer_context} tileset index"),
                value: tile.tileset.index as i64,
                width: 1,
            })?;
            patch_u16(&mut bytes, at, value, DATA_ENDIAN);
            bytes[at + 2] = tileset;
            bytes[at + 3] = tile.render_flags();
        }
        out.push(bytes);
    }
    Ok(out)
}

/// Encode geometry and entities and fill the map's object tables. Returns the
/// encoded entities in local order with their global indices.
fn place_objects(
    tiled: &TiledMap,
    tilesets: &[(u32, Rc<Tileset>)],
    map: &mut MapContext,
    project: &mut Project,
) -> Result<Vec<(u16, CompositeEntity)>> {
    let objects: Vec<&TiledObject> = tiled
        .layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::Objectgroup { objects, .. } => Some(objects),
            _ => None,
        })
        .flatten()
        .collect();
    if let Some(rotated) = objects.iter().find(|o| o.rotation != 0.0) {
        return Err(EncodeError::RotatedObject {
            map: map.name.clone(),
            object: rotated.label(),
        });
    }
    let entity_count = objects.iter().filter(|o| o.gid.is_some()).count();
    if entity_count > MAX_ENTITIES_PER_MAP {
        return Err(EncodeError::TooManyEntities {
            map: map.name.clone(),
            count: entity_count,
            limit: MAX_ENTITIES_PER_MAP,
        });
    }

    let mut slots: Vec<Option<ObjectSlot>> = vec![None; objects.len()];
    for (position, object) in objects.iter().enumerate() {
        if object.gid.is_some() {
            continue;
        }
        let global = geometry::encode_object(object, project)?;
        let local = map.geometry_indices.len() as u16;
        map.geometry_indices.push(global);
        slots[position] = Some(ObjectSlot::Geometry(local));
    }
    // Entity paths refer to geometry by Tiled object id.
    for (position, object) in objects.iter().enumerate() {
        if let Some(slot @ ObjectSlot::Geometry(_)) = slots[position] {
            map.add_object(object.id, object.name.clone(), slot);
        }
    }

    let mut composed = Vec::with_capacity(entity_count);
    for (position, object) in objects.iter().enumerate() {
        let Some(gid) = object.gid else { continue };
        let tile = resolve_gid(gid, tilesets, &format!("map \"{}\" object {}", map.name, object.label()))?;
        composed.push((position, CompositeEntity::compose(object, tile, project)?));
    }
    composed.sort_by_key(|(_, entity)| entity.is_debug());

    let mut encoded: Vec<(u16, CompositeEntity)> = Vec::with_capacity(composed.len());
    for (position, entity) in composed {
        let path = match entity.path_object() {
            Some(id) => Some(map.geometry_by_id(id).ok_or_else(|| {
                EncodeError::not_found(
                    format!("entity \"{}\" path", entity.label()),
                    "geometry",
                    format!("#{id}"),
                    map.scope(),
                )
            })?),
            None => None,
        };
        let global = encode_entity(&entity, path, project)?;
        let local = map.entity_indices.len() as u16;
        map.entity_indices.push(global);
        slots[position] = Some(ObjectSlot::Entity(local));
        if entity.is_player() {
            if let Some(player) = map.player {
                let existing = &encoded[player as usize].1;
                return Err(EncodeError::MultiplePlayers {
                    map: map.name.clone(),
                    first: existing.label(),
                    second: entity.label(),
                });
            }
            map.player = Some(local);
        }
        encoded.push((global, entity));
    }

    // Rebuild the lookup in layer order now that entities have local indices.
    map.objects.clear();
    for (position, object) in objects.iter().enumerate() {
        if let Some(slot) = slots[position] {
            map.add_object(object.id, object.name.clone(), slot);
        }
    }
    debug!(map = %map.name, entities = encoded.len(), geometry = map.geometry_indices.len(), "objects placed");
    Ok(encoded)
}

/// `on_load`, `on_tick` and `on_look`, from the Tiled map properties first
/// and then the scenario. Returns the local id per slot.
fn compile_map_scripts(
    tiled: &TiledMap,
    settings: &MapSettings,
    map: &mut MapContext,
    project: &mut Project,
) -> Result<HashMap<&'static str, u16>> {
    handle_script(NULL_SCRIPT, map, project)?;

    let mut scripts: Vec<(&'static str, String)> = Vec::new();
    for property in &tiled.properties {
        let Some(slot) = MAP_SCRIPT_SLOTS.iter().find(|s| **s == property.name) else { continue };
        match property.value.as_str() {
            Some(value) if !value.is_empty() => scripts.push((*slot, value.to_string())),
            _ => {}
        }
    }
    let from_settings = [
        ("on_load", &settings.on_load),
        ("on_tick", &settings.on_tick),
        ("on_look", &settings.on_look),
    ];
    for (slot, value) in from_settings {
        let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else { continue };
        if scripts.iter().any(|(s, _)| *s == slot) {
            return Err(EncodeError::DuplicateMapScript {
                map: map.name.clone(),
                slot: slot.to_string(),
            });
        }
        scripts.push((slot, value.to_string()));
    }

    let mut slots = HashMap::new();
    for (slot, script) in scripts {
        slots.insert(slot, handle_script(&script, map, project)?);
    }
    Ok(slots)
}

fn compile_direction_scripts(
    settings: &MapSettings,
    map: &mut MapContext,
    project: &mut Project,
) -> Result<Vec<(String, u16)>> {
    let mut out = Vec::with_capacity(settings.directions.len());
    for (direction, script) in &settings.directions {
        out.push((direction.clone(), handle_script(script, map, project)?));
    }
    Ok(out)
}

/// Compile each entity's `on_interact` and `on_tick` and patch the local
/// script ids into the already encoded entity records.
fn wire_entity_scripts(
    entities: &[(u16, CompositeEntity)],
    map: &mut MapContext,
    project: &mut Project,
) -> Result<()> {
    for (global, entity) in entities {
        for (property, offset) in [("on_interact", ON_INTERACT_OFFSET), ("on_tick", ON_TICK_OFFSET)] {
            let Some(script) = entity.script(property) else { continue };
            let local = handle_script(&script, map, project)?;
            let bytes = project.tables.bytes_mut(ContentKind::Entities, *global)?;
            patch_u16(bytes, offset, local, DATA_ENDIAN);
        }
    }
    Ok(())
}

fn count_field(value: usize, width: usize, context: impl FnOnce() -> String) -> Result<u32> {
    u32::try_from(value).map_err(|_| EncodeError::FieldOverflow {
        context: context(),
        value: value as i64,
        width,
    })
}

fn encode_map_header(
    tiled: &TiledMap,
    map: &MapContext,
    layer_count: usize,
    slots: &HashMap<&'static str, u16>,
    directions: &[(String, u16)],
) -> Result<Vec<u8>> {
    let ctx = |field: &str| format!("map \"{}\" {field}", map.name);
    let declared = 16
        + 2 * 7
        + 1
        + 1
        + 2 * 3
        + 1
        + 1
        + 2 * map.entity_indices.len()
        + 2 * map.geometry_indices.len()
        + 2 * map.script_indices.len()
        + 16 * directions.len();
    let mut w = RecordWriter::new(declared);
    w.chars(&map.name, 16)
        .uint(tiled.tilewidth, 2, DATA_ENDIAN, || ctx("tile width"))?
        .uint(tiled.tileheight, 2, DATA_ENDIAN, || ctx("tile height"))?
        .uint(tiled.width, 2, DATA_ENDIAN, || ctx("width"))?
        .uint(tiled.height, 2, DATA_ENDIAN, || ctx("height"))?;
    for slot in MAP_SCRIPT_SLOTS {
        w.u16(slots.get(slot).copied().unwrap_or(0), DATA_ENDIAN);
    }
    w.uint(count_field(layer_count, 1, || ctx("layer count"))?, 1, DATA_ENDIAN, || ctx("layer count"))?
        .uint(
            map.player.map_or(NO_PLAYER as u32, u32::from),
            1,
            DATA_ENDIAN,
            || ctx("player entity"),
        )?
        .uint(count_field(map.entity_indices.len(), 2, || ctx("entity count"))?, 2, DATA_ENDIAN, || ctx("entity count"))?
        .uint(count_field(map.geometry_indices.len(), 2, || ctx("geometry count"))?, 2, DATA_ENDIAN, || ctx("geometry count"))?
        .uint(count_field(map.script_indices.len(), 2, || ctx("script count"))?, 2, DATA_ENDIAN, || ctx("script count"))?
        .uint(count_field(directions.len(), 1, || ctx("direction count"))?, 1, DATA_ENDIAN, || ctx("direction count"))?
        .skip(1);
    for index in map
        .entity_indices
        .iter()
        .chain(&map.geometry_indices)
        .chain(&map.script_indices)
    {
        w.u16(*index, DATA_ENDIAN);
    }
    for (direction, script) in directions {
        w.chars(direction, 12).u16(*script, DATA_ENDIAN).skip(2);
    }
    Ok(w.finish())
}
