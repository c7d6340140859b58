//! Tilesets, their tile animations and per-tile collision geometry.
//!
//! A tileset is loaded the first time anything asks for it and then shared
//! through [`Project::tilesets`].

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use super::binary::{DATA_ENDIAN, RecordWriter, combine};
use super::geometry;
use super::image::{TileLayout, load_image};
use super::project::{ContentKind, Project};
use super::properties::{PropertyBag, merge_properties, overlay};
use crate::error::{EncodeError, Result};
use crate::model::{AnimationFrame, TileDef, TilesetFile};
use crate::parser::source::{file_name, read_json};

/// What the rest of the compiler needs to know about one tile.
#[derive(Debug, Clone, Default)]
pub struct Tile {
    /// Tile properties merged over the prototype of the tile's type.
    pub properties: PropertyBag,
    /// Animation index when the tile is animated.
    pub animation: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct Tileset {
    /// File name up to the first `.`.
    pub name: String,
    pub index: u16,
    pub tile_count: u32,
    pub tiles: HashMap<u32, Tile>,
}

impl Tileset {
    pub fn tile(&self, id: u32) -> Option<&Tile> {
        self.tiles.get(&id)
    }
}

pub fn load_tileset(path: &str, project: &mut Project) -> Result<Rc<Tileset>> {
    let file = file_name(path);
    if let Some(tileset) = project.tilesets.get(file) {
        return Ok(Rc::clone(tileset));
    }
    let data: TilesetFile = read_json(project.source, file)?;
    let name = file.split('.').next().unwrap_or(file).to_string();
    let context = format!("tileset \"{file}\"");
    if data.tilewidth == 0 || data.tileheight == 0 {
        return Err(EncodeError::malformed(context, "tile width and height must be greater than zero"));
    }
    if data.imagewidth % data.tilewidth != 0 || data.imageheight % data.tileheight != 0 {
        warn!(
            tileset = file,
            image_width = data.imagewidth,
            image_height = data.imageheight,
            "tileset image size is not a multiple of its tile size"
        );
    }
    let rows = data.imageheight / data.tileheight;
    let index = project.tables.reserve(ContentKind::Tilesets, &name)?;

    let mut tile_geometry = RecordWriter::new(data.tilecount as usize * 2);
    let mut tiles = HashMap::new();
    for def in &data.tiles {
        let tile = load_tile(def, index, &data, &context, &mut tile_geometry, project)?;
        tiles.insert(def.id, tile);
    }

    let layout = TileLayout {
        tile_width: data.tilewidth,
        tile_height: data.tileheight,
        columns: data.columns,
    };
    let image_index = load_image(&data.image, layout, project)?;

    let strip_tiles = rows * data.columns;
    let mut header = RecordWriter::new(16 + 2 * 7);
    header
        .chars(&name, 16)
        .u16(image_index, DATA_ENDIAN)
        .uint(data.tilewidth, 2, DATA_ENDIAN, || format!("{context} image width"))?
        .uint(strip_tiles * data.tileheight, 2, DATA_ENDIAN, || format!("{context} image height"))?
        .uint(data.tilewidth, 2, DATA_ENDIAN, || format!("{context} tile width"))?
        .uint(data.tileheight, 2, DATA_ENDIAN, || format!("{context} tile height"))?
        .u16(1, DATA_ENDIAN)
        .uint(strip_tiles, 2, DATA_ENDIAN, || format!("{context} rows"))?;
    let bytes = combine(&header.finish(), &tile_geometry.finish());
    project.tables.fill(ContentKind::Tilesets, index, bytes)?;
    debug!(tileset = file, index, tiles = data.tilecount, "tileset encoded");

    let tileset = Rc::new(Tileset {
        name,
        index,
        tile_count: data.tilecount,
        tiles,
    });
    project.tilesets.insert(file.to_string(), Rc::clone(&tileset));
    Ok(tileset)
}

fn load_tile(
    def: &TileDef,
    tileset_index: u16,
    data: &TilesetFile,
    context: &str,
    tile_geometry: &mut RecordWriter,
    project: &mut Project,
) -> Result<Tile> {
    let tile_context = format!("{context} tile {}", def.id);
    let mut own = PropertyBag::new();
    if !def.kind.is_empty() {
        own.insert("type".into(), def.kind.clone().into());
    }
    merge_properties(&mut own, &def.properties, &tile_context)?;
    let empty = PropertyBag::new();
    let prototype = project
        .entity_types
        .get(&def.kind)
        .map_or(&empty, |t| &t.prototype);
    let properties = overlay(&[prototype, &own]);

    if let Some(group) = &def.objectgroup {
        match group.objects.as_slice() {
            [] => {}
            [object] => {
                if def.id >= data.tilecount {
                    return Err(EncodeError::malformed(tile_context, "tile id is outside the tileset"));
                }
                let geometry = geometry::encode_object(object, project)?;
                let value = geometry.checked_add(1).ok_or_else(|| EncodeError::FieldOverflow {
                    context: tile_context.clone(),
                    value: geometry as i64 + 1,
                    width: 2,
                })?;
                tile_geometry.patch_u16(def.id as usize * 2, value, DATA_ENDIAN);
            }
            _ => {
                return Err(EncodeError::malformed(
                    tile_context,
                    "has more than one geometry on a single tile",
                ));
            }
        }
    }

    let animation = match &def.animation {
        Some(frames) if !frames.is_empty() => {
            let bytes = encode_animation(tileset_index, frames, &tile_context)?;
            Some(project.tables.push(ContentKind::Animations, tile_context, bytes)?)
        }
        _ => None,
    };
    Ok(Tile { properties, animation })
}

pub fn encode_animation(tileset_index: u16, frames: &[AnimationFrame], context: &str) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new(4 + frames.len() * 4);
    w.u16(tileset_index, DATA_ENDIAN)
        .uint(frames.len() as u32, 2, DATA_ENDIAN, || format!("{context} frame count"))?;
    for frame in frames {
        w.uint(frame.tileid, 2, DATA_ENDIAN, || format!("{context} frame tile"))?
            .uint(frame.duration, 2, DATA_ENDIAN, || format!("{context} frame duration"))?;
    }
    Ok(w.finish())
}
