//! Serde shapes of every file a project is made of.
//!
//! These stay close to the JSON on disk (Tiled exports and the hand-written
//! scenario files). Nothing here knows about the bundle layout.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

/// `scenario.json`, the project manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioManifest {
    pub maps: IndexMap<String, MapEntry>,
    pub script_paths: Vec<String>,
    pub dialog_paths: Vec<String>,
    pub serial_dialog_paths: Vec<String>,
    /// Skin name -> tileset path. `default` is used when a screen names none.
    pub dialog_skins: IndexMap<String, String>,
}

/// A manifest map is either a bare path or a path with overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MapEntry {
    Path(String),
    Detailed(MapSettings),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub path: Option<String>,
    pub on_load: Option<String>,
    pub on_tick: Option<String>,
    pub on_look: Option<String>,
    /// Direction name -> script name, in declaration order.
    pub directions: IndexMap<String, String>,
}

impl MapEntry {
    pub fn settings(&self) -> MapSettings {
        match self {
            MapEntry::Path(path) => MapSettings {
                path: Some(path.clone()),
                ..MapSettings::default()
            },
            MapEntry::Detailed(settings) => settings.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────
// Tiled
// ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TiledMap {
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub tilesets: Vec<TilesetRef>,
    #[serde(default)]
    pub properties: Vec<TiledProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TilesetRef {
    pub firstgid: u32,
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Tilelayer {
        #[serde(default)]
        name: String,
        #[serde(default)]
        data: Vec<u32>,
    },
    Objectgroup {
        #[serde(default)]
        name: String,
        #[serde(default)]
        objects: Vec<TiledObject>,
    },
    /// Image layers and groups carry nothing the engine reads.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TiledObject {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    /// Newer Tiled versions export this as `class`.
    #[serde(rename = "type", alias = "class", default)]
    pub kind: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    pub gid: Option<u32>,
    #[serde(default)]
    pub point: bool,
    #[serde(default)]
    pub ellipse: bool,
    pub polygon: Option<Vec<Point>>,
    pub polyline: Option<Vec<Point>>,
    pub text: Option<Value>,
    #[serde(default)]
    pub properties: Vec<TiledProperty>,
}

impl TiledObject {
    /// How the object is referred to in error messages.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("#{}", self.id)
        } else {
            format!("\"{}\" (#{})", self.name, self.id)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TiledProperty {
    pub name: String,
    #[serde(rename = "type", default = "default_property_type")]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}

fn default_property_type() -> String {
    "string".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TilesetFile {
    pub tilewidth: u32,
    pub tileheight: u32,
    pub tilecount: u32,
    pub columns: u32,
    pub image: String,
    pub imagewidth: u32,
    pub imageheight: u32,
    #[serde(default)]
    pub tiles: Vec<TileDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TileDef {
    pub id: u32,
    #[serde(rename = "type", alias = "class", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: Vec<TiledProperty>,
    pub animation: Option<Vec<AnimationFrame>>,
    pub objectgroup: Option<TileObjectGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TileObjectGroup {
    #[serde(default)]
    pub objects: Vec<TiledObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimationFrame {
    pub tileid: u32,
    pub duration: u32,
}

// ─────────────────────────────────────────────────────
// Scenario definition files
// ─────────────────────────────────────────────────────

/// One entry of `entity_types.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityTypeDef {
    pub tileset: String,
    #[serde(default)]
    pub animations: IndexMap<String, Vec<DirectionTile>>,
    pub portrait: Option<String>,
}

/// A tile as seen from one facing direction (or one emote).
#[derive(Debug, Clone, Deserialize)]
pub struct DirectionTile {
    pub tileid: u32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub flip_y: bool,
    #[serde(default)]
    pub flip_diag: bool,
}

impl DirectionTile {
    pub fn render_flags(&self) -> u8 {
        ((self.flip_x as u8) << 2) | ((self.flip_y as u8) << 1) | (self.flip_diag as u8)
    }
}

/// One entry of `portraits.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PortraitDef {
    pub tileset: String,
    #[serde(default)]
    pub emotes: IndexMap<String, DirectionTile>,
}

/// One entry of the Tiled `object_types.json` export.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectTypeDef {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<TiledProperty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DialogScreenDef {
    pub name: Option<String>,
    pub entity: Option<String>,
    pub portrait: Option<String>,
    pub border_tileset: Option<String>,
    pub alignment: Option<String>,
    pub response_type: Option<String>,
    pub emote: Option<u8>,
    pub messages: Vec<String>,
    pub options: Vec<ResponseDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseDef {
    pub label: String,
    pub script: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SerialDialogDef {
    pub messages: Vec<String>,
    pub options: Vec<ResponseDef>,
    /// Typed answer -> script name.
    pub text_options: Option<IndexMap<String, String>>,
}

/// One script action: the opcode name plus whatever operands it carries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Action {
    pub action: String,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

pub type Script = Vec<Action>;
pub type Dialog = Vec<DialogScreenDef>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_entry_forms() {
        let manifest: ScenarioManifest = serde_json::from_value(json!({
            "maps": {
                "town": "maps/town.json",
                "cave": {"path": "maps/cave.json", "on_load": "cave_load", "directions": {"north": "go_north"}}
            },
            "scriptPaths": ["scripts/a.json"]
        }))
        .unwrap();
        let town = manifest.maps["town"].settings();
        assert_eq!(town.path.as_deref(), Some("maps/town.json"));
        assert!(town.on_load.is_none());
        let cave = manifest.maps["cave"].settings();
        assert_eq!(cave.on_load.as_deref(), Some("cave_load"));
        assert_eq!(cave.directions["north"], "go_north");
        assert_eq!(manifest.script_paths, vec!["scripts/a.json".to_string()]);
        assert!(manifest.dialog_paths.is_empty());
    }

    #[test]
    fn test_layers_and_objects() {
        let map: TiledMap = serde_json::from_value(json!({
            "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16,
            "layers": [
                {"type": "tilelayer", "name": "ground", "data": [1, 0]},
                {"type": "imagelayer", "name": "sky"},
                {"type": "objectgroup", "name": "things", "objects": [
                    {"id": 3, "name": "door", "class": "door", "x": 1.5, "y": 2.0, "gid": 2},
                    {"id": 4, "name": "path", "x": 0, "y": 0, "polyline": [{"x": 0, "y": 0}, {"x": 4, "y": 0}]}
                ]}
            ],
            "tilesets": [{"firstgid": 1, "source": "../tilesets/town.json"}]
        }))
        .unwrap();
        assert_eq!(map.layers.len(), 3);
        assert!(matches!(map.layers[1], Layer::Other));
        let Layer::Objectgroup { objects, .. } = &map.layers[2] else {
            panic!("expected an object layer");
        };
        assert_eq!(objects[0].kind, "door");
        assert_eq!(objects[0].gid, Some(2));
        assert_eq!(objects[1].polyline.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_action_keeps_operands() {
        let action: Action = serde_json::from_value(json!({
            "action": "SET_ENTITY_X", "entity": "Bob", "u2_value": 10
        }))
        .unwrap();
        assert_eq!(action.action, "SET_ENTITY_X");
        assert_eq!(action.args["entity"], "Bob");
        assert!(!action.args.contains_key("action"));
    }

    #[test]
    fn test_direction_tile_flags() {
        let tile: DirectionTile =
            serde_json::from_value(json!({"tileid": 4, "flip_x": true, "flip_diag": true})).unwrap();
        assert_eq!(tile.render_flags(), 0b101);
    }
}
