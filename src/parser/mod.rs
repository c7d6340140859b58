//! Load the project definition.
//!
//! Reads `scenario.json` and everything it points at (script, dialog and
//! serial-dialog files, plus the optional `maps.json`, `entity_types.json`,
//! `object_types.json` and `portraits.json`) into one [`ScenarioData`].
//! Maps and tilesets are loaded lazily by the processor.

pub mod source;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{EncodeError, Result};
use crate::model::{
    Dialog, EntityTypeDef, MapEntry, MapSettings, ObjectTypeDef, PortraitDef, ScenarioManifest,
    Script, SerialDialogDef,
};
use source::{ProjectSource, file_name, read_json, read_optional_json};

pub const SCENARIO_FILE: &str = "scenario.json";
pub const MAPS_FILE: &str = "maps.json";
pub const ENTITY_TYPES_FILE: &str = "entity_types.json";
pub const OBJECT_TYPES_FILE: &str = "object_types.json";
pub const PORTRAITS_FILE: &str = "portraits.json";

/// Always present at script index 0; authors may not redefine it.
pub const NULL_SCRIPT: &str = "null_script";

/// Every definition of a project, merged and de-duplicated. Declaration
/// order is preserved everywhere because it fixes scenario indices.
#[derive(Debug, Clone, Default)]
pub struct ScenarioData {
    pub maps: IndexMap<String, MapSettings>,
    pub scripts: IndexMap<String, Script>,
    pub dialogs: IndexMap<String, Dialog>,
    pub serial_dialogs: IndexMap<String, SerialDialogDef>,
    pub dialog_skins: IndexMap<String, String>,
    pub entity_types: IndexMap<String, EntityTypeDef>,
    pub object_types: Vec<ObjectTypeDef>,
    pub portraits: IndexMap<String, PortraitDef>,
}

pub fn load(source: &dyn ProjectSource) -> Result<ScenarioData> {
    let manifest: ScenarioManifest = read_json(source, SCENARIO_FILE)?;
    info!(
        maps = manifest.maps.len(),
        script_files = manifest.script_paths.len(),
        dialog_files = manifest.dialog_paths.len(),
        serial_dialog_files = manifest.serial_dialog_paths.len(),
        "scenario manifest loaded"
    );

    let maps = merge_maps(source, manifest.maps)?;
    let scripts: IndexMap<String, Script> =
        merge_named(source, &manifest.script_paths, "scripts")?;
    if scripts.contains_key(NULL_SCRIPT) {
        return Err(EncodeError::ReservedName {
            kind: "script",
            name: NULL_SCRIPT.to_string(),
        });
    }
    let dialogs = merge_named(source, &manifest.dialog_paths, "dialogs")?;
    let serial_dialogs = merge_named(source, &manifest.serial_dialog_paths, "serialDialogs")?;

    let entity_types = read_optional_json(source, ENTITY_TYPES_FILE)?.unwrap_or_default();
    let object_types = read_optional_json(source, OBJECT_TYPES_FILE)?.unwrap_or_default();
    let portraits = read_optional_json(source, PORTRAITS_FILE)?.unwrap_or_default();

    let data = ScenarioData {
        maps,
        scripts,
        dialogs,
        serial_dialogs,
        dialog_skins: manifest.dialog_skins,
        entity_types,
        object_types,
        portraits,
    };
    debug!(
        scripts = data.scripts.len(),
        dialogs = data.dialogs.len(),
        serial_dialogs = data.serial_dialogs.len(),
        entity_types = data.entity_types.len(),
        portraits = data.portraits.len(),
        "project definitions merged"
    );
    Ok(data)
}

/// Manifest maps first, then `maps.json`. A name defined in both is an error.
fn merge_maps(
    source: &dyn ProjectSource,
    manifest_maps: IndexMap<String, MapEntry>,
) -> Result<IndexMap<String, MapSettings>> {
    let mut entries = manifest_maps;
    let extra: Option<IndexMap<String, MapEntry>> = read_optional_json(source, MAPS_FILE)?;
    for (name, entry) in extra.unwrap_or_default() {
        match entries.entry(name) {
            Entry::Occupied(e) => {
                return Err(EncodeError::DuplicateName {
                    kind: "map",
                    name: e.key().clone(),
                    file: format!("both {SCENARIO_FILE} and {MAPS_FILE}"),
                });
            }
            Entry::Vacant(e) => {
                e.insert(entry);
            }
        }
    }

    let mut maps = IndexMap::with_capacity(entries.len());
    for (name, entry) in entries {
        let settings = entry.settings();
        if settings.path.as_deref().is_none_or(str::is_empty) {
            return Err(EncodeError::MissingField {
                context: format!("map \"{name}\""),
                field: "path",
            });
        }
        maps.insert(name, settings);
    }
    Ok(maps)
}

/// Merge every `{name: item}` file in `paths` into one map, rejecting a name
/// seen twice.
fn merge_named<T: DeserializeOwned>(
    source: &dyn ProjectSource,
    paths: &[String],
    kind: &'static str,
) -> Result<IndexMap<String, T>> {
    let mut merged = IndexMap::new();
    for path in paths {
        let file = file_name(path);
        let items: IndexMap<String, T> = read_json(source, file)?;
        debug!(file, kind, items = items.len(), "merging definitions");
        for (name, item) in items {
            match merged.entry(name) {
                Entry::Occupied(e) => {
                    return Err(EncodeError::DuplicateName {
                        kind,
                        name: e.key().clone(),
                        file: file.to_string(),
                    });
                }
                Entry::Vacant(e) => {
                    e.insert(item);
                }
            }
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use source::MemorySource;

    fn base() -> MemorySource {
        MemorySource::new().with_json(
            SCENARIO_FILE,
            json!({
                "maps": {"town": "maps/town.json"},
                "scriptPaths": ["scripts/a.json", "scripts/b.json"],
                "dialogSkins": {"default": "tilesets/skin.json"}
            }),
        )
    }

    #[test]
    fn test_scripts_merge_in_file_order() {
        let source = base()
            .with_json("a.json", json!({"first": [], "second": [{"action": "SLOT_SAVE"}]}))
            .with_json("b.json", json!({"third": []}));
        let data = load(&source).unwrap();
        let names: Vec<_> = data.scripts.keys().cloned().collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(data.scripts["second"][0].action, "SLOT_SAVE");
        assert_eq!(data.dialog_skins["default"], "tilesets/skin.json");
        assert!(data.entity_types.is_empty());
    }

    #[test]
    fn test_duplicate_script_names_the_second_file() {
        let source = base()
            .with_json("a.json", json!({"shared": []}))
            .with_json("b.json", json!({"shared": []}));
        assert_eq!(
            load(&source).unwrap_err().to_string(),
            "duplicate scripts name \"shared\" found in b.json"
        );
    }

    #[test]
    fn test_null_script_is_reserved() {
        let source = base()
            .with_json("a.json", json!({"null_script": []}))
            .with_json("b.json", json!({}));
        assert!(matches!(
            load(&source).unwrap_err(),
            EncodeError::ReservedName { .. }
        ));
    }

    #[test]
    fn test_maps_json_is_merged_after_manifest() {
        let source = base()
            .with_json("a.json", json!({}))
            .with_json("b.json", json!({}))
            .with_json(MAPS_FILE, json!({"cave": {"path": "cave.json", "on_tick": "drip"}}));
        let data = load(&source).unwrap();
        let names: Vec<_> = data.maps.keys().cloned().collect();
        assert_eq!(names, vec!["town", "cave"]);
        assert_eq!(data.maps["cave"].on_tick.as_deref(), Some("drip"));

        let clash = base()
            .with_json("a.json", json!({}))
            .with_json("b.json", json!({}))
            .with_json(MAPS_FILE, json!({"town": "other.json"}));
        assert_eq!(
            load(&clash).unwrap_err().to_string(),
            "duplicate map name \"town\" found in both scenario.json and maps.json"
        );
    }

    #[test]
    fn test_map_without_path() {
        let source = MemorySource::new()
            .with_json(SCENARIO_FILE, json!({"maps": {"town": {"on_load": "x"}}}));
        assert_eq!(
            load(&source).unwrap_err().to_string(),
            "map \"town\" is missing required field `path`"
        );
    }
}
