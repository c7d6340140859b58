use std::fs;
use std::path::Path;

use serde_json::json;

use mage_encoder::compile;
use mage_encoder::parser::load;
use mage_encoder::parser::source::DirectorySource;
use mage_encoder::processor::project::ContentKind;
use mage_encoder::writer::bundle::BundleIndex;

fn write_json(root: &Path, path: &str, value: serde_json::Value) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, value.to_string()).unwrap();
}

fn scaffold(root: &Path) {
    write_json(
        root,
        "scenario.json",
        json!({
            "maps": {"square": "maps/square.json"},
            "scriptPaths": ["scripts/a.json", "scripts/more/b.json"],
            "dialogPaths": [],
            "serialDialogPaths": []
        }),
    );
    write_json(root, "scripts/a.json", json!({"wait": [{"action": "BLOCKING_DELAY", "duration": 100}]}));
    write_json(root, "scripts/more/b.json", json!({"idle": []}));
    write_json(
        root,
        "maps/square.json",
        json!({
            "width": 2, "height": 1, "tilewidth": 8, "tileheight": 8,
            "layers": [{"type": "tilelayer", "name": "ground", "data": [1, 0]}],
            "tilesets": [{"firstgid": 1, "source": "../tilesets/tiles.json"}],
            "properties": [{"name": "on_tick", "type": "string", "value": "wait"}]
        }),
    );
    write_json(
        root,
        "tilesets/tiles.json",
        json!({
            "tilewidth": 8, "tileheight": 8, "tilecount": 2, "columns": 2,
            "image": "tiles.png", "imagewidth": 16, "imageheight": 8
        }),
    );
    image::RgbImage::from_pixel(16, 8, image::Rgb([200, 40, 40]))
        .save(root.join("tilesets/tiles.png"))
        .unwrap();
}

#[test]
fn loads_definitions_from_nested_folders() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());
    let source = DirectorySource::open(dir.path()).unwrap();
    let data = load(&source).unwrap();

    let scripts: Vec<_> = data.scripts.keys().cloned().collect();
    assert_eq!(scripts, vec!["wait", "idle"]);
    assert_eq!(data.maps["square"].path.as_deref(), Some("maps/square.json"));
    assert!(data.entity_types.is_empty());
    assert!(data.portraits.is_empty());
}

#[test]
fn compiles_a_project_folder() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());
    let source = DirectorySource::open(dir.path()).unwrap();
    let bytes = compile(&source).unwrap();
    let index = BundleIndex::parse(&bytes).unwrap();

    assert_eq!(index.entries(ContentKind::Maps).len(), 1);
    // null_script and the map's on_tick
    assert_eq!(index.entries(ContentKind::Scripts).len(), 2);
    let palette = index.record(&bytes, ContentKind::ImageColorPalettes, 0).unwrap();
    assert_eq!(&palette[..9], b"tiles.png");
    assert_eq!(palette[32], 1);
}

#[test]
fn duplicate_file_names_fail_only_when_read() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());
    write_json(dir.path(), "unused/notes/a.json", json!({}));
    write_json(dir.path(), "copies/README.json", json!({}));
    write_json(dir.path(), "other/README.json", json!({}));

    let source = DirectorySource::open(dir.path()).unwrap();
    let message = load(&source).unwrap_err().to_string();
    assert!(message.starts_with("file name `a.json` is ambiguous"), "{message}");

    fs::remove_file(dir.path().join("unused/notes/a.json")).unwrap();
    let source = DirectorySource::open(dir.path()).unwrap();
    assert!(load(&source).is_ok());
}

#[test]
fn missing_script_file_is_named() {
    let dir = tempfile::tempdir().unwrap();
    scaffold(dir.path());
    fs::remove_file(dir.path().join("scripts/more/b.json")).unwrap();
    let source = DirectorySource::open(dir.path()).unwrap();
    assert_eq!(
        load(&source).unwrap_err().to_string(),
        "file `b.json` could not be found in the project folder"
    );
}
