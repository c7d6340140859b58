//! Where project files come from.
//!
//! Files are addressed by base name only (`town.json`, not
//! `maps/town.json`): every path inside a project is reduced to its last
//! segment before lookup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{EncodeError, Result};

/// Raw pixels straight out of the decoder, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    fn from_dynamic(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        if image.color().has_alpha() {
            DecodedImage {
                width,
                height,
                channels: 4,
                pixels: image.to_rgba8().into_raw(),
            }
        } else {
            DecodedImage {
                width,
                height,
                channels: 3,
                pixels: image.to_rgb8().into_raw(),
            }
        }
    }
}

pub trait ProjectSource {
    /// Raw bytes of the file called `name`.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    fn contains(&self, name: &str) -> bool;

    /// Decode a png or gif into pixels. Only the first gif frame is used.
    fn decode_image(&self, name: &str) -> Result<DecodedImage> {
        let format = match extension(name).as_deref() {
            Some("png") => ImageFormat::Png,
            Some("gif") => ImageFormat::Gif,
            _ => {
                return Err(EncodeError::UnsupportedImage {
                    file: name.to_string(),
                });
            }
        };
        let bytes = self.read(name)?;
        let image = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
            EncodeError::ImageDecode {
                file: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(DecodedImage::from_dynamic(image))
    }
}

/// Last path segment of a project-relative path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Read and deserialize a JSON file by name.
pub fn read_json<T: DeserializeOwned>(source: &dyn ProjectSource, name: &str) -> Result<T> {
    let bytes = source.read(name)?;
    serde_json::from_slice(&bytes).map_err(|source| EncodeError::Json {
        file: name.to_string(),
        source,
    })
}

/// Like [`read_json`], but a missing file is `None`.
pub fn read_optional_json<T: DeserializeOwned>(
    source: &dyn ProjectSource,
    name: &str,
) -> Result<Option<T>> {
    if !source.contains(name) {
        return Ok(None);
    }
    read_json(source, name).map(Some)
}

/// A project folder on disk, scanned once up front.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    files: HashMap<String, Vec<PathBuf>>,
}

impl DirectorySource {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut files: HashMap<String, Vec<PathBuf>> = HashMap::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|source| EncodeError::Io {
                path: dir.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| EncodeError::Io {
                    path: dir.clone(),
                    source,
                })?;
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    trace!(file = %path.display(), "indexed");
                    files.entry(name.to_string()).or_default().push(path);
                }
            }
        }
        for paths in files.values_mut() {
            paths.sort();
        }
        debug!(root = %root.display(), files = files.len(), "scanned project folder");
        Ok(DirectorySource { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, name: &str) -> Result<&Path> {
        match self.files.get(name).map(Vec::as_slice) {
            None | Some([]) => Err(EncodeError::MissingFile {
                name: name.to_string(),
            }),
            Some([only]) => Ok(only),
            Some(many) => Err(EncodeError::AmbiguousFile {
                name: name.to_string(),
                paths: many.to_vec(),
            }),
        }
    }
}

impl ProjectSource for DirectorySource {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.locate(name)?;
        fs::read(path).map_err(|source| EncodeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// In-memory project, used by tests and by callers that already hold the
/// files.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    images: HashMap<String, DecodedImage>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.to_string(), bytes.into());
        self
    }

    pub fn with_json(self, name: &str, value: serde_json::Value) -> Self {
        let bytes = value.to_string().into_bytes();
        self.with_file(name, bytes)
    }

    /// Register already-decoded pixels under an image file name.
    pub fn with_image(mut self, name: &str, image: DecodedImage) -> Self {
        self.images.insert(name.to_string(), image);
        self
    }
}

impl ProjectSource for MemorySource {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| EncodeError::MissingFile {
                name: name.to_string(),
            })
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name) || self.images.contains_key(name)
    }

    fn decode_image(&self, name: &str) -> Result<DecodedImage> {
        match self.images.get(name) {
            Some(image) => Ok(image.clone()),
            None => {
                let format = extension(name);
                if !matches!(format.as_deref(), Some("png" | "gif")) {
                    return Err(EncodeError::UnsupportedImage {
                        file: name.to_string(),
                    });
                }
                let bytes = self.read(name)?;
                let image = image::load_from_memory(&bytes).map_err(|e| EncodeError::ImageDecode {
                    file: name.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(DecodedImage::from_dynamic(image))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(file_name("../maps/town.json"), "town.json");
        assert_eq!(file_name("town.json"), "town.json");
        assert_eq!(file_name("a\\b\\c.png"), "c.png");
    }

    #[test]
    fn test_memory_source_reads_json() {
        let source = MemorySource::new().with_json("scenario.json", json!({"maps": {}}));
        let value: serde_json::Value = read_json(&source, "scenario.json").unwrap();
        assert_eq!(value, json!({"maps": {}}));
        let missing: Option<serde_json::Value> = read_optional_json(&source, "maps.json").unwrap();
        assert!(missing.is_none());
        assert_eq!(
            source.read("nope.json").unwrap_err().to_string(),
            "file `nope.json` could not be found in the project folder"
        );
    }

    #[test]
    fn test_bad_json_names_the_file() {
        let source = MemorySource::new().with_file("broken.json", "{ not json");
        let err = read_json::<serde_json::Value>(&source, "broken.json").unwrap_err();
        assert!(err.to_string().starts_with("parsing `broken.json`"));
    }

    #[test]
    fn test_unsupported_image_type() {
        let source = MemorySource::new().with_file("tiles.bmp", vec![0u8; 4]);
        assert_eq!(
            source.decode_image("tiles.bmp").unwrap_err().to_string(),
            "unsupported image type in file \"tiles.bmp\"; supported types are: png, gif"
        );
    }

    #[test]
    fn test_directory_source_indexes_by_base_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("maps")).unwrap();
        fs::create_dir_all(dir.path().join("old")).unwrap();
        fs::write(dir.path().join("scenario.json"), "{}").unwrap();
        fs::write(dir.path().join("maps/town.json"), "{\"a\":1}").unwrap();
        fs::write(dir.path().join("maps/dup.json"), "1").unwrap();
        fs::write(dir.path().join("old/dup.json"), "2").unwrap();

        let source = DirectorySource::open(dir.path()).unwrap();
        assert!(source.contains("town.json"));
        assert_eq!(source.read("town.json").unwrap(), b"{\"a\":1}".to_vec());
        let err = source.read("dup.json").unwrap_err().to_string();
        assert!(err.starts_with("file name `dup.json` is ambiguous"));
    }

    #[test]
    fn test_png_round_trips_through_decoder() {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_raw(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 0]).unwrap();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let source = MemorySource::new().with_file("tiles.png", png);
        let decoded = source.decode_image("tiles.png").unwrap();
        assert_eq!((decoded.width, decoded.height, decoded.channels), (2, 1, 4));
        assert_eq!(&decoded.pixels[0..4], &[255, 0, 0, 255]);
    }
}
