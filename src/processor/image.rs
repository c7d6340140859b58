//! Image quantizer: one 8 bit index per pixel, laid out tile after tile,
//! plus the palette those indices point into.

use tracing::{debug, info};

use super::binary::{RecordWriter, SCREEN_ENDIAN};
use super::project::{ContentKind, Project};
use super::properties::rgba_to_565;
use crate::error::{EncodeError, Result};
use crate::parser::source::{DecodedImage, file_name};

/// The palette index is a single byte.
pub const MAX_COLORS: usize = 256;

/// How the owning tileset cuts the image into tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    pub pixels: Vec<u8>,
    /// RGB565 colors in first-seen order.
    pub palette: Vec<u16>,
}

/// Map every pixel to a palette index and move it to where its tile sits
/// when the tiles are laid out as one long strip.
pub fn quantize(image: &DecodedImage, layout: TileLayout, file: &str) -> Result<Quantized> {
    let TileLayout {
        tile_width,
        tile_height,
        columns,
    } = layout;
    if tile_width == 0 || tile_height == 0 {
        return Err(EncodeError::malformed(
            format!("image \"{file}\""),
            "tile width and height must be greater than zero",
        ));
    }
    let channels = image.channels as usize;
    if channels < 3 {
        return Err(EncodeError::ImageDecode {
            file: file.to_string(),
            reason: format!("expected 3 or 4 channels, got {channels}"),
        });
    }
    let (width, height) = (image.width as usize, image.height as usize);
    let pixel_count = width * height;
    if image.pixels.len() < pixel_count * channels {
        return Err(EncodeError::ImageDecode {
            file: file.to_string(),
            reason: "pixel buffer is shorter than width * height".into(),
        });
    }

    let (tw, th, columns) = (tile_width as usize, tile_height as usize, columns as usize);
    let per_tile = tw * th;
    let mut pixels = vec![0u8; pixel_count];
    let mut palette: Vec<u16> = Vec::new();
    for i in 0..pixel_count {
        let px = &image.pixels[i * channels..(i + 1) * channels];
        let alpha = if channels == 4 { px[3] } else { u8::MAX };
        let color = rgba_to_565(px[0], px[1], px[2], alpha);
        let index = match palette.iter().position(|c| *c == color) {
            Some(index) => index,
            None => {
                palette.push(color);
                palette.len() - 1
            }
        };
        if index >= MAX_COLORS {
            return Err(EncodeError::TooManyColors {
                image: file.to_string(),
            });
        }

        let (x, y) = (i % width, i / width);
        let (column, row) = (x / tw, y / th);
        let target = (x % tw) + (y % th) * tw + (row * columns + column) * per_tile;
        let slot = pixels.get_mut(target).ok_or_else(|| {
            EncodeError::malformed(
                format!("image \"{file}\""),
                format!("a {width}x{height} image does not fit {columns} columns of {tw}x{th} tiles"),
            )
        })?;
        *slot = index as u8;
    }
    Ok(Quantized { pixels, palette })
}

/// A 256 color palette stores its count as 0.
pub fn encode_palette(name: &str, colors: &[u16]) -> Vec<u8> {
    let mut w = RecordWriter::new(32 + 2 + colors.len() * 2);
    w.chars(name, 32).u8(colors.len() as u8).skip(1);
    for color in colors {
        w.u16(*color, SCREEN_ENDIAN);
    }
    w.finish()
}

/// Decode, quantize and store an image the first time it is referenced.
/// Returns the image index; the palette gets the matching palette index.
pub fn load_image(path: &str, layout: TileLayout, project: &mut Project) -> Result<u16> {
    let file = file_name(path);
    if let Some(index) = project.images.get(file) {
        return Ok(*index);
    }
    let image_index = project.tables.reserve(ContentKind::Images, file)?;
    let palette_index = project.tables.reserve(ContentKind::ImageColorPalettes, file)?;
    project.images.insert(file.to_string(), image_index);

    let decoded = project.source.decode_image(file)?;
    let Quantized { mut pixels, palette } = quantize(&decoded, layout, file)?;
    pixels.resize(pixels.len().div_ceil(4) * 4, 0);
    info!(image = file, colors = palette.len(), width = decoded.width, height = decoded.height, "image quantized");
    debug!(image_index, palette_index, "image stored");

    project
        .tables
        .fill(ContentKind::ImageColorPalettes, palette_index, encode_palette(file, &palette))?;
    project.tables.fill(ContentKind::Images, image_index, pixels)?;
    Ok(image_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(width: u32, height: u32, pixels: Vec<[u8; 4]>) -> DecodedImage {
        DecodedImage {
            width,
            height,
            channels: 4,
            pixels: pixels.into_iter().flatten().collect(),
        }
    }

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const CLEAR: [u8; 4] = [9, 9, 9, 0];

    #[test]
    fn test_pixels_are_regrouped_by_tile() {
        // Two 2x1 tiles side by side: [R B | B R]
        let image = rgba(4, 1, vec![RED, BLUE, BLUE, RED]);
        let layout = TileLayout {
            tile_width: 2,
            tile_height: 1,
            columns: 2,
        };
        let q = quantize(&image, layout, "t.png").unwrap();
        assert_eq!(q.palette, vec![0xF800, 0x001F]);
        assert_eq!(q.pixels, vec![0, 1, 1, 0]);

        // A 2x2 image of 1x1 tiles in 2 columns stays in raster order.
        let image = rgba(2, 2, vec![RED, BLUE, CLEAR, RED]);
        let layout = TileLayout {
            tile_width: 1,
            tile_height: 1,
            columns: 2,
        };
        let q = quantize(&image, layout, "t.png").unwrap();
        assert_eq!(q.pixels, vec![0, 1, 2, 0]);
        assert_eq!(q.palette[2], 32);
    }

    #[test]
    fn test_tile_rows_become_contiguous() {
        // One 2x2 tile: rows are stacked inside the tile's block.
        let image = rgba(2, 2, vec![RED, RED, BLUE, BLUE]);
        let layout = TileLayout {
            tile_width: 2,
            tile_height: 2,
            columns: 1,
        };
        let q = quantize(&image, layout, "t.png").unwrap();
        assert_eq!(q.pixels, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_too_many_colors() {
        let pixels = (0..257u32)
            .map(|i| [(i % 32) as u8 * 8, (i / 32) as u8 * 4, 0, 255])
            .collect();
        let image = rgba(257, 1, pixels);
        let layout = TileLayout {
            tile_width: 257,
            tile_height: 1,
            columns: 1,
        };
        assert_eq!(
            quantize(&image, layout, "busy.png").unwrap_err().to_string(),
            "\"busy.png\" has too many colors; max supported colors are 256"
        );
    }

    #[test]
    fn test_palette_is_big_endian() {
        let bytes = encode_palette("tiles.png", &[0xF800, 0x001F]);
        assert_eq!(bytes.len(), 40);
        assert_eq!(bytes[32], 2);
        assert_eq!(&bytes[34..38], &[0xF8, 0x00, 0x00, 0x1F]);
        let full = encode_palette("full.png", &[0; 256]);
        assert_eq!(full[32], 0);
    }
}
