// Tile Data
//
// Interface types for the external tile extractor (which decodes source
// images) and the per-view palette encoding the engine expects.

use std::collections::BTreeSet;

use log::warn;
use serde::Deserialize;

use crate::content_compiler::colours::ColourAttr;
use crate::content_compiler::error::CompilerError;

pub const TILE_SIZE: usize = 8;

/// An 8x8 tile as colour-register indices, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePixels(pub [u8; 64]);

impl TilePixels {
    /// Parse 64 hex digits, one register index per pixel.
    pub fn from_hex(text: &str) -> Result<Self, CompilerError> {
        let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() != TILE_SIZE * TILE_SIZE {
            return Err(CompilerError::GraphicsError(format!(
                "tile '{}' has {} pixels, expected 64",
                text,
                digits.len()
            )));
        }
        let mut pixels = [0u8; 64];
        for (i, digit) in digits.iter().enumerate() {
            pixels[i] = digit.to_digit(16).ok_or_else(|| {
                CompilerError::GraphicsError(format!("invalid pixel '{}' in tile '{}'", digit, text))
            })? as u8;
        }
        Ok(TilePixels(pixels))
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.0[y * TILE_SIZE..(y + 1) * TILE_SIZE]
    }
}

/// Derive the colour attribute of a tile.
///
/// A single-colour row becomes `(0 << 4) | c`; a two-colour row `(a << 4) | b`
/// with `a < b`. Rows with more colours cannot be shown by the hardware; the
/// two lowest are kept.
pub fn tile_colours(pixels: &TilePixels) -> ColourAttr {
    let mut attr = [0u8; 8];
    for (y, byte) in attr.iter_mut().enumerate() {
        let colours: BTreeSet<u8> = pixels.row(y).iter().copied().collect();
        let mut sorted = colours.iter().copied();
        *byte = match colours.len() {
            0 => 0,
            1 => sorted.next().unwrap_or(0),
            n => {
                if n > 2 {
                    warn!("Tile row {} uses {} colours; keeping the lowest two", y, n);
                }
                let lo = sorted.next().unwrap_or(0);
                let hi = sorted.next().unwrap_or(0);
                (lo << 4) | hi
            }
        };
    }
    ColourAttr(attr)
}

/// Pattern bytes of a tile drawn with `attr`: bit 7 is the leftmost pixel,
/// 0 where the pixel has the row's low-nibble colour and 1 elsewhere.
pub fn pattern_for(pixels: &TilePixels, attr: &ColourAttr) -> [u8; 8] {
    let mut pattern = [0u8; 8];
    for (y, byte) in pattern.iter_mut().enumerate() {
        let background = attr.0[y] & 0x0f;
        for (x, &pixel) in pixels.row(y).iter().enumerate() {
            if pixel != background {
                *byte |= 0x80 >> x;
            }
        }
    }
    pattern
}

/// Pattern bytes and colour attribute of one tile.
pub fn split_tile(pixels: &TilePixels) -> ([u8; 8], ColourAttr) {
    let attr = tile_colours(pixels);
    (pattern_for(pixels, &attr), attr)
}

/// Every distinct tile pattern of a chapter; a tile id indexes this list.
#[derive(Debug, Clone, Default)]
pub struct TileRegistry {
    pub tiles: Vec<TilePixels>,
}

impl TileRegistry {
    pub fn get(&self, id: u16) -> Result<&TilePixels, CompilerError> {
        self.tiles
            .get(id as usize)
            .ok_or_else(|| CompilerError::GraphicsError(format!("unknown tile id {}", id)))
    }
}

/// One location view as tile ids, row-major.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TileGrid {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<u16>,
}

impl TileGrid {
    pub fn used_tiles(&self) -> BTreeSet<u16> {
        self.cells.iter().copied().collect()
    }

    pub fn check_view(&self, source: &str, width: usize, height: usize) -> Result<(), CompilerError> {
        if self.width != width || self.height != height || self.cells.len() != width * height {
            return Err(CompilerError::GraphicsError(format!(
                "graphics '{}' is {}x{} with {} cells; views must be {}x{}",
                source,
                self.width,
                self.height,
                self.cells.len(),
                width,
                height
            )));
        }
        Ok(())
    }
}

/// Maps the tiles one view uses onto a dense index range.
///
/// Stored as runs of consecutive tile numbers so the engine can rebuild the
/// mapping from a few bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    runs: Vec<(u16, u16)>, // [start, end)
}

impl Palette {
    pub fn from_tiles(tiles: &BTreeSet<u16>) -> Palette {
        let mut runs: Vec<(u16, u16)> = Vec::new();
        for &tile in tiles {
            match runs.last_mut() {
                Some((_, end)) if *end == tile => *end += 1,
                _ => runs.push((tile, tile + 1)),
            }
        }
        Palette { runs }
    }

    /// Palette index of a tile number.
    pub fn index_of(&self, tile: u16) -> Option<u8> {
        let mut counter = 0usize;
        for &(start, end) in &self.runs {
            if (start..end).contains(&tile) {
                return u8::try_from(counter + (tile - start) as usize).ok();
            }
            counter += (end - start) as usize;
        }
        None
    }

    /// `(skipped, length)` pairs closed by 255; gaps over 254 are emitted as
    /// `(254, 0)` steps.
    pub fn encode(&self) -> Vec<u8> {
        let mut coded = Vec::new();
        let mut next = 0usize;
        for &(start, end) in &self.runs {
            let mut skipped = start as usize - next;
            while skipped > 254 {
                coded.extend_from_slice(&[254, 0]);
                skipped -= 254;
            }
            coded.extend_from_slice(&[skipped as u8, (end - start) as u8]);
            next = end as usize;
        }
        coded.push(255);
        coded
    }
}
