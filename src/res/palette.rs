use std::fs;
use std::path::Path;
use image::Rgba;
use log::trace;
use thiserror::Error;

use crate::res::error::{ResError, ResResult};


/// size of a `*.cgp` palette file, 224 colors of 3 bytes
pub const FIXED_PALETTE_FILE_SIZE: usize = 672;
const FIXED_PALETTE_COLORS: usize = FIXED_PALETTE_FILE_SIZE / 3;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// the engine reserves the first and last 16 entries of every fixed palette
const SYSTEM_COLORS_HEAD: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00), (0x80, 0x00, 0x00), (0x00, 0x80, 0x00), (0x80, 0x80, 0x00),
    (0x00, 0x00, 0x80), (0x80, 0x00, 0x80), (0x00, 0x80, 0x80), (0xc0, 0xc0, 0xc0),
    (0xc0, 0xdc, 0xc0), (0xa6, 0xca, 0xf0), (0xde, 0x00, 0x00), (0xff, 0x5f, 0x00),
    (0xff, 0xff, 0xa0), (0x00, 0x5f, 0xd2), (0x50, 0xd2, 0xff), (0x28, 0xe1, 0x28),
];

const SYSTEM_COLORS_TAIL: [(u8, u8, u8); 16] = [
    (0xf5, 0xc3, 0x96), (0x1e, 0xa0, 0x5f), (0xc3, 0x7d, 0x46), (0x9b, 0x55, 0x1e),
    (0x46, 0x41, 0x37), (0x28, 0x23, 0x19), (0xff, 0xfb, 0xf0), (0x3a, 0x6e, 0xa5),
    (0x80, 0x80, 0x80), (0xff, 0x00, 0x00), (0x00, 0xff, 0x00), (0xff, 0xff, 0x00),
    (0x00, 0x00, 0xff), (0xff, 0x80, 0xff), (0x00, 0xff, 0xff), (0xff, 0xff, 0xff),
];


/// Palette is an ordered table of at most 256 colors addressed by pixel index.
/// Black (0,0,0) is stored as the fully transparent sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    colors: Vec<Rgba<u8>>,
}


/// raw palette bytes ended inside a color triple; the complete colors are kept
#[derive(Debug, Error)]
#[error("palette data ends with {remainder} byte(s) of a partial color")]
pub struct TruncatedPalette {
    pub decoded: Palette,
    pub remainder: usize,
}

impl From<TruncatedPalette> for ResError {
    fn from(_: TruncatedPalette) -> Self {
        ResError::UnexpectedEof
    }
}


#[inline]
fn color(r: u8, g: u8, b: u8) -> Rgba<u8> {
    if (r, g, b) == (0, 0, 0) {
        TRANSPARENT
    } else {
        Rgba([r, g, b, 255])
    }
}


impl Palette {
    /// Builds the full 256 color table from the content of a fixed palette file.
    pub fn from_fixed_file(bytes: &[u8]) -> ResResult<Self> {
        if bytes.len() != FIXED_PALETTE_FILE_SIZE {
            return Err(ResError::UnexpectedEof);
        }

        let mut colors = Vec::with_capacity(256);
        colors.extend(SYSTEM_COLORS_HEAD.iter().map(|&(r, g, b)| color(r, g, b)));
        // stored as blue, green, red
        colors.extend(bytes.chunks_exact(3).map(|c| color(c[2], c[1], c[0])));
        colors.extend(SYSTEM_COLORS_TAIL.iter().map(|&(r, g, b)| color(r, g, b)));

        debug_assert_eq!(colors.len(), 16 + FIXED_PALETTE_COLORS + 16);
        Ok(Self { colors })
    }

    /// Tries to read a fixed palette file
    pub fn read_fixed(path: &Path) -> ResResult<Self> {
        trace!("Palette::read_fixed");
        Self::from_fixed_file(&fs::read(path)?)
    }

    /// Decodes colors embedded in a graphic payload, 3 bytes per color in blue, green, red order.
    pub fn from_raw(bytes: &[u8]) -> Result<Self, TruncatedPalette> {
        let chunks = bytes.chunks_exact(3);
        let remainder = chunks.remainder().len();
        let colors = chunks.map(|c| color(c[2], c[1], c[0])).collect();

        if remainder != 0 {
            return Err(TruncatedPalette { decoded: Self { colors }, remainder });
        }
        Ok(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn get(&self, index: u8) -> Option<Rgba<u8>> {
        self.colors.get(index as usize).copied()
    }

    pub fn colors(&self) -> &[Rgba<u8>] {
        &self.colors
    }
}
