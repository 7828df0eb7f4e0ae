use std::io;
use thiserror::Error;

use crate::res::codec::CodecError;
use crate::res::graphic::GraphicHeader;


pub type ResResult<T> = Result<T, ResError>;


/// Failures while reading, decoding or rendering game resources.
/// Context variants (`Graphic`, `Anime`) wrap the original cause with the identity of the record.
#[derive(Debug, Error)]
pub enum ResError {
    #[error("invalid magic {found:02x?}")]
    InvalidMagic { found: Vec<u8> },

    #[error("decode failed: {0}")]
    DecodeFailed(#[from] CodecError),

    #[error("empty palette")]
    EmptyPalette,

    #[error("render failed: pixel {pixel} at index {index} exceeds palette length {palette_len}")]
    RenderFailed { index: usize, pixel: u8, palette_len: usize },

    #[error("render failed: {actual} pixels decoded, {width}x{height} expected")]
    SizeMismatch { width: u32, height: u32, actual: usize },

    #[error("embedded palette length {palette_len} exceeds decoded length {decoded_len}")]
    PaletteOverrun { palette_len: usize, decoded_len: usize },

    #[error("invalid embedded palette length {0}")]
    InvalidPaletteLength(i32),

    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("palette not found for anime {0}")]
    PaletteNotFound(i32),

    #[error("graphic {0} is missing from the index")]
    MissingGraphic(i32),

    #[error("invalid dimensions: {len} values for {width}x{height}")]
    InvalidDimensions { width: usize, height: usize, len: usize },

    #[error("io error: {0}")]
    Io(io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("graphic {id} at {offset:#x} (header {header:?}): {source}")]
    Graphic { id: i32, offset: i32, header: Option<GraphicHeader>, source: Box<ResError> },

    #[error("anime {id} at {offset:#x}: {source}")]
    Anime { id: i32, offset: i32, source: Box<ResError> },
}


impl From<io::Error> for ResError {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Io(value),
        }
    }
}


impl ResError {
    /// innermost cause, with all context wrappers removed
    pub fn root(&self) -> &ResError {
        match self {
            Self::Graphic { source, .. } | Self::Anime { source, .. } => source.root(),
            other => other,
        }
    }

    /// Bulk dumps log these and move on to the next item; anything else aborts the dump.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self.root(),
            Self::InvalidMagic { .. }
                | Self::DecodeFailed(_)
                | Self::EmptyPalette
                | Self::RenderFailed { .. }
                | Self::SizeMismatch { .. }
                | Self::PaletteOverrun { .. }
                | Self::InvalidPaletteLength(_)
                | Self::MissingGraphic(_)
                | Self::PaletteNotFound(_)
        )
    }
}
