pub mod reader;
pub mod error;
pub mod codec;
pub mod palette;
pub mod index;
pub mod graphic;
pub mod anime;
pub mod map;
pub mod matrix;

pub use error::{ResError, ResResult};
pub use palette::Palette;
pub use index::{IndexRecord, ResourceIndex, ResourceSet};
pub use graphic::{Graphic, GraphicHeader, GraphicIndex, GraphicInfo, GraphicSet, IndexedImage};
pub use anime::{resolve_anime_palette, Anime, AnimeHeader, AnimeInfo, AnimeIndex, AnimeSet, Animation, AnimationFrame};
pub use map::{Map, MapHeader, TILE_HEIGHT, TILE_WIDTH};
pub use matrix::Matrix;
