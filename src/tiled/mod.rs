pub mod model;
pub mod convert;
pub mod sink;

pub use model::TiledMap;
pub use convert::{object_coordinate, to_tiled_map};
pub use sink::{DirSink, DiscardSink, TileSink};
