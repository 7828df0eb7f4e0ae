use serde::{Deserialize, Serialize};


pub const TILED_VERSION: &str = "1.10";
pub const FORMAT_VERSION: &str = "1.10";


#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Orthogonal,
    Isometric,
    Staggered,
    Hexagonal,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RenderOrder {
    RightDown,
    RightUp,
    LeftDown,
    LeftUp,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DrawOrder {
    TopDown,
    Index,
}


/// TiledMap is the root of a Tiled JSON map document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TiledMap {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(rename = "tiledversion")]
    pub tiled_version: String,
    pub orientation: Orientation,
    #[serde(rename = "renderorder")]
    pub render_order: RenderOrder,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "tilewidth")]
    pub tile_width: u32,
    #[serde(rename = "tileheight")]
    pub tile_height: u32,
    pub infinite: bool,
    #[serde(rename = "nextlayerid")]
    pub next_layer_id: u32,
    #[serde(rename = "nextobjectid")]
    pub next_object_id: u32,
    pub layers: Vec<Layer>,
    pub tilesets: Vec<TileSet>,
}

impl TiledMap {
    pub fn new(width: u32, height: u32, orientation: Orientation, render_order: RenderOrder) -> Self {
        Self {
            kind: "map".to_string(),
            version: FORMAT_VERSION.to_string(),
            tiled_version: TILED_VERSION.to_string(),
            orientation,
            render_order,
            width,
            height,
            tile_width: 0,
            tile_height: 0,
            infinite: false,
            next_layer_id: 1,
            next_object_id: 1,
            layers: Vec::new(),
            tilesets: Vec::new(),
        }
    }
}


#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    TileLayer(TileLayer),
    ObjectGroup(ObjectGroup),
}

impl Layer {
    pub fn id(&self) -> u32 {
        match self {
            Layer::TileLayer(l) => l.id,
            Layer::ObjectGroup(l) => l.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Layer::TileLayer(l) => &l.name,
            Layer::ObjectGroup(l) => &l.name,
        }
    }
}


#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
    pub opacity: f64,
    pub visible: bool,
    /// global tile ids, row by row, 0 is an empty cell
    pub data: Vec<u32>,
}

impl TileLayer {
    pub fn new(name: &str, id: u32, width: u32, height: u32) -> Self {
        Self { id, name: name.to_string(), width, height, x: 0, y: 0, opacity: 1.0, visible: true, data: Vec::new() }
    }
}


#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub id: u32,
    pub name: String,
    #[serde(rename = "draworder")]
    pub draw_order: DrawOrder,
    pub x: i32,
    pub y: i32,
    pub opacity: f64,
    pub visible: bool,
    pub objects: Vec<Object>,
}

impl ObjectGroup {
    pub fn new(name: &str, id: u32, draw_order: DrawOrder) -> Self {
        Self { id, name: name.to_string(), draw_order, x: 0, y: 0, opacity: 1.0, visible: true, objects: Vec::new() }
    }
}


#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Object {
    pub id: u32,
    pub gid: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub class: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub visible: bool,
}


#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub orientation: Orientation,
    pub width: u32,
    pub height: u32,
}


/// TileSet is an image collection, each tile carries its own image file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TileSet {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(rename = "tiledversion")]
    pub tiled_version: String,
    pub name: String,
    #[serde(rename = "firstgid")]
    pub first_gid: u32,
    pub columns: u32,
    pub grid: Grid,
    #[serde(rename = "tilewidth")]
    pub tile_width: u32,
    #[serde(rename = "tileheight")]
    pub tile_height: u32,
    #[serde(rename = "tilecount")]
    pub tile_count: u32,
    pub tiles: Vec<Tile>,
}

impl TileSet {
    pub fn new(name: &str, first_gid: u32, grid: Grid) -> Self {
        Self {
            kind: "tileset".to_string(),
            version: FORMAT_VERSION.to_string(),
            tiled_version: TILED_VERSION.to_string(),
            name: name.to_string(),
            first_gid,
            columns: 0,
            grid,
            tile_width: 0,
            tile_height: 0,
            tile_count: 0,
            tiles: Vec::new(),
        }
    }
}


#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub id: u32,
    pub image: String,
    #[serde(rename = "imagewidth")]
    pub image_width: u32,
    #[serde(rename = "imageheight")]
    pub image_height: u32,
}
