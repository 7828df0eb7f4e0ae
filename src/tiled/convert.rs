use std::collections::BTreeMap;
use std::io::{Read, Seek};
use log::{debug, info, trace};

use crate::res::graphic::{GraphicIndex, GraphicInfo};
use crate::res::map::{Map, TILE_HEIGHT, TILE_WIDTH};
use crate::res::matrix::Matrix;
use crate::res::palette::Palette;
use crate::res::ResResult;
use crate::tiled::model::*;
use crate::tiled::sink::TileSink;


const GROUND_LAYER_ID: u32 = 1;
const OBJECT_LAYER_ID: u32 = 2;


/// Pixel position of a map object in the rotated isometric map.
///
/// `i` is the cell index in the object plane, `map_width` the source map width, the remaining
/// arguments come from the object's graphic record.
pub fn object_coordinate(i: usize, map_width: i32, w: i32, h: i32, off_x: i32, off_y: i32) -> (f64, f64) {
    let (tw, th) = (TILE_WIDTH as f64, TILE_HEIGHT as f64);
    let i = i as i64;
    let map_width = map_width as i64;
    let (row, col) = (i / map_width, i % map_width);

    let offset_x = (off_x as f64 + (w as f64 / 2.0)) / tw * th;
    let offset_y = off_y as f64 + h as f64 - th / 2.0;

    let x = (row + 1) as f64 * th + offset_y + offset_x;
    let y = (map_width - col) as f64 * th + offset_y - offset_x;
    (x, y)
}


/// Converts a game map into a Tiled isometric map, rotated by -90 degrees.
///
/// Both planes are looked up by graphic map id. Ids without a graphic are cleared to 0 in `map`.
/// Every distinct tile graphic is rasterized once and handed to `sink`.
pub fn to_tiled_map<R, S>(map: &mut Map, index: &GraphicIndex, data: &mut R, palette: Option<&Palette>, sink: &mut S) -> ResResult<TiledMap>
where
    R: Read + Seek,
    S: TileSink,
{
    trace!("to_tiled_map");
    let (width, height) = (map.width(), map.height());
    let mut tiled = TiledMap::new(height as u32, width as u32, Orientation::Isometric, RenderOrder::LeftUp);
    tiled.tile_width = TILE_WIDTH;
    tiled.tile_height = TILE_HEIGHT;

    let mut gid = 0;

    let ground_set = build_tileset("ground", &mut gid, &mut map.ground, index, data, palette, sink)?;
    let ground = ground_layer(&map.ground, width, height)?;

    let object_base = gid;
    let object_set = build_tileset("object", &mut gid, &mut map.object, index, data, palette, sink)?;
    let objects = object_layer(&map.object, map.header.width, index, object_base);

    info!("map converted, {} ground tiles, {} object tiles, {} objects",
        ground_set.tile_count, object_set.tile_count, objects.objects.len());

    tiled.next_object_id = objects.objects.len() as u32 + 1;
    tiled.next_layer_id = OBJECT_LAYER_ID + 1;
    tiled.layers = vec![Layer::TileLayer(ground), Layer::ObjectGroup(objects)];
    tiled.tilesets = vec![ground_set, object_set];
    Ok(tiled)
}


/// Collects the distinct tiles of a plane into an image collection tileset.
///
/// The tileset starts right after `gid`, which is advanced past the highest map id seen.
/// A tile's local id is its map id - 1, so its global id is `first_gid + map_id - 1`.
pub fn build_tileset<R, S>(name: &str, gid: &mut u32, tiles: &mut [u16], index: &GraphicIndex, data: &mut R, palette: Option<&Palette>, sink: &mut S) -> ResResult<TileSet>
where
    R: Read + Seek,
    S: TileSink,
{
    *gid += 1;
    let mut tileset = TileSet::new(name, *gid, Grid { orientation: Orientation::Orthogonal, width: 1, height: 1 });

    let mut mapping: BTreeMap<u16, GraphicInfo> = BTreeMap::new();
    let mut missing = 0;

    for t in tiles.iter_mut() {
        if *t == 0 || mapping.contains_key(t) {
            continue;
        }

        let Some(info) = index.by_map_id(*t as i32) else {
            *t = 0;
            missing += 1;
            continue;
        };

        *gid = (*gid).max(*t as u32);

        let graphic = info.load(data)?;
        sink.put(info.map_id, &graphic.rgba(palette)?)?;
        mapping.insert(*t, *info);
    }

    if missing > 0 {
        debug!("{name}: {missing} cells without graphic cleared");
    }

    tileset.tiles = mapping.values()
        .map(|info| Tile {
            id: info.map_id as u32 - 1,
            image: format!("{}.png", info.map_id),
            image_width: info.width.max(0) as u32,
            image_height: info.height.max(0) as u32,
        })
        .collect();
    tileset.tile_count = tileset.tiles.len() as u32;
    tileset.tile_width = TILE_WIDTH;
    tileset.tile_height = TILE_HEIGHT;

    Ok(tileset)
}


fn ground_layer(ground: &[u16], width: usize, height: usize) -> ResResult<TileLayer> {
    let mut layer = TileLayer::new("ground", GROUND_LAYER_ID, height as u32, width as u32);

    let rotated = Matrix::new(ground.to_vec(), width, height)?.rotate();
    layer.data = rotated.data().iter().map(|&t| t as u32).collect();
    Ok(layer)
}


fn object_layer(objects: &[u16], map_width: i32, index: &GraphicIndex, first_gid: u32) -> ObjectGroup {
    let mut layer = ObjectGroup::new("object", OBJECT_LAYER_ID, DrawOrder::TopDown);

    for (i, &t) in objects.iter().enumerate() {
        if t == 0 {
            continue;
        }
        let Some(info) = index.by_map_id(t as i32) else {
            continue;
        };

        let (x, y) = object_coordinate(i, map_width, info.width, info.height, info.offset_x, info.offset_y);
        layer.objects.push(Object {
            id: layer.objects.len() as u32 + 1,
            gid: t as u32 + first_gid,
            name: t.to_string(),
            class: String::new(),
            x,
            y,
            width: info.width as f64,
            height: info.height as f64,
            rotation: 0.0,
            visible: true,
        });
    }

    layer
}
