use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use log::{debug, trace};

use crate::res::error::{ResError, ResResult};
use crate::res::reader::*;


pub const MAP_HEADER_SIZE: usize = 20;
pub const MAP_MAGIC: &[u8; 3] = b"MAP";

/// engine tile size in pixels
pub const TILE_WIDTH: u32 = 64;
pub const TILE_HEIGHT: u32 = 47;


#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MapHeader {
    pub magic: [u8; 12],
    pub width: i32,
    pub height: i32,
}

impl MapHeader {
    pub fn read<R: Read>(reader: &mut R) -> ResResult<Self> {
        let header = MapHeader {
            magic: res_read_bytes::<_, 12>(reader)?,
            width: res_read_i32(reader)?,
            height: res_read_i32(reader)?,
        };

        if &header.magic[..3] != MAP_MAGIC {
            return Err(ResError::InvalidMagic { found: header.magic.to_vec() });
        }
        if header.width < 0 || header.height < 0 {
            return Err(ResError::InvalidDimensions {
                width: header.width.max(0) as usize,
                height: header.height.max(0) as usize,
                len: 0,
            });
        }
        Ok(header)
    }
}


/// Map holds the three cell planes of a `map/*.dat` file, row-major, `width` cells per row.
/// Ground cells are graphic map ids of floor tiles, object cells map ids of placed graphics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    pub header: MapHeader,
    pub ground: Vec<u16>,
    pub object: Vec<u16>,
    pub meta: Vec<u16>,
}


impl Map {
    pub fn read(path: &Path) -> ResResult<Self> {
        trace!("Map::read");
        let f = File::open(path)?;
        Self::from_reader(&mut BufReader::new(f))
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> ResResult<Self> {
        let header = MapHeader::read(reader)?;
        let cells = header.width as u64 * header.height as u64;

        // the ground plane bounds the cell count by the bytes in the file
        let ground = res_read_vec(reader, cells * 2)?;
        let map = Map {
            header,
            ground: to_cells(&ground),
            object: read_plane(reader, ground.len())?,
            meta: read_plane(reader, ground.len())?,
        };
        debug!("map {}x{} loaded", map.header.width, map.header.height);
        Ok(map)
    }

    pub fn width(&self) -> usize {
        self.header.width as usize
    }

    pub fn height(&self) -> usize {
        self.header.height as usize
    }
}


fn to_cells(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
}

// a plane missing entirely at the end of the file reads as empty cells
fn read_plane<R: Read>(reader: &mut R, len: usize) -> ResResult<Vec<u16>> {
    let mut buff = vec![0u8; len];
    match res_read_up_to(reader, &mut buff)? {
        0 if len > 0 => debug!("map plane missing, {} empty cells", len / 2),
        n if n < buff.len() => return Err(ResError::UnexpectedEof),
        _ => {}
    }

    Ok(to_cells(&buff))
}
