use std::io::{Cursor, Read, Seek, SeekFrom};
use image::{Rgba, RgbaImage};
use log::{trace, warn};

use crate::res::codec;
use crate::res::error::{ResError, ResResult};
use crate::res::index::{IndexRecord, ResourceIndex, ResourceSet};
use crate::res::palette::Palette;
use crate::res::reader::*;


pub const GRAPHIC_INFO_SIZE: usize = 40;
pub const GRAPHIC_HEADER_SIZE: usize = 16;
pub const GRAPHIC_MAGIC: &[u8; 2] = b"RD";


/// GraphicInfo is a record of `GraphicInfo*.bin`, it locates one graphic inside `Graphic*.bin`
/// and carries the placement data used by maps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GraphicInfo {
    pub id: i32,
    pub file_offset: i32,
    pub byte_length: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub width: i32,
    pub height: i32,
    pub grid_w: u8,
    pub grid_h: u8,
    pub access: u8,
    pub map_id: i32,
}

impl IndexRecord for GraphicInfo {
    const SIZE: usize = GRAPHIC_INFO_SIZE;

    fn read<R: Read>(reader: &mut R) -> ResResult<Self> {
        let info = GraphicInfo {
            id: res_read_i32(reader)?,
            file_offset: res_read_i32(reader)?,
            byte_length: res_read_i32(reader)?,
            offset_x: res_read_i32(reader)?,
            offset_y: res_read_i32(reader)?,
            width: res_read_i32(reader)?,
            height: res_read_i32(reader)?,
            grid_w: res_read_u8(reader)?,
            grid_h: res_read_u8(reader)?,
            access: res_read_u8(reader)?,
            map_id: {
                let _reserved = res_read_bytes::<_, 5>(reader)?;
                res_read_i32(reader)?
            },
        };
        Ok(info)
    }

    fn id(&self) -> i32 {
        self.id
    }

    // map id 0 marks graphics that are never placed on a map
    fn secondary_key(&self) -> Option<i32> {
        (self.map_id != 0).then_some(self.map_id)
    }
}

pub type GraphicIndex = ResourceIndex<GraphicInfo>;
pub type GraphicSet = ResourceSet<GraphicInfo>;

impl ResourceIndex<GraphicInfo> {
    pub fn by_map_id(&self, map_id: i32) -> Option<&GraphicInfo> {
        self.get_secondary(map_id)
    }
}


/// GraphicHeader opens every graphic in `Graphic*.bin`.
/// Odd versions hold run-length encoded payloads, versions from 2 on carry an embedded palette.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GraphicHeader {
    pub magic: [u8; 2],
    pub version: u8,
    pub width: i32,
    pub height: i32,
    pub length: i32,
}

impl GraphicHeader {
    pub fn read<R: Read>(reader: &mut R) -> ResResult<Self> {
        let magic = res_read_bytes::<_, 2>(reader)?;
        if &magic != GRAPHIC_MAGIC {
            return Err(ResError::InvalidMagic { found: magic.to_vec() });
        }

        let version = res_read_u8(reader)?;
        let _reserved = res_read_u8(reader)?;

        Ok(GraphicHeader {
            magic,
            version,
            width: res_read_i32(reader)?,
            height: res_read_i32(reader)?,
            length: res_read_i32(reader)?,
        })
    }

    #[inline]
    pub fn is_encoded(&self) -> bool {
        self.version & 1 == 1
    }

    #[inline]
    pub fn has_palette(&self) -> bool {
        self.version >= 2
    }
}


/// Graphic is a decoded graphic: palette indexes stored bottom row first,
/// plus the palette embedded in the payload if the format version has one.
#[derive(Debug, Clone)]
pub struct Graphic {
    pub info: GraphicInfo,
    pub header: GraphicHeader,
    /// payload bytes as stored in the file, before decoding
    pub raw_len: usize,
    pub pixels: Vec<u8>,
    pub palette: Option<Palette>,
}


/// IndexedImage holds top-down palette indexes with the palette they refer to
#[derive(Debug, Clone)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub palette: Palette,
}


impl GraphicInfo {
    /// Reads and decodes this graphic from the data file.
    /// Errors are wrapped with the graphic id, its offset and the header if it was readable.
    pub fn load<R: Read + Seek>(&self, data: &mut R) -> ResResult<Graphic> {
        trace!("GraphicInfo::load {}", self.id);
        let mut header = None;
        self.load_payload(data, &mut header).map_err(|source| ResError::Graphic {
            id: self.id,
            offset: self.file_offset,
            header,
            source: Box::new(source),
        })
    }

    fn load_payload<R: Read + Seek>(&self, data: &mut R, header_slot: &mut Option<GraphicHeader>) -> ResResult<Graphic> {
        data.seek(SeekFrom::Start(self.file_offset.max(0) as u64))?;
        let record = res_read_vec(data, self.byte_length.max(0) as u64)?;
        let f = &mut Cursor::new(record.as_slice());

        let header = GraphicHeader::read(f)?;
        *header_slot = Some(header);

        let palette_len = if header.has_palette() {
            let len = res_read_i32(f)?;
            usize::try_from(len).map_err(|_| ResError::InvalidPaletteLength(len))?
        } else {
            0
        };

        let payload = &record[f.position() as usize..];
        let mut decoded = if header.is_encoded() {
            codec::decode(payload)?
        } else {
            payload.to_vec()
        };

        if palette_len > decoded.len() {
            return Err(ResError::PaletteOverrun { palette_len, decoded_len: decoded.len() });
        }

        let palette_bytes = decoded.split_off(decoded.len() - palette_len);
        let palette = if palette_len > 0 {
            match Palette::from_raw(&palette_bytes) {
                Ok(p) => Some(p),
                Err(truncated) => {
                    warn!("graphic {}: {truncated}, keeping {} colors", self.id, truncated.decoded.len());
                    Some(truncated.decoded)
                }
            }
        } else {
            None
        };

        Ok(Graphic {
            info: *self,
            header,
            raw_len: payload.len(),
            pixels: decoded,
            palette,
        })
    }
}


impl Graphic {
    #[inline]
    pub fn width(&self) -> u32 {
        self.info.width.max(0) as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.info.height.max(0) as u32
    }

    /// The embedded palette always wins, the fallback is only used when none is embedded.
    pub fn resolve_palette<'a>(&'a self, fallback: Option<&'a Palette>) -> ResResult<&'a Palette> {
        self.palette.as_ref()
            .filter(|p| !p.is_empty())
            .or(fallback.filter(|p| !p.is_empty()))
            .ok_or(ResError::EmptyPalette)
    }

    fn check_size(&self) -> ResResult<(u32, u32)> {
        let (w, h) = (self.width(), self.height());
        if self.pixels.len() != w as usize * h as usize {
            return Err(ResError::SizeMismatch { width: w, height: h, actual: self.pixels.len() });
        }
        Ok((w, h))
    }

    /// Rasterizes to rgba, flipping the bottom-up rows.
    /// Pixel values past the end of the palette are an error, never clamped.
    pub fn rgba(&self, fallback: Option<&Palette>) -> ResResult<RgbaImage> {
        let palette = self.resolve_palette(fallback)?;
        let (w, h) = self.check_size()?;

        let mut image = RgbaImage::new(w, h);
        for (i, &pixel) in self.pixels.iter().enumerate() {
            let color: Rgba<u8> = palette.get(pixel).ok_or(ResError::RenderFailed {
                index: i,
                pixel,
                palette_len: palette.len(),
            })?;

            let (x, y) = (i as u32 % w, h - 1 - i as u32 / w);
            image.put_pixel(x, y, color);
        }

        Ok(image)
    }

    /// Palette indexes in top-down order, for palette based encoders
    pub fn indexed(&self, fallback: Option<&Palette>) -> ResResult<IndexedImage> {
        let palette = self.resolve_palette(fallback)?;
        let (w, h) = self.check_size()?;

        if let Some((index, &pixel)) = self.pixels.iter().enumerate().find(|(_, &p)| p as usize >= palette.len()) {
            return Err(ResError::RenderFailed { index, pixel, palette_len: palette.len() });
        }

        let mut pixels = Vec::with_capacity(self.pixels.len());
        if w > 0 {
            for row in self.pixels.chunks_exact(w as usize).rev() {
                pixels.extend_from_slice(row);
            }
        }

        Ok(IndexedImage { width: w, height: h, pixels, palette: palette.clone() })
    }
}


#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// builds one graphic record, header included
    pub(crate) fn graphic_record(version: u8, width: i32, height: i32, payload: &[u8], palette_len: Option<i32>) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(GRAPHIC_MAGIC);
        record.push(version);
        record.push(0);
        record.extend_from_slice(&width.to_le_bytes());
        record.extend_from_slice(&height.to_le_bytes());
        let header_len = if palette_len.is_some() { 20 } else { 16 };
        record.extend_from_slice(&((header_len + payload.len()) as i32).to_le_bytes());
        if let Some(len) = palette_len {
            record.extend_from_slice(&len.to_le_bytes());
        }
        record.extend_from_slice(payload);
        record
    }

    pub(crate) fn info_for(id: i32, offset: usize, record: &[u8], width: i32, height: i32) -> GraphicInfo {
        GraphicInfo {
            id,
            file_offset: offset as i32,
            byte_length: record.len() as i32,
            width,
            height,
            grid_w: 1,
            grid_h: 1,
            ..Default::default()
        }
    }

    #[test]
    fn reads_info_record() {
        let mut bytes = Vec::new();
        for v in [7i32, 0x100, 424, -32, -24, 64, 47] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&[1, 1, 1, 0, 0, 0, 0, 0]);
        bytes.extend_from_slice(&999i32.to_le_bytes());
        assert_eq!(bytes.len(), GRAPHIC_INFO_SIZE);

        let info = GraphicInfo::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(info, GraphicInfo {
            id: 7, file_offset: 0x100, byte_length: 424, offset_x: -32, offset_y: -24,
            width: 64, height: 47, grid_w: 1, grid_h: 1, access: 1, map_id: 999,
        });
        assert_eq!(info.secondary_key(), Some(999));
        assert_eq!(GraphicInfo { map_id: 0, ..info }.secondary_key(), None);
    }

    #[test]
    fn loads_encoded_tile() {
        // 64x47 ground tile, one repeat run of 3008 pixels
        let record = graphic_record(1, 64, 47, &[0x9b, 0x05, 0xc0], None);
        let mut file = vec![0u8; 8];
        file.extend_from_slice(&record);
        let info = info_for(1, 8, &record, 64, 47);

        let g = info.load(&mut Cursor::new(file)).unwrap();
        assert_eq!(g.header, GraphicHeader { magic: *b"RD", version: 1, width: 64, height: 47, length: 19 });
        assert_eq!(g.raw_len, 3);
        assert_eq!(g.pixels.len(), 3008);
        assert!(g.pixels.iter().all(|&p| p == 5));
        assert!(g.palette.is_none());
    }

    #[test]
    fn loads_raw_with_embedded_palette() {
        let mut payload = vec![0, 1, 1, 0];
        payload.extend_from_slice(&[0, 0, 0, 0x30, 0x20, 0x10]);
        let record = graphic_record(2, 2, 2, &payload, Some(6));
        let info = info_for(2, 0, &record, 2, 2);

        let g = info.load(&mut Cursor::new(record)).unwrap();
        assert_eq!(g.pixels, vec![0, 1, 1, 0]);
        let p = g.palette.as_ref().unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.get(1), Some(Rgba([0x10, 0x20, 0x30, 255])));
    }

    #[test]
    fn palette_is_split_after_decoding() {
        // 2x1 pixels + 1 palette color, all inside the encoded stream
        let encoded = [0x05, 1, 1, 0xff, 0xff, 0xff];
        let record = graphic_record(3, 2, 1, &encoded, Some(3));
        let info = info_for(3, 0, &record, 2, 1);

        let g = info.load(&mut Cursor::new(record)).unwrap();
        assert_eq!(g.pixels, vec![1, 1]);
        assert_eq!(g.palette.as_ref().map(Palette::len), Some(1));
    }

    #[test]
    fn bad_magic_is_reported_with_context() {
        let mut record = graphic_record(0, 1, 1, &[0], None);
        record[0] = b'X';
        let info = info_for(9, 0, &record, 1, 1);

        let err = info.load(&mut Cursor::new(record)).unwrap_err();
        match &err {
            ResError::Graphic { id: 9, header: None, source, .. } =>
                assert!(matches!(**source, ResError::InvalidMagic { .. })),
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.is_skippable());
    }

    #[test]
    fn codec_failure_is_decode_failed() {
        let record = graphic_record(1, 1, 1, &[0x31], None);
        let info = info_for(4, 0, &record, 1, 1);

        let err = info.load(&mut Cursor::new(record)).unwrap_err();
        assert!(matches!(err.root(), ResError::DecodeFailed(codec::CodecError::InvalidFlag(0x31))));
        if let ResError::Graphic { header, .. } = &err {
            assert_eq!(header.map(|h| h.version), Some(1));
        }
    }

    #[test]
    fn rasterize_flips_rows() {
        let palette = Palette::from_raw(&[0, 0, 0, 0, 0, 0xff, 0, 0xff, 0, 0xff, 0, 0]).unwrap();
        let record = graphic_record(0, 3, 2, &[1, 2, 3, 0, 1, 2], None);
        let info = info_for(5, 0, &record, 3, 2);
        let g = info.load(&mut Cursor::new(record)).unwrap();

        let image = g.rgba(Some(&palette)).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        for (i, &p) in g.pixels.iter().enumerate() {
            let (x, y) = (i as u32 % 3, 2 - 1 - i as u32 / 3);
            assert_eq!(*image.get_pixel(x, y), palette.get(p).unwrap());
        }

        let indexed = g.indexed(Some(&palette)).unwrap();
        assert_eq!(indexed.pixels, vec![0, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn out_of_range_pixel_fails() {
        let palette = Palette::from_raw(&[1, 1, 1, 2, 2, 2]).unwrap();
        let record = graphic_record(0, 2, 1, &[1, 2], None);
        let info = info_for(6, 0, &record, 2, 1);
        let g = info.load(&mut Cursor::new(record)).unwrap();

        let err = g.rgba(Some(&palette)).unwrap_err();
        assert!(matches!(err, ResError::RenderFailed { index: 1, pixel: 2, palette_len: 2 }));
        assert!(matches!(g.indexed(Some(&palette)), Err(ResError::RenderFailed { pixel: 2, .. })));
    }

    #[test]
    fn missing_palette_and_bad_size() {
        let record = graphic_record(0, 2, 2, &[0, 0, 0], None);
        let info = info_for(8, 0, &record, 2, 2);
        let g = info.load(&mut Cursor::new(record)).unwrap();

        assert!(matches!(g.rgba(None), Err(ResError::EmptyPalette)));
        let palette = Palette::from_raw(&[1, 1, 1]).unwrap();
        assert!(matches!(g.rgba(Some(&palette)), Err(ResError::SizeMismatch { actual: 3, .. })));
    }

    #[test]
    fn embedded_palette_wins() {
        let payload = [1u8, 0, 0, 0, 0xff, 0, 0];
        let record = graphic_record(2, 1, 1, &payload, Some(6));
        let info = info_for(10, 0, &record, 1, 1);
        let g = info.load(&mut Cursor::new(record)).unwrap();

        let external = Palette::from_raw(&[9, 9, 9, 8, 8, 8]).unwrap();
        let image = g.rgba(Some(&external)).unwrap();
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0xff, 255]));
    }

    #[test]
    fn palette_longer_than_payload() {
        let record = graphic_record(2, 1, 1, &[0, 1, 2], Some(30));
        let info = info_for(11, 0, &record, 1, 1);
        let err = info.load(&mut Cursor::new(record)).unwrap_err();
        assert!(matches!(err.root(), ResError::PaletteOverrun { palette_len: 30, decoded_len: 3 }));
    }

    #[test]
    fn negative_palette_length() {
        let record = graphic_record(2, 1, 1, &[0, 1, 2], Some(-6));
        let info = info_for(12, 0, &record, 1, 1);
        let err = info.load(&mut Cursor::new(record)).unwrap_err();
        assert!(matches!(err.root(), ResError::InvalidPaletteLength(-6)));
        assert!(err.is_skippable());
        assert!(err.to_string().contains("-6"));
    }

    #[test]
    fn byte_length_past_end_of_file() {
        let record = graphic_record(0, 1, 1, &[0], None);
        let info = GraphicInfo { byte_length: i32::MAX, ..info_for(13, 0, &record, 1, 1) };
        let err = info.load(&mut Cursor::new(record)).unwrap_err();
        assert!(matches!(err, ResError::Graphic { id: 13, header: None, .. }));
        assert!(matches!(err.root(), ResError::UnexpectedEof));
    }
}
