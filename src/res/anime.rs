use std::io::{BufReader, Cursor, Read, Seek, SeekFrom, Write};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, GenericImage, RgbaImage};
use log::{debug, trace, warn};

use crate::res::error::{ResError, ResResult};
use crate::res::graphic::{Graphic, GraphicIndex, GraphicSet};
use crate::res::index::{IndexRecord, ResourceIndex, ResourceSet};
use crate::res::palette::Palette;
use crate::res::reader::*;


pub const ANIME_INFO_SIZE: usize = 12;
pub const ANIME_FRAME_SIZE: usize = 10;

const EXTENDED_SENTINEL: i32 = -1;
const MAX_FRAME_CAPACITY: usize = 4096;


/// AnimeInfo is a record of `AnimeInfo*.bin`. One id owns `action_count` consecutive
/// action sequences (direction × action) stored from `file_offset` on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AnimeInfo {
    pub id: i32,
    pub file_offset: i32,
    pub action_count: i16,
}

impl IndexRecord for AnimeInfo {
    const SIZE: usize = ANIME_INFO_SIZE;

    fn read<R: Read>(reader: &mut R) -> ResResult<Self> {
        let info = AnimeInfo {
            id: res_read_i32(reader)?,
            file_offset: res_read_i32(reader)?,
            action_count: res_read_i16(reader)?,
        };
        let _reserved = res_read_u16(reader)?;
        Ok(info)
    }

    fn id(&self) -> i32 {
        self.id
    }
}

pub type AnimeIndex = ResourceIndex<AnimeInfo>;
pub type AnimeSet = ResourceSet<AnimeInfo>;


#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeaderLayout {
    /// direction, action, duration, frame count
    Legacy,
    /// legacy fields followed by reserved, reversed and the -1 sentinel
    Extended,
}

impl HeaderLayout {
    pub const fn size(self) -> usize {
        match self {
            HeaderLayout::Legacy => 12,
            HeaderLayout::Extended => 20,
        }
    }
}


/// AnimeHeader opens each action sequence in `Anime*.bin`.
/// `reversed` and `sentinel` stay zero for the legacy layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AnimeHeader {
    pub direction: i16,
    pub action: i16,
    pub duration_ms: i32,
    pub frame_count: i32,
    pub reversed: i16,
    pub sentinel: i32,
}

impl AnimeHeader {
    /// Picks the header layout from the first bytes of an anime, the files carry no version tag.
    /// `bytes` are up to 20 bytes read speculatively at the start of the anime.
    pub fn probe(bytes: &[u8]) -> HeaderLayout {
        match bytes.get(16..20) {
            Some(s) if i32::from_le_bytes([s[0], s[1], s[2], s[3]]) == EXTENDED_SENTINEL => HeaderLayout::Extended,
            _ => HeaderLayout::Legacy,
        }
    }

    pub fn read<R: Read>(reader: &mut R, layout: HeaderLayout) -> ResResult<Self> {
        let mut header = AnimeHeader {
            direction: res_read_i16(reader)?,
            action: res_read_i16(reader)?,
            duration_ms: res_read_i32(reader)?,
            frame_count: res_read_i32(reader)?,
            ..Default::default()
        };

        if layout == HeaderLayout::Extended {
            let _reserved = res_read_i16(reader)?;
            header.reversed = res_read_i16(reader)?;
            header.sentinel = res_read_i32(reader)?;
        }

        Ok(header)
    }

    pub fn parse(bytes: &[u8], layout: HeaderLayout) -> ResResult<Self> {
        Self::read(&mut Cursor::new(bytes), layout)
    }

    /// gif frame delay in centiseconds
    pub fn frame_delay_cs(&self) -> u16 {
        if self.frame_count <= 0 {
            return 0;
        }
        (self.duration_ms / self.frame_count / 10).clamp(0, u16::MAX as i32) as u16
    }
}


#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AnimeFrame {
    pub graphic_id: i32,
    pub offset_x: i16,
    pub offset_y: i16,
    pub flag: i16,
}

impl AnimeFrame {
    pub fn read<R: Read>(reader: &mut R) -> ResResult<Self> {
        Ok(AnimeFrame {
            graphic_id: res_read_i32(reader)?,
            offset_x: res_read_i16(reader)?,
            offset_y: res_read_i16(reader)?,
            flag: res_read_i16(reader)?,
        })
    }
}


#[derive(Debug, Clone)]
pub struct AnimeFrameGraphic {
    pub frame: AnimeFrame,
    pub graphic: Graphic,
}

/// Anime is one action sequence with its frames in display order.
#[derive(Debug, Clone)]
pub struct Anime {
    pub info: AnimeInfo,
    pub header: AnimeHeader,
    pub frames: Vec<AnimeFrameGraphic>,
}


impl AnimeInfo {
    /// Loads every action sequence of this anime and the graphic behind every frame.
    pub fn load_actions<A, G>(&self, anime_data: &mut A, graphics: &GraphicIndex, graphic_data: &mut G) -> ResResult<Vec<Anime>>
    where
        A: Read + Seek,
        G: Read + Seek,
    {
        trace!("AnimeInfo::load_actions {}", self.id);
        self.load_all(anime_data, graphics, graphic_data).map_err(|source| ResError::Anime {
            id: self.id,
            offset: self.file_offset,
            source: Box::new(source),
        })
    }

    fn load_all<A, G>(&self, f: &mut A, graphics: &GraphicIndex, g: &mut G) -> ResResult<Vec<Anime>>
    where
        A: Read + Seek,
        G: Read + Seek,
    {
        let start = SeekFrom::Start(self.file_offset.max(0) as u64);

        // speculative read, the layout decides where the frame array starts
        f.seek(start)?;
        let mut probe = [0u8; HeaderLayout::Extended.size()];
        let probed = res_read_up_to(f, &mut probe)?;
        let layout = AnimeHeader::probe(&probe[..probed]);
        f.seek(start)?;

        let count = self.action_count.max(0) as usize;
        let mut animes = Vec::with_capacity(count);

        for _ in 0..count {
            let header = AnimeHeader::read(f, layout)?;

            // frames are read one by one, a corrupt count runs into the end of the file
            let frame_count = header.frame_count.max(0) as usize;
            let mut frames = Vec::with_capacity(frame_count.min(MAX_FRAME_CAPACITY));
            for _ in 0..frame_count {
                let frame = AnimeFrame::read(f)?;
                let info = graphics.get(frame.graphic_id).ok_or(ResError::MissingGraphic(frame.graphic_id))?;
                let graphic = info.load(g)?;
                frames.push(AnimeFrameGraphic { frame, graphic });
            }

            animes.push(Anime { info: *self, header, frames });
        }

        Ok(animes)
    }
}


#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposal {
    Keep,
    Background,
    Previous,
}

#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub image: RgbaImage,
    pub delay_cs: u16,
    pub disposal: Disposal,
}

/// Animation is a timed frame sequence on a common canvas, ready for a gif encoder.
#[derive(Debug, Clone)]
pub struct Animation {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<AnimationFrame>,
}


impl Anime {
    /// Rasterizes all frames. A frame's own palette wins over `external`.
    /// A frame without embedded palette and no usable `external` fails with `PaletteNotFound`.
    pub fn compose(&self, external: Option<&Palette>) -> ResResult<Animation> {
        let external = external.filter(|p| !p.is_empty());
        let width = self.frames.iter().map(|f| f.graphic.width()).max().unwrap_or(0);
        let height = self.frames.iter().map(|f| f.graphic.height()).max().unwrap_or(0);
        let delay_cs = self.header.frame_delay_cs();

        let mut frames = Vec::with_capacity(self.frames.len());
        for f in &self.frames {
            let embedded = f.graphic.palette.as_ref().is_some_and(|p| !p.is_empty());
            if !embedded && external.is_none() {
                return Err(ResError::PaletteNotFound(self.info.id));
            }

            let image = f.graphic.rgba(external)?;
            let mut canvas = RgbaImage::new(width, height);
            canvas.copy_from(&image, 0, 0)?;

            frames.push(AnimationFrame { image: canvas, delay_cs, disposal: Disposal::Background });
        }

        Ok(Animation { width, height, frames })
    }
}


impl Animation {
    pub fn encode_gif<W: Write>(&self, writer: W) -> ResResult<()> {
        let mut encoder = GifEncoder::new(writer);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(self.frames.iter().map(|f| {
            Frame::from_parts(f.image.clone(), 0, 0, Delay::from_numer_denom_ms(f.delay_cs as u32 * 10, 1))
        }))?;
        Ok(())
    }
}


/// Picks the fallback palette for the frames of an anime that embed none.
/// A graphic of the hidden set placed under the anime id lends its embedded palette,
/// otherwise the fixed palette is used. A hidden graphic that fails to load counts as a miss.
pub fn resolve_anime_palette(anime_id: i32, hidden: Option<&GraphicSet>, fixed: Option<&Palette>) -> Option<Palette> {
    if let Some(palette) = hidden.and_then(|set| hidden_palette(anime_id, set)) {
        return Some(palette);
    }
    fixed.filter(|p| !p.is_empty()).cloned()
}

fn hidden_palette(anime_id: i32, set: &GraphicSet) -> Option<Palette> {
    let Some(info) = set.index().by_map_id(anime_id) else {
        debug!("hidden palette not found for anime {anime_id}");
        return None;
    };

    let graphic = set.open_data()
        .and_then(|f| info.load(&mut BufReader::new(f)));
    match graphic {
        Ok(Graphic { palette: Some(palette), .. }) if !palette.is_empty() => Some(palette),
        Ok(_) => {
            debug!("hidden graphic {} of anime {anime_id} has no palette", info.id);
            None
        }
        Err(err) => {
            warn!("hidden graphic {} of anime {anime_id}: {err}", info.id);
            None
        }
    }
}


#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::res::graphic::tests::{graphic_record, info_for};

    pub(crate) fn header_bytes(h: &AnimeHeader, layout: HeaderLayout) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&h.direction.to_le_bytes());
        b.extend_from_slice(&h.action.to_le_bytes());
        b.extend_from_slice(&h.duration_ms.to_le_bytes());
        b.extend_from_slice(&h.frame_count.to_le_bytes());
        if layout == HeaderLayout::Extended {
            b.extend_from_slice(&0i16.to_le_bytes());
            b.extend_from_slice(&h.reversed.to_le_bytes());
            b.extend_from_slice(&h.sentinel.to_le_bytes());
        }
        b
    }

    pub(crate) fn frame_bytes(graphic_id: i32) -> Vec<u8> {
        let mut b = graphic_id.to_le_bytes().to_vec();
        b.extend_from_slice(&[0u8; 6]);
        b
    }

    /// graphic file with two graphics of different sizes, and their index
    pub(crate) fn graphic_fixture() -> (Vec<u8>, GraphicIndex) {
        let first = graphic_record(0, 2, 1, &[1, 2], None);
        let second = graphic_record(1, 3, 2, &[0x86, 0x01], None);

        let mut file = first.clone();
        let infos = [info_for(100, 0, &first, 2, 1), info_for(101, first.len(), &second, 3, 2)];
        file.extend_from_slice(&second);

        let mut index_bytes = Vec::new();
        for i in infos {
            for v in [i.id, i.file_offset, i.byte_length, 0, 0, i.width, i.height] {
                index_bytes.extend_from_slice(&v.to_le_bytes());
            }
            index_bytes.extend_from_slice(&[1, 1, 0, 0, 0, 0, 0, 0]);
            index_bytes.extend_from_slice(&(i.id + 1000).to_le_bytes());
        }
        let index = GraphicIndex::from_reader(&mut Cursor::new(index_bytes)).unwrap();
        (file, index)
    }

    #[test]
    fn probe_detects_layout() {
        let ext = AnimeHeader { action: 5, duration_ms: 700, frame_count: 10, reversed: 4, sentinel: -1, ..Default::default() };
        assert_eq!(AnimeHeader::probe(&header_bytes(&ext, HeaderLayout::Extended)), HeaderLayout::Extended);

        let legacy = AnimeHeader { action: 5, duration_ms: 1500, frame_count: 26, ..Default::default() };
        let mut bytes = header_bytes(&legacy, HeaderLayout::Legacy);
        bytes.extend_from_slice(&frame_bytes(7));
        assert_eq!(AnimeHeader::probe(&bytes), HeaderLayout::Legacy);

        // too short to hold a sentinel
        assert_eq!(AnimeHeader::probe(&bytes[..12]), HeaderLayout::Legacy);
    }

    #[test]
    fn extended_header_keeps_extra_fields() {
        let ext = AnimeHeader { direction: 0, action: 5, duration_ms: 700, frame_count: 10, reversed: 4, sentinel: -1 };
        let parsed = AnimeHeader::parse(&header_bytes(&ext, HeaderLayout::Extended), HeaderLayout::Extended).unwrap();
        assert_eq!(parsed, ext);
    }

    #[test]
    fn legacy_header_zeroes_extra_fields() {
        let legacy = AnimeHeader { direction: 2, action: 5, duration_ms: 1500, frame_count: 26, ..Default::default() };
        let mut bytes = header_bytes(&legacy, HeaderLayout::Legacy);
        bytes.extend_from_slice(&[0xff; 8]);
        let parsed = AnimeHeader::parse(&bytes, AnimeHeader::probe(&bytes)).unwrap();
        assert_eq!(parsed, legacy);
        assert_eq!((parsed.reversed, parsed.sentinel), (0, 0));
    }

    fn anime_file(layout: HeaderLayout, actions: &[(i32, &[i32])]) -> Vec<u8> {
        let mut file = vec![0u8; 4];
        for &(duration, frames) in actions {
            let sentinel = if layout == HeaderLayout::Extended { -1 } else { 0 };
            let h = AnimeHeader { duration_ms: duration, frame_count: frames.len() as i32, sentinel, ..Default::default() };
            file.extend_from_slice(&header_bytes(&h, layout));
            for &id in frames {
                file.extend_from_slice(&frame_bytes(id));
            }
        }
        file
    }

    #[test]
    fn loads_all_actions() {
        let (graphics, index) = graphic_fixture();
        for layout in [HeaderLayout::Legacy, HeaderLayout::Extended] {
            let file = anime_file(layout, &[(1000, &[100, 101, 100]), (500, &[101])]);
            let info = AnimeInfo { id: 1, file_offset: 4, action_count: 2 };

            let animes = info.load_actions(&mut Cursor::new(file), &index, &mut Cursor::new(graphics.clone())).unwrap();
            assert_eq!(animes.len(), 2);
            for a in &animes {
                assert_eq!(a.frames.len(), a.header.frame_count as usize);
            }
            assert_eq!(animes[0].frames[1].graphic.info.id, 101);
            assert_eq!(animes[1].header.duration_ms, 500);
        }
    }

    #[test]
    fn missing_frame_graphic() {
        let (graphics, index) = graphic_fixture();
        let file = anime_file(HeaderLayout::Legacy, &[(1000, &[100, 555])]);
        let info = AnimeInfo { id: 3, file_offset: 4, action_count: 1 };

        let err = info.load_actions(&mut Cursor::new(file), &index, &mut Cursor::new(graphics)).unwrap_err();
        assert!(matches!(err, ResError::Anime { id: 3, .. }));
        assert!(matches!(err.root(), ResError::MissingGraphic(555)));
    }

    #[test]
    fn compose_uses_largest_canvas() {
        let (graphics, index) = graphic_fixture();
        let file = anime_file(HeaderLayout::Legacy, &[(1000, &[100, 101, 100, 101])]);
        let info = AnimeInfo { id: 1, file_offset: 4, action_count: 1 };
        let anime = info.load_actions(&mut Cursor::new(file), &index, &mut Cursor::new(graphics)).unwrap().remove(0);

        let palette = Palette::from_raw(&[0, 0, 0, 1, 1, 1, 2, 2, 2]).unwrap();
        let animation = anime.compose(Some(&palette)).unwrap();

        assert_eq!((animation.width, animation.height), (3, 2));
        assert_eq!(animation.frames.len(), 4);
        for f in &animation.frames {
            // 1000ms / 4 frames / 10
            assert_eq!(f.delay_cs, 25);
            assert_eq!(f.disposal, Disposal::Background);
            assert_eq!(f.image.dimensions(), (3, 2));
        }

        let mut gif = Vec::new();
        animation.encode_gif(&mut gif).unwrap();
        assert_eq!(&gif[..3], b"GIF");
    }

    #[test]
    fn frame_delay_is_floored() {
        let h = AnimeHeader { duration_ms: 1000, frame_count: 3, ..Default::default() };
        assert_eq!(h.frame_delay_cs(), 33);
        let h = AnimeHeader { duration_ms: 1000, frame_count: 0, ..Default::default() };
        assert_eq!(h.frame_delay_cs(), 0);
    }

    #[test]
    fn fixed_palette_fallback() {
        let fixed = Palette::from_raw(&[1, 2, 3]).unwrap();
        assert_eq!(resolve_anime_palette(5, None, Some(&fixed)), Some(fixed));
        assert_eq!(resolve_anime_palette(5, None, None), None);
        assert_eq!(resolve_anime_palette(5, None, Some(&Palette::default())), None);
    }

    #[test]
    fn huge_frame_count_hits_end_of_file() {
        let (graphics, index) = graphic_fixture();
        let h = AnimeHeader { duration_ms: 100, frame_count: i32::MAX, ..Default::default() };
        let mut file = header_bytes(&h, HeaderLayout::Legacy);
        file.extend_from_slice(&frame_bytes(100));
        let info = AnimeInfo { id: 6, file_offset: 0, action_count: 1 };

        let err = info.load_actions(&mut Cursor::new(file), &index, &mut Cursor::new(graphics)).unwrap_err();
        assert!(matches!(err, ResError::Anime { id: 6, .. }));
        assert!(matches!(err.root(), ResError::UnexpectedEof));
    }

    #[test]
    fn embedded_palettes_need_no_fallback() {
        let payload = [1u8, 0, 0, 0, 0xff, 0, 0];
        let record = graphic_record(2, 1, 1, &payload, Some(6));
        let graphic = info_for(100, 0, &record, 1, 1).load(&mut Cursor::new(record)).unwrap();
        let frame = AnimeFrameGraphic { frame: AnimeFrame { graphic_id: 100, ..Default::default() }, graphic };
        let anime = Anime { info: AnimeInfo { id: 1, ..Default::default() }, header: AnimeHeader::default(), frames: vec![frame] };

        let animation = anime.compose(None).unwrap();
        assert_eq!(animation.frames.len(), 1);
        assert_eq!(animation.frames[0].image.get_pixel(0, 0).0, [0, 0, 0xff, 255]);
    }

    #[test]
    fn frame_without_any_palette() {
        let (graphics, index) = graphic_fixture();
        let file = anime_file(HeaderLayout::Legacy, &[(1000, &[100])]);
        let info = AnimeInfo { id: 2, file_offset: 4, action_count: 1 };
        let anime = info.load_actions(&mut Cursor::new(file), &index, &mut Cursor::new(graphics)).unwrap().remove(0);

        assert!(matches!(anime.compose(None), Err(ResError::PaletteNotFound(2))));
        assert!(matches!(anime.compose(Some(&Palette::default())), Err(ResError::PaletteNotFound(2))));
    }

    #[test]
    fn info_record() {
        let mut b = Vec::new();
        b.extend_from_slice(&42i32.to_le_bytes());
        b.extend_from_slice(&0x20i32.to_le_bytes());
        b.extend_from_slice(&8i16.to_le_bytes());
        b.extend_from_slice(&[0, 0]);
        let info = AnimeInfo::read(&mut Cursor::new(b)).unwrap();
        assert_eq!(info, AnimeInfo { id: 42, file_offset: 0x20, action_count: 8 });
    }
}
