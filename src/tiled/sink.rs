use std::fs;
use std::path::{Path, PathBuf};
use image::{ImageFormat, RgbaImage};
use log::trace;

use crate::res::ResResult;


/// TileSink receives the image of every distinct tile of a converted map, once per map id.
pub trait TileSink {
    fn put(&mut self, map_id: i32, image: &RgbaImage) -> ResResult<()>;
}


/// writes `<dir>/<map id>.png`
#[derive(Debug, Clone)]
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn create(dir: &Path) -> ResResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn tile_path(&self, map_id: i32) -> PathBuf {
        self.dir.join(format!("{map_id}.png"))
    }
}

impl TileSink for DirSink {
    fn put(&mut self, map_id: i32, image: &RgbaImage) -> ResResult<()> {
        let path = self.tile_path(map_id);
        trace!("DirSink::put {}", path.display());
        image.save_with_format(&path, ImageFormat::Png)?;
        Ok(())
    }
}


/// counts tiles and drops their images
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink {
    pub count: usize,
}

impl TileSink for DiscardSink {
    fn put(&mut self, _map_id: i32, _image: &RgbaImage) -> ResResult<()> {
        self.count += 1;
        Ok(())
    }
}
