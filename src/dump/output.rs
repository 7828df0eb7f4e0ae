use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use image::{ImageOutputFormat, RgbaImage};
use log::trace;

use crate::res::anime::Animation;
use crate::res::ResResult;


/// Where dumped files go. A dry run encodes into memory and writes nothing.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub out_dir: PathBuf,
    pub dry_run: bool,
}


impl DumpOptions {
    pub fn new(out_dir: &Path, dry_run: bool) -> Self {
        Self { out_dir: out_dir.to_path_buf(), dry_run }
    }

    pub fn prepare(&self) -> ResResult<()> {
        if !self.dry_run {
            fs::create_dir_all(&self.out_dir)?;
        }
        Ok(())
    }

    pub fn write_png(&self, file_name: &str, image: &RgbaImage) -> ResResult<()> {
        trace!("write_png {file_name}");
        let mut write_buffer = Cursor::new(Vec::with_capacity(image.width() as usize * image.height() as usize));
        image.write_to(&mut write_buffer, ImageOutputFormat::Png)?;

        if !self.dry_run {
            fs::write(self.out_dir.join(file_name), write_buffer.into_inner())?;
        }
        Ok(())
    }

    pub fn write_gif(&self, file_name: &str, animation: &Animation) -> ResResult<()> {
        trace!("write_gif {file_name}");
        if self.dry_run {
            return animation.encode_gif(Vec::new());
        }

        let mut out = BufWriter::new(File::create(self.out_dir.join(file_name))?);
        animation.encode_gif(&mut out)?;
        out.flush()?;
        Ok(())
    }
}
