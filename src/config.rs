use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::res::anime::AnimeSet;
use crate::res::graphic::GraphicSet;
use crate::res::palette::Palette;
use crate::res::ResError;


#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("version {version}: anime_info and anime must be given together")]
    IncompleteAnime { version: String },

    #[error("version {version}: {source}")]
    Resource { version: String, source: ResError },
}


/// File set of one game release.
/// Relative paths are resolved against the directory of the config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionPaths {
    pub name: String,
    pub graphic_info: PathBuf,
    pub graphic: PathBuf,
    #[serde(default)]
    pub anime_info: Option<PathBuf>,
    #[serde(default)]
    pub anime: Option<PathBuf>,
    #[serde(default)]
    pub palette: Option<PathBuf>,
}


/// ServerConfig is the media server manifest, keyed by the version used in request paths.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerConfig {
    pub versions: BTreeMap<String, VersionPaths>,
}


/// Opened resources of one version, shared read-only by all requests.
#[derive(Debug, Clone)]
pub struct VersionResources {
    pub name: String,
    pub graphics: GraphicSet,
    pub animes: Option<AnimeSet>,
    pub palette: Option<Palette>,
}


impl ServerConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        trace!("ServerConfig::read");
        let mut config: Self = serde_json::from_slice(&fs::read(path)?)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    pub fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        for paths in self.versions.values_mut() {
            join(&mut paths.graphic_info);
            join(&mut paths.graphic);
            paths.anime_info.iter_mut().for_each(join);
            paths.anime.iter_mut().for_each(join);
            paths.palette.iter_mut().for_each(join);
        }
    }

    pub fn open_all(&self) -> Result<BTreeMap<String, VersionResources>, ConfigError> {
        let mut result = BTreeMap::new();
        for (version, paths) in &self.versions {
            let resources = paths.open(version)?;
            info!("version {version} ({}): {} graphics", resources.name, resources.graphics.index().len());
            result.insert(version.clone(), resources);
        }
        Ok(result)
    }
}


impl VersionPaths {
    pub fn open(&self, version: &str) -> Result<VersionResources, ConfigError> {
        let wrap = |source: ResError| ConfigError::Resource { version: version.to_string(), source };

        let graphics = GraphicSet::open(&self.graphic_info, &self.graphic).map_err(wrap)?;

        let animes = match (&self.anime_info, &self.anime) {
            (Some(info), Some(data)) => Some(AnimeSet::open(info, data).map_err(wrap)?),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteAnime { version: version.to_string() }),
        };

        let palette = match &self.palette {
            Some(path) => Some(Palette::read_fixed(path).map_err(wrap)?),
            None => None,
        };

        Ok(VersionResources { name: self.name.clone(), graphics, animes, palette })
    }
}
