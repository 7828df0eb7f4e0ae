pub mod output;

use std::io::{self, BufReader};
use std::sync::Arc;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::res::anime::{resolve_anime_palette, AnimeInfo, AnimeSet};
use crate::res::graphic::{GraphicInfo, GraphicSet};
use crate::res::index::IndexRecord;
use crate::res::palette::Palette;
use crate::res::{ResError, ResResult};

pub use output::DumpOptions;


#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DumpReport {
    /// files written, or encoded on a dry run
    pub written: usize,
    /// items left out after a recoverable error
    pub skipped: usize,
}


/// Resources of an anime dump. `hidden` is a second graphic set lending palettes by map id.
#[derive(Debug, Clone)]
pub struct AnimeSources {
    pub animes: AnimeSet,
    pub graphics: GraphicSet,
    pub hidden: Option<GraphicSet>,
    pub palette: Option<Palette>,
}


/// Flag flipped on Ctrl-C. Must be called inside a tokio runtime.
pub fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, waiting for running tasks");
            tx.send(true).ok();
        }
    });
    rx
}


/// Writes every graphic of the set as `<id>.png`.
pub async fn dump_graphics(set: GraphicSet, palette: Option<Palette>, options: DumpOptions, cancel: watch::Receiver<bool>) -> ResResult<DumpReport> {
    options.prepare()?;
    let infos: Vec<GraphicInfo> = set.index().unique().copied().collect();
    info!("dumping {} graphics", infos.len());

    let ctx = Arc::new((set, palette, options));
    fan_out(infos, cancel, move |info| {
        let (set, palette, options) = ctx.as_ref();
        dump_graphic(&info, set, palette.as_ref(), options)
    }).await
}


/// Writes every action of every anime as `<id>-<action>.gif`.
pub async fn dump_animes(sources: AnimeSources, options: DumpOptions, cancel: watch::Receiver<bool>) -> ResResult<DumpReport> {
    options.prepare()?;
    let infos: Vec<AnimeInfo> = sources.animes.index().unique().copied().collect();
    info!("dumping {} animes", infos.len());

    let ctx = Arc::new((sources, options));
    fan_out(infos, cancel, move |info| {
        let (sources, options) = ctx.as_ref();
        dump_anime(&info, sources, options)
    }).await
}


pub fn dump_graphic(info: &GraphicInfo, set: &GraphicSet, palette: Option<&Palette>, options: &DumpOptions) -> ResResult<usize> {
    let graphic = info.load(&mut BufReader::new(set.open_data()?))?;
    let image = graphic.rgba(palette)?;
    options.write_png(&format!("{}.png", info.id), &image)?;
    Ok(1)
}


pub fn dump_anime(info: &AnimeInfo, sources: &AnimeSources, options: &DumpOptions) -> ResResult<usize> {
    // only frames without an embedded palette fall back to this one
    let palette = resolve_anime_palette(info.id, sources.hidden.as_ref(), sources.palette.as_ref());

    let actions = info.load_actions(
        &mut BufReader::new(sources.animes.open_data()?),
        sources.graphics.index(),
        &mut BufReader::new(sources.graphics.open_data()?),
    )?;

    for (i, anime) in actions.iter().enumerate() {
        let animation = anime.compose(palette.as_ref())?;
        options.write_gif(&format!("{}-{i}.gif", info.id), &animation)?;
    }
    Ok(actions.len())
}


/// Runs `job` once per item on the blocking pool and waits for all of them.
/// Recoverable failures are counted, the first fatal one is returned after every task is done.
async fn fan_out<T, F>(items: Vec<T>, cancel: watch::Receiver<bool>, job: F) -> ResResult<DumpReport>
where
    T: IndexRecord + Send + 'static,
    F: Fn(T) -> ResResult<usize> + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let total = items.len();
    let mut tasks = JoinSet::new();

    for item in items {
        if *cancel.borrow() {
            info!("cancelled, {} of {total} items not dispatched", total - tasks.len());
            break;
        }

        let job = job.clone();
        tasks.spawn_blocking(move || {
            let id = item.id();
            (id, job(item))
        });
    }

    let mut report = DumpReport::default();
    let mut fatal = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(written))) => report.written += written,
            Ok((id, Err(err))) if err.is_skippable() => {
                warn!("skip {id}: {err}");
                report.skipped += 1;
            }
            Ok((id, Err(err))) => {
                error!("{id}: {err}");
                fatal.get_or_insert(err);
            }
            Err(err) => {
                error!("dump task failed: {err}");
                fatal.get_or_insert(ResError::Io(io::Error::new(io::ErrorKind::Other, err)));
            }
        }
    }

    debug!("dump finished: {report:?}");
    match fatal {
        Some(err) => Err(err),
        None => Ok(report),
    }
}
