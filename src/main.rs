use std::error::Error;
use std::fs::{self, File};
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use log::{debug, error, info, LevelFilter};

use clap;
use clap::{arg, value_parser, ArgAction, ArgMatches, Command, command};
use clap::parser::ValueSource;
use simplelog::{ColorChoice, CombinedLogger, TerminalMode, TermLogger, WriteLogger, Config};

use xgtool::config::ServerConfig;
use xgtool::dump::{self, AnimeSources, DumpOptions, DumpReport};
use xgtool::res::{AnimeSet, GraphicIndex, GraphicSet, Map, Palette};
use xgtool::tiled::{to_tiled_map, DirSink, DiscardSink};
use xgtool::MediaServer;


type CliResult = Result<(), Box<dyn Error>>;


fn cli() -> Command {
    let out_dir = || arg!(-o --out <DIR> "output directory")
        .required(false)
        .default_value("output")
        .value_parser(value_parser!(PathBuf));
    let dry_run = || arg!(--"dry-run" "decode and encode without writing files")
        .action(ArgAction::SetTrue);
    let file = |a: clap::Arg| a.value_parser(value_parser!(PathBuf));

    command!()
        .next_line_help(true)
        .subcommand_required(true)
        .arg(
            arg!(--loglevel <LEVEL>)
                .required(false)
                .global(true)
                .default_value("info")
                .value_parser(["trace", "debug", "info", "warn", "error", "off" ])
                .action(ArgAction::Set)
        )
        .arg(
            arg!(--logfile [FILE_NAME])
                .required(false)
                .global(true)
                .default_value("xgtool.log")
                .action(ArgAction::Set)
                .help("Enables logging to a file. Disabled by default")
        )
        .arg(
            arg!(-q --quiet)
                .required(false)
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Disables output to the terminal")
        )
        .subcommand(
            Command::new("dump-graphic")
                .about("Writes every graphic as <id>.png")
                .arg(file(arg!(--gif <FILE> "graphic info file")))
                .arg(file(arg!(--gf <FILE> "graphic file")))
                .arg(file(arg!(--pf <FILE> "palette file").required(false)))
                .arg(out_dir())
                .arg(dry_run())
        )
        .subcommand(
            Command::new("dump-anime")
                .about("Writes every anime action as <id>-<action>.gif")
                .arg(file(arg!(--aif <FILE> "anime info file")))
                .arg(file(arg!(--af <FILE> "anime file")))
                .arg(file(arg!(--gif <FILE> "graphic info file")))
                .arg(file(arg!(--gf <FILE> "graphic file")))
                .arg(file(arg!(--pgif <FILE> "graphic info file lending palettes").required(false)))
                .arg(file(arg!(--pgf <FILE> "graphic file lending palettes").required(false)))
                .arg(file(arg!(--pf <FILE> "palette file").required(false)))
                .arg(out_dir())
                .arg(dry_run())
        )
        .subcommand(
            Command::new("convert-map")
                .about("Converts a map into a Tiled json map with its tile images")
                .arg(file(arg!(--gif <FILE> "graphic info file")))
                .arg(file(arg!(--gf <FILE> "graphic file")))
                .arg(file(arg!(--mf <FILE> "map file")))
                .arg(file(arg!(--pf <FILE> "palette file").required(false)))
                .arg(out_dir())
                .arg(arg!(-n --name <NAME> "output map file name").required(false).default_value("map.json"))
                .arg(dry_run())
        )
        .subcommand(
            Command::new("media-server")
                .about("Serves graphics and animes over http")
                .arg(file(arg!(--config <FILE> "resource manifest")))
                .arg(
                    arg!(--addr <ADDR> "listen address")
                        .required(false)
                        .default_value("127.0.0.1:8080")
                        .value_parser(value_parser!(SocketAddr))
                )
        )
}


fn initialize_logging(matches: &ArgMatches) {
    let loglevel = match matches.get_one::<String>("loglevel") {
        None => LevelFilter::Off,
        Some(level) => {
            match level.as_str() {
                "trace" => LevelFilter::Trace,
                "debug" => LevelFilter::Debug,
                "info" => LevelFilter::Info,
                "warn" => LevelFilter::Warn,
                "error" => LevelFilter::Error,
                _ => LevelFilter::Off,
            }
        }
    };
    let quiet = matches.get_flag("quiet");
    let term_loglevel = if quiet { LevelFilter::Off } else { loglevel };

    let logfile = match (matches.value_source("logfile"), matches.get_one::<String>("logfile")) {
        (Some(ValueSource::CommandLine), Some(file_name)) => {
            Some(file_name)
        },
        _ => None,
    };

    let term_logger = TermLogger::new(term_loglevel, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
    let result = match logfile.map(File::create) {
        Some(Ok(file)) => CombinedLogger::init(vec![term_logger, WriteLogger::new(loglevel, Config::default(), file)]),
        Some(Err(err)) => {
            eprintln!("cannot create log file: {err}");
            CombinedLogger::init(vec![term_logger])
        }
        None => CombinedLogger::init(vec![term_logger]),
    };

    if let Err(err) = result {
        eprintln!("cannot initialize logging: {err}");
    }
}


fn path<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a Path, Box<dyn Error>> {
    matches.get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .ok_or_else(|| format!("missing --{id}").into())
}


fn palette(matches: &ArgMatches) -> Result<Option<Palette>, Box<dyn Error>> {
    Ok(match matches.get_one::<PathBuf>("pf") {
        Some(pf) => Some(Palette::read_fixed(pf)?),
        None => None,
    })
}


fn dump_options(matches: &ArgMatches) -> Result<DumpOptions, Box<dyn Error>> {
    Ok(DumpOptions::new(path(matches, "out")?, matches.get_flag("dry-run")))
}


fn run_dump(dump: impl std::future::Future<Output = xgtool::res::ResResult<DumpReport>>) -> CliResult {
    let start = Instant::now();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("dump_thread")
        .build()?;

    let report = rt.block_on(dump)?;
    info!("{} files written, {} items skipped in {:?}", report.written, report.skipped, start.elapsed());
    Ok(())
}


fn dump_graphic(matches: &ArgMatches) -> CliResult {
    let set = GraphicSet::open(path(matches, "gif")?, path(matches, "gf")?)?;
    let palette = palette(matches)?;
    let options = dump_options(matches)?;

    run_dump(async move {
        let cancel = dump::cancel_on_ctrl_c();
        dump::dump_graphics(set, palette, options, cancel).await
    })
}


fn dump_anime(matches: &ArgMatches) -> CliResult {
    let hidden = match (matches.get_one::<PathBuf>("pgif"), matches.get_one::<PathBuf>("pgf")) {
        (Some(pgif), Some(pgf)) => Some(GraphicSet::open(pgif, pgf)?),
        (None, None) => None,
        _ => return Err("--pgif and --pgf must be given together".into()),
    };

    let sources = AnimeSources {
        animes: AnimeSet::open(path(matches, "aif")?, path(matches, "af")?)?,
        graphics: GraphicSet::open(path(matches, "gif")?, path(matches, "gf")?)?,
        hidden,
        palette: palette(matches)?,
    };
    let options = dump_options(matches)?;

    run_dump(async move {
        let cancel = dump::cancel_on_ctrl_c();
        dump::dump_animes(sources, options, cancel).await
    })
}


fn convert_map(matches: &ArgMatches) -> CliResult {
    let index = GraphicIndex::read(path(matches, "gif")?)?;
    let data = &mut BufReader::new(File::open(path(matches, "gf")?)?);
    let mut map = Map::read(path(matches, "mf")?)?;
    let palette = palette(matches)?;
    let options = dump_options(matches)?;

    let tiled = if options.dry_run {
        let mut sink = DiscardSink::default();
        let tiled = to_tiled_map(&mut map, &index, data, palette.as_ref(), &mut sink)?;
        debug!("dry run, {} tile images discarded", sink.count);
        tiled
    } else {
        let mut sink = DirSink::create(&options.out_dir)?;
        to_tiled_map(&mut map, &index, data, palette.as_ref(), &mut sink)?
    };

    let json = serde_json::to_vec(&tiled)?;
    if !options.dry_run {
        let name = matches.get_one::<String>("name").map(String::as_str).unwrap_or("map.json");
        let out = options.out_dir.join(name);
        fs::write(&out, json)?;
        info!("map written to {}", out.display());
    }
    Ok(())
}


fn media_server(matches: &ArgMatches) -> CliResult {
    let config = ServerConfig::read(path(matches, "config")?)?;
    let addr = *matches.get_one::<SocketAddr>("addr").ok_or("missing --addr")?;

    let start = Instant::now();
    info!("opening resources of {} versions...", config.versions.len());
    let versions = config.open_all()?;
    info!("resources opened in {:?}", start.elapsed());

    let server = MediaServer::start(addr, versions);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if !server.is_running() {
                        break;
                    }
                }
            }
        }
    });

    server.stop()?;
    info!("app stopped");
    Ok(())
}


fn main() -> ExitCode {
    let matches = cli().get_matches();
    initialize_logging(&matches);

    let result = match matches.subcommand() {
        Some(("dump-graphic", sub)) => dump_graphic(sub),
        Some(("dump-anime", sub)) => dump_anime(sub),
        Some(("convert-map", sub)) => convert_map(sub),
        Some(("media-server", sub)) => media_server(sub),
        _ => Err("unknown command".into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
