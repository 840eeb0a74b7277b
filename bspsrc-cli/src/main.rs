use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use bspsrc::prelude::*;
use clap::Parser;
use log::LevelFilter;
use thiserror::Error;

const DEFAULT_CONFIG: &str = "bspsrc.ini";

#[derive(Debug, Error)]
enum CliError {
    #[error("config {path}: {source}")]
    Config { path: PathBuf, source: ConfigError },
    #[error("can't list {path}: {source}")]
    List {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no .bsp files given")]
    NoInput,
    #[error("{0}")]
    Option(String),
    #[error(transparent)]
    Bsp(#[from] BspError),
}

#[derive(Parser, Debug)]
#[command(name = "bspsrc")]
#[command(about = "Source engine map decompiler", long_about = None)]
struct Cli {
    /// Maps or directories of maps
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output file for a single map, output directory otherwise
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ini file with a [decompile] section, bspsrc.ini is used when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Search directories recursively
    #[arg(short, long)]
    recursive: bool,

    /// Worker threads, 0 for one per core
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Steam app id of the game, detected per map when left out
    #[arg(long)]
    app: Option<u32>,

    /// brushplanes, origfaceplus, origface or splitface
    #[arg(long)]
    brush_mode: Option<BrushMode>,

    /// auto, old or new
    #[arg(long)]
    format: Option<SourceFormat>,

    /// Extract the embedded files next to the output
    #[arg(long)]
    unpack: bool,

    /// Decompile without writing anything
    #[arg(long)]
    null_output: bool,

    /// Debug logging and debug blocks in the output
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn config(&self) -> Result<DecompileConfig, CliError> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.is_file()),
        };
        let mut config = match path {
            Some(path) => {
                DecompileConfig::load(&path).map_err(|source| CliError::Config { path, source })?
            }
            None => DecompileConfig::default(),
        };

        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(app) = self.app {
            config.app_id = AppId::from_steam_id(app);
        }
        if let Some(mode) = self.brush_mode {
            config.brush_mode = mode;
        }
        if let Some(format) = self.format {
            config.source_format = format;
        }
        config.unpack_embedded |= self.unpack;
        config.null_output |= self.null_output;
        config.debug |= self.debug;
        Ok(config)
    }

    fn entries(&self) -> Result<Vec<BspFileEntry>, CliError> {
        let mut inputs = Vec::new();
        for path in &self.files {
            if path.is_dir() {
                collect_maps(path, self.recursive, &mut inputs)?;
            } else {
                inputs.push(path.clone());
            }
        }
        if inputs.is_empty() {
            return Err(CliError::NoInput);
        }

        let Some(output) = &self.output else {
            return Ok(inputs.into_iter().map(BspFileEntry::new).collect());
        };
        if inputs.len() == 1 && !output.is_dir() {
            let input = inputs.remove(0);
            return Ok(vec![BspFileEntry::with_output(input, output)]);
        }

        fs::create_dir_all(output).map_err(|source| CliError::List {
            path: output.clone(),
            source,
        })?;
        let mut entries = Vec::with_capacity(inputs.len());
        for input in inputs {
            let name = BspFileEntry::new(&input)
                .output
                .file_name()
                .map(|n| output.join(n))
                .ok_or_else(|| CliError::Option(format!("bad map path {}", input.display())))?;
            entries.push(BspFileEntry::with_output(input, name));
        }
        Ok(entries)
    }
}

fn collect_maps(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<(), CliError> {
    let list_err = |source| CliError::List {
        path: dir.to_owned(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(list_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(list_err)?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            if recursive {
                collect_maps(&path, recursive, out)?;
            }
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bsp"))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn run(cli: &Cli, config: DecompileConfig) -> Result<RunSummary, CliError> {
    let entries = cli.entries()?;
    let source = BspSource::new(config, entries);

    let summary = source.run(|event| match event {
        TaskEvent::Started { .. } => {}
        TaskEvent::Finished { report, .. } => {
            println!(
                "{}: {} brushes, {} entities ({}, {:.2}s)",
                report.name,
                report.stats.brushes,
                report.stats.entities,
                report.app.name(),
                report.elapsed.as_secs_f64()
            );
            for warning in &report.warnings {
                println!("  warning: {warning}");
            }
        }
        TaskEvent::Failed { name, error, .. } => println!("{name}: failed, {error}"),
    })?;
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config();

    let debug = cli.debug || config.as_ref().is_ok_and(|c| c.debug);
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match config.and_then(|config| run(&cli, config)) {
        Ok(summary) => {
            println!("{summary}");
            if summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
