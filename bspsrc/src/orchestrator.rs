//! Decompiles a batch of maps on a worker pool, one task per map.

use std::{
    any::Any,
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use rayon::ThreadPoolBuilder;
use regex::Regex;

use crate::{
    app::{AppDb, AppId},
    bsp::{BspData, BspFile},
    config::DecompileConfig,
    decompile::{DecompileStats, Decompiler},
    error::{BspError, PipelineWarning},
    texture::source::is_patched_material,
};

/// Work done for one map inside a worker
type Job = fn(&DecompileConfig, &AppDb, &BspFileEntry) -> Result<DecompileReport, BspError>;

/// How often the result loop looks at the stop flag while waiting
const STOP_POLL: Duration = Duration::from_millis(100);

/// One map to decompile and where its output goes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BspFileEntry {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Destination of the embedded files
    pub pak_dir: PathBuf,
}

impl BspFileEntry {
    /// Writes `<name>_d.vmf` next to the input
    pub fn new(input: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let output = with_suffix(&input, "_d.vmf");
        Self::with_output(input, output)
    }

    pub fn with_output(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        let pak_dir = with_suffix(&output, "");
        Self {
            input: input.into(),
            output,
            pak_dir,
        }
    }

    pub fn name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Replaces the extension of a file name with a suffix
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}"))
}

/// Outcome of one decompiled map
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecompileReport {
    pub name: String,
    pub app: AppId,
    pub warnings: Vec<PipelineWarning>,
    pub stats: DecompileStats,
    pub elapsed: Duration,
}

impl DecompileReport {
    pub fn protection_methods(&self) -> Vec<String> {
        self.stats.protection.methods()
    }
}

#[derive(Debug)]
pub enum TaskEvent {
    Started { index: usize, name: String },
    Finished { index: usize, report: DecompileReport },
    Failed { index: usize, name: String, error: BspError },
}

/// Totals of one run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub files: usize,
    pub finished: usize,
    pub failed: usize,
    /// Finished files that reported warnings
    pub with_warnings: usize,
    pub stopped: bool,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} failed, {} with warnings, {:.2}s",
            self.files,
            self.failed,
            self.with_warnings,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Embedded files the compiler generates itself: cubemap textures, vertex
/// lighting and patched materials
pub fn is_compiler_generated(path: &str) -> bool {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();

    if is_patched_material(path) {
        return true;
    }
    let file_name = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .to_ascii_lowercase();
    if file_name == "cubemapdefault.vtf" || file_name == "cubemapdefault.hdr.vtf" {
        return true;
    }

    let patterns = PATTERNS.get_or_init(|| {
        let vhv = Regex::new(r"^sp(_hdr)?_\d+\.vhv$");
        let cubemap = Regex::new(r"^c-?\d+_-?\d+_-?\d+(\.hdr)?\.vtf$");
        match (vhv, cubemap) {
            (Ok(vhv), Ok(cubemap)) => Some((vhv, cubemap)),
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Bad embedded file pattern: {e}");
                None
            }
        }
    });
    patterns
        .as_ref()
        .is_some_and(|(vhv, cubemap)| vhv.is_match(&file_name) || cubemap.is_match(&file_name))
}

/// Decompiles one map. Everything short of a broken file or an unwritable
/// output ends up as a warning in the report.
pub fn decompile_file(
    config: &DecompileConfig,
    apps: &AppDb,
    entry: &BspFileEntry,
) -> Result<DecompileReport, BspError> {
    let start = Instant::now();
    let mut file = BspFile::open(&entry.input)?;
    let mut warnings = Vec::new();
    if config.load_lump_files {
        warnings = file.load_lump_files(&entry.input);
    }

    let app = if config.app_id == AppId::Unknown {
        file.detect_app(apps)
    } else {
        config.app_id
    };
    let (bsp, lump_warnings) = BspData::read(&file, app)?;
    warnings.extend(lump_warnings);

    if config.unpack_embedded && !bsp.pak.is_empty() {
        log::info!("Extracting embedded files");
        let filter = |name: &str| !(config.smart_unpack && is_compiler_generated(name));
        match bsp.pak.unpack(&entry.pak_dir, filter) {
            Ok(n) => log::debug!("Extracted {n} files to {}", entry.pak_dir.display()),
            Err(e) => {
                log::warn!("Can't extract embedded files: {e}");
                warnings.push(PipelineWarning::Extraction(e.to_string()));
            }
        }
    }

    let comment = format!(
        "Decompiled by bspsrc {} from {}",
        env!("CARGO_PKG_VERSION"),
        entry.name()
    );
    let stats = if config.null_output {
        write_vmf(&bsp, config, io::sink(), comment)?
    } else {
        log::info!("Writing {}", entry.output.display());
        let out = BufWriter::new(File::create(&entry.output)?);
        write_vmf(&bsp, config, out, comment)?
    };

    if stats.protection.is_protected() {
        warnings.push(PipelineWarning::Protection(stats.protection.methods()));
    }

    Ok(DecompileReport {
        name: entry.name(),
        app,
        warnings,
        stats,
        elapsed: start.elapsed(),
    })
}

fn write_vmf<W: Write>(
    bsp: &BspData,
    config: &DecompileConfig,
    out: W,
    comment: String,
) -> io::Result<DecompileStats> {
    let mut decompiler = Decompiler::new(bsp, config, out);
    decompiler.set_comment(comment);
    let (mut out, stats) = decompiler.run()?;
    out.flush()?;
    Ok(stats)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Batch of maps sharing one configuration
pub struct BspSource {
    config: Arc<DecompileConfig>,
    entries: Vec<BspFileEntry>,
    apps: Arc<AppDb>,
    stop: Arc<AtomicBool>,
}

impl BspSource {
    pub fn new(config: DecompileConfig, entries: Vec<BspFileEntry>) -> Self {
        Self {
            config: Arc::new(config),
            entries,
            apps: Arc::new(AppDb::new()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn entries(&self) -> &[BspFileEntry] {
        &self.entries
    }

    /// Setting the flag stops waiting for results. Maps already being
    /// decompiled are finished, queued ones are dropped.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Decompiles every entry, reporting progress through `on_event` on the
    /// calling thread
    pub fn run(&self, on_event: impl FnMut(&TaskEvent)) -> Result<RunSummary, BspError> {
        self.run_jobs(decompile_file, on_event)
    }

    fn run_jobs(
        &self,
        job: Job,
        mut on_event: impl FnMut(&TaskEvent),
    ) -> Result<RunSummary, BspError> {
        let start = Instant::now();
        self.config.dump_to_log();

        let threads = self.config.thread_count().min(self.entries.len().max(1));
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("bspsrc-worker-{i}"))
            .panic_handler(|_| log::error!("Decompiler task panicked"))
            .build()?;
        log::debug!("Decompiling {} files on {threads} threads", self.entries.len());

        let (tx, rx) = mpsc::channel();
        for (index, entry) in self.entries.iter().enumerate() {
            let tx = tx.clone();
            let entry = entry.clone();
            let config = Arc::clone(&self.config);
            let apps = Arc::clone(&self.apps);
            let stop = Arc::clone(&self.stop);

            pool.spawn(move || {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                let name = entry.name();
                // the receiver only goes away once the run is over
                let _ = tx.send(TaskEvent::Started {
                    index,
                    name: name.clone(),
                });
                let result = panic::catch_unwind(AssertUnwindSafe(|| job(&config, &apps, &entry)));
                let event = match result {
                    Ok(Ok(report)) => TaskEvent::Finished { index, report },
                    Ok(Err(error)) => TaskEvent::Failed { index, name, error },
                    Err(payload) => {
                        let error = BspError::Panic(panic_message(payload.as_ref()));
                        TaskEvent::Failed { index, name, error }
                    }
                };
                let _ = tx.send(event);
            });
        }
        drop(tx);

        let mut summary = RunSummary {
            files: self.entries.len(),
            ..Default::default()
        };
        let mut remaining = self.entries.len();
        while remaining > 0 {
            if self.stop.load(Ordering::Relaxed) {
                log::info!("Stopped with {remaining} files left");
                summary.stopped = true;
                break;
            }
            let event = match rx.recv_timeout(STOP_POLL) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                // every task is gone, some without a result
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match &event {
                TaskEvent::Started { name, .. } => log::info!("Loading {name}"),
                TaskEvent::Finished { report, .. } => {
                    remaining -= 1;
                    summary.finished += 1;
                    if !report.warnings.is_empty() {
                        summary.with_warnings += 1;
                    }
                }
                TaskEvent::Failed { name, error, .. } => {
                    remaining -= 1;
                    summary.failed += 1;
                    log::error!("Can't decompile {name}: {error}");
                }
            }
            on_event(&event);
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }
}

#[cfg(test)]
mod orchestrator_tests {
    use std::fs;

    use super::*;
    use crate::{
        bsp::{
            consts::LumpType,
            lump_file::{ExternalLump, LUMP_FILE_HEADER_SIZE},
        },
        test_bsp::BspBuilder,
    };

    fn write_cube(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, BspBuilder::cube_map().build()).unwrap();
        path
    }

    fn single_thread() -> DecompileConfig {
        DecompileConfig {
            threads: 1,
            ..Default::default()
        }
    }

    #[test]
    fn output_names() {
        let entry = BspFileEntry::new("maps/de_test.bsp");
        assert_eq!(entry.output, PathBuf::from("maps/de_test_d.vmf"));
        assert_eq!(entry.pak_dir, PathBuf::from("maps/de_test_d"));
        assert_eq!(entry.name(), "de_test.bsp");

        let entry = BspFileEntry::with_output("a.bsp", "out/b.vmf");
        assert_eq!(entry.pak_dir, PathBuf::from("out/b"));
    }

    #[test]
    fn generated_files() {
        assert!(is_compiler_generated("materials/maps/de_test/c0_-128_64.vtf"));
        assert!(is_compiler_generated("materials/maps/de_test/c0_-128_64.hdr.vtf"));
        assert!(is_compiler_generated("materials/maps/de_test/cubemapdefault.vtf"));
        assert!(is_compiler_generated("sp_hdr_0.vhv"));
        assert!(is_compiler_generated("materials/maps/de_test/brick/wall_wvt_patch.vmt"));
        assert!(!is_compiler_generated("materials/custom/brick.vmt"));
        assert!(!is_compiler_generated("models/props/crate.mdl"));
    }

    #[test]
    fn decompiles_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cube(dir.path(), "cube.bsp");

        let source = BspSource::new(single_thread(), vec![BspFileEntry::new(&input)]);
        let mut events = Vec::new();
        let summary = source
            .run(|event| {
                events.push(match event {
                    TaskEvent::Started { .. } => "started",
                    TaskEvent::Finished { .. } => "finished",
                    TaskEvent::Failed { .. } => "failed",
                })
            })
            .unwrap();

        assert_eq!(events, ["started", "finished"]);
        assert_eq!(summary.files, 1);
        assert_eq!(summary.finished, 1);
        assert_eq!(summary.failed, 0);

        let vmf = fs::read_to_string(dir.path().join("cube_d.vmf")).unwrap();
        assert!(vmf.starts_with("world\r\n"));
        assert!(vmf.contains("\"comment\" \"Decompiled by bspsrc"));
    }

    #[test]
    fn failures_stay_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_cube(dir.path(), "good.bsp");
        let bad = dir.path().join("bad.bsp");
        fs::write(&bad, b"not a map").unwrap();
        let missing = dir.path().join("missing.bsp");

        let entries = vec![
            BspFileEntry::new(&bad),
            BspFileEntry::new(&good),
            BspFileEntry::new(&missing),
        ];
        let config = DecompileConfig {
            threads: 2,
            ..Default::default()
        };
        let mut failed = Vec::new();
        let summary = BspSource::new(config, entries)
            .run(|event| {
                if let TaskEvent::Failed { index, error, .. } = event {
                    failed.push((*index, matches!(error, BspError::Format(_))));
                }
            })
            .unwrap();

        failed.sort_unstable();
        assert_eq!(failed, [(0, true), (2, false)]);
        assert_eq!(summary.finished, 1);
        assert_eq!(summary.failed, 2);
        assert!(dir.path().join("good_d.vmf").exists());
        assert!(!dir.path().join("bad_d.vmf").exists());
        assert_eq!(summary.to_string().split(',').next(), Some("3 files"));
    }

    fn panics_on_bad(
        config: &DecompileConfig,
        apps: &AppDb,
        entry: &BspFileEntry,
    ) -> Result<DecompileReport, BspError> {
        if entry.name() == "bad.bsp" {
            panic!("broken map");
        }
        decompile_file(config, apps, entry)
    }

    #[test]
    fn panicking_tasks_are_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_cube(dir.path(), "good.bsp");
        let bad = write_cube(dir.path(), "bad.bsp");

        let source = BspSource::new(
            single_thread(),
            vec![BspFileEntry::new(&bad), BspFileEntry::new(&good)],
        );
        let mut errors = Vec::new();
        let summary = source
            .run_jobs(panics_on_bad, |event| {
                if let TaskEvent::Failed { index, error, .. } = event {
                    errors.push((*index, error.to_string()));
                }
            })
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.finished, 1);
        assert!(!summary.stopped);
        assert_eq!(errors, [(0, "decompiler panicked: broken map".to_owned())]);
    }

    #[test]
    fn null_output_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cube(dir.path(), "cube.bsp");
        let config = DecompileConfig {
            null_output: true,
            ..single_thread()
        };
        let report = decompile_file(&config, &AppDb::new(), &BspFileEntry::new(&input)).unwrap();
        assert_eq!(report.name, "cube.bsp");
        assert_eq!(report.stats.brushes, 1);
        assert!(report.warnings.is_empty());
        assert!(report.protection_methods().is_empty());
        assert!(!dir.path().join("cube_d.vmf").exists());
    }

    #[test]
    fn lump_files_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cube(dir.path(), "cube.bsp");
        let entities = ExternalLump {
            lump: LumpType::Entities,
            offset: LUMP_FILE_HEADER_SIZE,
            version: 0,
            map_revision: 1,
            data: b"{\n\"classname\" \"worldspawn\"\n}\n{\n\"classname\" \"info_target\"\n\"origin\" \"0 0 0\"\n}\n\0".to_vec(),
        };
        fs::write(dir.path().join("cube_l_0.lmp"), entities.to_bytes()).unwrap();
        let entry = BspFileEntry::new(&input);

        let report = decompile_file(&single_thread(), &AppDb::new(), &entry).unwrap();
        assert!(report.warnings.is_empty());
        let vmf = fs::read_to_string(&entry.output).unwrap();
        assert!(vmf.contains("\"classname\" \"info_target\""));

        let config = DecompileConfig {
            load_lump_files: false,
            ..single_thread()
        };
        decompile_file(&config, &AppDb::new(), &entry).unwrap();
        let vmf = fs::read_to_string(&entry.output).unwrap();
        assert!(!vmf.contains("info_target"));
    }

    #[test]
    fn broken_lump_files_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cube(dir.path(), "cube.bsp");
        fs::write(dir.path().join("cube_l_0.lmp"), b"short").unwrap();
        let config = DecompileConfig {
            null_output: true,
            ..single_thread()
        };

        let report = decompile_file(&config, &AppDb::new(), &BspFileEntry::new(&input)).unwrap();
        assert_eq!(report.stats.brushes, 1);
        assert!(matches!(
            report.warnings.as_slice(),
            [PipelineWarning::LumpFile { file, .. }] if file == "cube_l_0.lmp"
        ));
    }

    #[test]
    fn stopped_runs_report_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cube(dir.path(), "cube.bsp");
        let source = BspSource::new(single_thread(), vec![BspFileEntry::new(&input)]);
        source.stop_handle().store(true, Ordering::Relaxed);

        let mut events = 0;
        let summary = source.run(|_| events += 1).unwrap();
        assert_eq!(events, 0);
        assert!(summary.stopped);
        assert_eq!(summary.finished, 0);
    }
}
