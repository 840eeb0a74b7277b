pub use crate::app::{AppDb, AppId};
pub use crate::bsp::{consts::LumpType, BspData, BspFile};
pub use crate::config::{BrushMode, ConfigError, DecompileConfig, SourceFormat};
pub use crate::decompile::{DecompileStats, Decompiler};
pub use crate::error::{BspError, FormatError, PipelineWarning};
pub use crate::orchestrator::{
    decompile_file, BspFileEntry, BspSource, DecompileReport, RunSummary, TaskEvent,
};
pub use crate::protection::ProtectionReport;
