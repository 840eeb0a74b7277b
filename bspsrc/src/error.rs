use std::io;

use thiserror::Error;

use crate::bsp::consts::LumpType;

/// Structural problems with the container itself. Always fatal for the file
/// (or for the lump, when raised while decoding a single lump).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("file is {0} bytes, too small for a BSP header")]
    FileTooSmall(usize),
    #[error("unknown file identifier {0:?}")]
    BadMagic([u8; 4]),
    #[error("big-endian BSP files are not supported")]
    BigEndian,
    #[error("GoldSrc BSP (version {0}) is a different format and is not supported")]
    GoldSrc(i32),
    #[error("unsupported BSP version {0}")]
    UnsupportedVersion(i32),
    #[error("{lump:?} lump out of bounds (offset {offset}, length {length}, file size {file_size})")]
    LumpOutOfBounds {
        lump: LumpType,
        offset: i64,
        length: i64,
        file_size: usize,
    },
    #[error("game lump {tag:?} out of bounds (offset {offset}, length {length})")]
    GameLumpOutOfBounds { tag: String, offset: i64, length: i64 },
    #[error("compressed size mismatch: header declares {declared} bytes, {available} available")]
    CompressedSizeMismatch { declared: usize, available: usize },
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    DecompressedSizeMismatch { expected: usize, actual: usize },
    #[error("LZMA stream error: {0}")]
    Decompress(String),
    #[error("{what} truncated: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("invalid lump id {0} in lump file")]
    BadLumpId(i32),
    #[error("required {lump:?} lump unreadable: {reason}")]
    RequiredLump { lump: LumpType, reason: Box<FormatError> },
}

#[derive(Debug, Error)]
pub enum BspError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("embedded archive: {0}")]
    Archive(#[from] common::vfile::VFileError),
    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("decompiler panicked: {0}")]
    Panic(String),
}

/// Non-fatal problems recorded against a file's result. The file is still
/// written, these name what was lost along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Embedded archive could not be read or unpacked
    Extraction(String),
    /// Map carries anti-decompile measures; value lists the detected methods
    Protection(Vec<String>),
    /// A lump other than the geometry lumps failed to decode and was treated as empty
    Lump(LumpType, String),
    /// A `.lmp` lump file next to the map could not be loaded
    LumpFile { file: String, error: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::Extraction(e) => write!(f, "embedded file extraction failed: {e}"),
            PipelineWarning::Protection(methods) => {
                write!(f, "map is protected: {}", methods.join(", "))
            }
            PipelineWarning::Lump(lump, e) => write!(f, "{lump:?} lump skipped: {e}"),
            PipelineWarning::LumpFile { file, error } => {
                write!(f, "lump file {file} not loaded: {error}")
            }
        }
    }
}
