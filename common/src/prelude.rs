pub use crate::vfile::{VFile, VFileError, VFileSystem};
