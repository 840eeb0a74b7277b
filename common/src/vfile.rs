use std::{
    collections::HashMap,
    fs,
    io::{self, BufReader, Cursor, Read},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VFileError {
    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Default, Clone, Debug)]
pub struct VFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Read-only set of files, usually the archive embedded in a map
#[derive(Default, Clone, Debug)]
pub struct VFileSystem {
    pub files: Arc<HashMap<String, VFile>>,
}

impl VFileSystem {
    /// Reads every entry of a zip archive into memory. Entries that cannot be
    /// read (unsupported method, encryption) are skipped with a warning.
    pub fn from_zip(data: &[u8]) -> Result<Self, VFileError> {
        let mut files = HashMap::new();
        if data.is_empty() {
            return Ok(Self::default());
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        for i in 0..archive.len() {
            let mut file = match archive.by_index(i) {
                Ok(file) => file,
                Err(e) => {
                    log::warn!("Cannot read archive entry {i}: {e}");
                    continue;
                }
            };
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_owned();
            let mut data = Vec::with_capacity(file.size().min(1 << 24) as usize);
            if let Err(e) = file.read_to_end(&mut data) {
                log::warn!("Cannot extract {name}: {e}");
                continue;
            }
            files.insert(name.clone(), VFile { name, data });
        }

        Ok(Self {
            files: Arc::new(files),
        })
    }

    pub fn get(&self, path: &Path) -> Option<BufReader<Cursor<&[u8]>>> {
        self.get_str(&path.to_string_lossy())
    }

    pub fn get_str(&self, path: &str) -> Option<BufReader<Cursor<&[u8]>>> {
        match self.files.get(path) {
            Some(file) => {
                let c = Cursor::new(&file.data[..]);

                Some(BufReader::new(c))
            }
            None => {
                log::debug!("{:?} file not found", path);
                None
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Case insensitive lookup of a file name anywhere in the archive
    pub fn contains_file_name(&self, file_name: &str) -> bool {
        self.files.keys().any(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .is_some_and(|n| n.eq_ignore_ascii_case(file_name))
        })
    }

    /// Entry names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.files.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes the files accepted by `filter` below `dest`. Existing files are
    /// never overwritten and entries escaping `dest` are skipped.
    /// Returns the number of files written.
    pub fn unpack(&self, dest: &Path, filter: impl Fn(&str) -> bool) -> Result<usize, VFileError> {
        fs::create_dir_all(dest)?;
        let mut written = 0;

        for name in self.names() {
            if !filter(name) {
                continue;
            }
            let Some(relative) = sanitize(name) else {
                log::warn!("Skipped {name} (path traversal attempt)");
                continue;
            };
            let path = dest.join(relative);
            if path.exists() {
                log::warn!("Skipped {name} (exists)");
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            log::info!("Extracting {name}");
            fs::write(&path, &self.files[name].data)?;
            written += 1;
        }
        Ok(written)
    }
}

/// Relative path of an entry, `None` if it would leave the destination
fn sanitize(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(&name.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}
