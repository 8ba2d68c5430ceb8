//! The capability contract every engine implements, plus example discovery.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::sink::OutputSink;

/// A language handler the host can select and drive interchangeably.
pub trait Engine {
    /// Stable identifier used for editor highlighting. Distinct per engine.
    fn language_id(&self) -> &'static str;

    /// Executes or renders `source`, writing every result into `sink`.
    /// Never fails: problems are reported through [`OutputSink::fault`].
    fn run(&self, source: &str, sink: &mut dyn OutputSink);

    /// Bundled example snippets, sorted by path. Empty when the catalog
    /// cannot be read.
    fn list_examples(&self) -> Vec<ExampleRef>;
}

/// Root of the example snippets shipped with the crate.
pub fn bundled_examples_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos")
}

/// A discovered example file and its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleRef {
    pub path: PathBuf,
    pub name: String,
}

impl ExampleRef {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|stem| humanize(&stem.to_string_lossy()))
            .unwrap_or_default();
        Self { path, name }
    }

    pub fn read(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }
}

/// `03_http_requests` becomes `03 Http Requests`.
pub fn humanize(stem: &str) -> String {
    stem.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One directory of examples sharing a file extension. Subdirectories are
/// not searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleCatalog {
    dir: PathBuf,
    extension: &'static str,
}

impl ExampleCatalog {
    pub fn new(dir: impl Into<PathBuf>, extension: &'static str) -> Self {
        Self {
            dir: dir.into(),
            extension,
        }
    }

    /// The catalog for `subdir` of the bundled examples root.
    pub fn bundled(subdir: &str, extension: &'static str) -> Self {
        Self::new(bundled_examples_root().join(subdir), extension)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn list(&self) -> Vec<ExampleRef> {
        match self.scan() {
            Ok(examples) => examples,
            Err(err) => {
                log::warn!("cannot list examples in {}: {err}", self.dir.display());
                Vec::new()
            }
        }
    }

    fn scan(&self) -> Result<Vec<ExampleRef>, walkdir::Error> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == self.extension)
            {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        Ok(paths.into_iter().map(ExampleRef::new).collect())
    }
}

