//! Reading template files and mapping template names to paths.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::{Error, Result};

/// Reads template sources, e.g. from a theme directory.
pub trait FileReader: Send + Sync {
    /// Returns the source of the template at the given path.
    ///
    /// A file that does not exist must be reported as an
    /// [`ErrorKind::MissingResource`][crate::ErrorKind::MissingResource]
    /// error.
    fn read_template_file(&self, path: &str) -> Result<String>;
}

/// A reader over an in-memory map of paths to sources.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<String, String>,
}

/// A reader over the files below a root directory.
#[derive(Debug, Clone)]
pub struct DirReader {
    root: PathBuf,
}

/// How template names map to file paths.
#[derive(Debug, Clone)]
pub struct PathConvention {
    /// The directory `render` looks in.
    pub snippets: String,
    /// The directory sections and section groups live in.
    pub sections: String,
    /// The extension of template files, including the dot.
    pub extension: String,
    /// The directories `include` searches, in order.
    pub include_dirs: Vec<String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, returning the reader.
    pub fn with(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }
}

impl FileReader for MemoryReader {
    fn read_template_file(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::missing(format!("template file '{path}' not found")))
    }
}

impl DirReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileReader for DirReader {
    fn read_template_file(&self, path: &str) -> Result<String> {
        if path.split(['/', '\\']).any(|c| c == "..") {
            return Err(Error::missing(format!("invalid template path '{path}'")));
        }
        fs::read_to_string(self.root.join(path)).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::missing(format!("template file '{path}' not found")),
            _ => Error::from(err),
        })
    }
}

impl Default for PathConvention {
    fn default() -> Self {
        Self {
            snippets: "snippets".into(),
            sections: "sections".into(),
            extension: ".liquid".into(),
            include_dirs: vec!["snippets".into(), "sections".into(), "templates".into()],
        }
    }
}

impl PathConvention {
    pub fn snippet(&self, name: &str) -> String {
        self.file(&self.snippets, name)
    }

    pub fn section(&self, name: &str) -> String {
        self.file(&self.sections, name)
    }

    /// The path of a section group, e.g. `sections/header-group.json`.
    pub fn section_group(&self, name: &str) -> String {
        format!("{}/{}.json", self.sections, name)
    }

    /// The paths `include` tries for a name, in order.
    pub fn include_candidates(&self, name: &str) -> Vec<String> {
        self.include_dirs
            .iter()
            .map(|dir| self.file(dir, name))
            .collect()
    }

    fn file(&self, dir: &str, name: &str) -> String {
        let name = name.strip_suffix(self.extension.as_str()).unwrap_or(name);
        format!("{dir}/{name}{}", self.extension)
    }
}
