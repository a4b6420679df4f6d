//! Structured data files for templates.
//!
//! Templates call `data(name="company", key="contact/phone")`. The store
//! finds `company.{toml,json,yaml,yml}` in the data directory, parses it
//! once per build and walks the `/`-separated key path.
//!
//! Lookup rules:
//! - no file with that stem: `null`
//! - several candidates: the first by file name wins
//! - a missing key yields an empty object, so chained lookups in templates
//!   stay falsy instead of failing the render

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const DATA_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

#[derive(Error, Debug)]
pub enum DataError {
    #[error("invalid data name {0:?}")]
    InvalidName(String),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Lazily loaded, cached data files.
#[derive(Debug)]
pub struct DataStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Option<Value>>>,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Parsed contents of data file `name`, or `None` if there is none.
    pub fn load(&self, name: &str) -> Result<Option<Value>, DataError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(DataError::InvalidName(name.to_string()));
        }
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(value) = cache.get(name) {
            return Ok(value.clone());
        }
        let value = match self.find(name)? {
            Some(path) => Some(parse_file(&path)?),
            None => None,
        };
        cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Value at `key` inside data file `name`; the whole document when `key`
    /// is `None` or empty.
    pub fn lookup(&self, name: &str, key: Option<&str>) -> Result<Value, DataError> {
        let Some(doc) = self.load(name)? else {
            return Ok(Value::Null);
        };
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return Ok(doc);
        };
        let empty = Value::Object(Default::default());
        let found = key
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(&doc, |node, part| node.get(part).unwrap_or(&empty));
        Ok(found.clone())
    }

    fn find(&self, name: &str) -> Result<Option<PathBuf>, DataError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DataError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.file_stem().is_some_and(|s| s == name))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| DATA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        candidates.sort();
        Ok(candidates.into_iter().next())
    }
}

fn parse_file(path: &Path) -> Result<Value, DataError> {
    let text = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| DataError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "toml" => toml::from_str(&text).map_err(|e| parse_error(e.to_string())),
        "json" => serde_json::from_str(&text).map_err(|e| parse_error(e.to_string())),
        _ => serde_yaml::from_str(&text).map_err(|e| parse_error(e.to_string())),
    }
}
