//! Small value types attached to a [`crate::manifest::Manifest`]: [`Option`], [`Setting`], and
//! [`File`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while materializing a [`File`] from the filesystem.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("path `{0}` does not exist")]
    NotFound(String),
    #[error("error reading `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A declared, user-configurable option on a parcel.
///
/// `type_label` is deliberately uninterpreted -- the system never branches on its value, it is
/// metadata for whatever configures the parcel at install time.
#[derive(Debug, Clone)]
pub struct ParcelOption {
    pub name: String,
    pub type_label: String,
    pub description: String,
    pub default: Value,
    pub value: Option<Value>,
}

impl ParcelOption {
    pub fn new(
        name: impl Into<String>,
        type_label: impl Into<String>,
        description: impl Into<String>,
        default: Value,
        value: Option<Value>,
    ) -> Self {
        ParcelOption {
            name: name.into(),
            type_label: type_label.into(),
            description: description.into(),
            default,
            value,
        }
    }
}

impl PartialEq for ParcelOption {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ParcelOption {}

/// A runtime setting name, with an optional configured value.
#[derive(Debug, Clone)]
pub struct Setting {
    pub name: String,
    pub value: Option<Value>,
}

impl Setting {
    pub fn new(name: impl Into<String>, value: Option<Value>) -> Self {
        Setting {
            name: name.into(),
            value,
        }
    }
}

impl PartialEq for Setting {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Setting {}

/// An embedded file: a basename paired with opaque byte contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    bytes: Vec<u8>,
}

impl File {
    /// Reads the file at `path` eagerly, using its basename as the [`File::name`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FileError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path).map_err(|source| FileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(File { name, bytes })
    }

    /// Builds a file directly from in-memory bytes, taking only the basename of `name`.
    pub fn from_bytes(name: impl AsRef<Path>, bytes: Vec<u8>) -> Self {
        let name = name
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.as_ref().to_string_lossy().into_owned());
        File { name, bytes }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Serialization shape used only for the `options` array inside the canonical manifest
/// document. `value` is intentionally dropped -- see §4.2.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OptionDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub type_label: String,
    pub description: String,
    pub default: Value,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn option_equality_is_by_name() {
        let a = ParcelOption::new("A", "bool", "desc", Value::Bool(true), None);
        let b = ParcelOption::new("A", "string", "other desc", Value::Null, Some(Value::Bool(false)));
        assert_eq!(a, b);
    }

    #[test]
    fn setting_equality_is_by_name() {
        assert_eq!(Setting::new("A", None), Setting::new("A", Some(Value::from("x"))));
    }

    #[test]
    fn file_from_bytes_takes_basename() {
        let f = File::from_bytes("some/dir/example.cfg", b"hello".to_vec());
        assert_eq!(f.name(), "example.cfg");
        assert_eq!(f.bytes(), b"hello");
    }

    #[test]
    fn file_from_path_missing_errors() {
        assert!(matches!(
            File::from_path("/nonexistent/path/to/file"),
            Err(FileError::NotFound(_))
        ));
    }
}
