//! [`Manifest`]: the typed, mutable in-memory model of a parcel's metadata and embedded files.
//!
//! A manifest carries a [`Spec`](crate::spec::Spec) identity (name, version, uuid, operator
//! fixed to `==`) plus everything else described in the parcel's JSON document: options,
//! settings, requirements, conflicts, and the files it embeds.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::attrs::{File, FileError, OptionDoc, ParcelOption, Setting};
use crate::spec::{Operator, Spec, SpecError};
use crate::version::{Version, VersionError};

/// Errors raised while constructing, loading, or serializing a [`Manifest`].
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("source file is missing")]
    FileNotFound(#[from] FileError),
    #[error("invalid spec in manifest: {0}")]
    Spec(#[from] SpecError),
    #[error("invalid version in manifest: {0}")]
    Version(#[from] VersionError),
    #[error("error reading manifest from disk")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest JSON")]
    Json(#[from] serde_json::Error),
    #[error("invalid service-definition YAML")]
    Yaml(#[from] serde_yaml::Error),
    #[error("manifest document is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("manifest document field `{0}` has the wrong shape")]
    MalformedField(&'static str),
    #[error("duplicate {kind} name `{name}`")]
    Duplicate { kind: &'static str, name: String },
    #[error("file `{0}` referenced by the manifest was not supplied")]
    MissingReferencedFile(String),
}

/// The service definition embedded in a parcel: a YAML document whose only structure this
/// system understands is the top-level `configs` map (§4.2, §6).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub configs: BTreeMap<String, ConfigEntry>,
    #[serde(flatten)]
    pub other: serde_yaml::Mapping,
}

/// One entry under `configs` in a service definition: at minimum, the basename of a config
/// file. Other keys are opaque and ignored by the linter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigEntry {
    pub file: String,
    #[serde(flatten)]
    pub other: serde_yaml::Mapping,
}

/// The in-memory model of a parcel's metadata and embedded file contents.
#[derive(Debug, Clone)]
pub struct Manifest {
    name: String,
    version: Version,
    uuid: String,
    description: Option<String>,
    service_definition: Option<String>,
    options: Vec<ParcelOption>,
    settings: Vec<Setting>,
    requires: Vec<Spec>,
    conflicts: Vec<Spec>,
    files: Vec<File>,
    /// Unrecognized top-level document keys, preserved so a load/save round trip does not
    /// silently drop data this crate does not understand (§6).
    extra: Map<String, Value>,
}

impl Manifest {
    /// Creates an empty manifest with a freshly generated UUID.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Manifest {
            name: name.into(),
            version,
            uuid: Uuid::new_v4().to_string(),
            description: None,
            service_definition: None,
            options: Vec::new(),
            settings: Vec::new(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            files: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn service_definition(&self) -> Option<&str> {
        self.service_definition.as_deref()
    }

    /// Sets the service definition. If `file` is not already present among [`Manifest::files`]
    /// (matched by name), any existing file of that name is replaced and the new content is
    /// added, mirroring the distilled source's `del_file` + `add_file` pair.
    pub fn set_service_definition(&mut self, file: File) {
        self.service_definition = Some(file.name().to_owned());
        self.add_file(file);
    }

    pub fn options(&self) -> &[ParcelOption] {
        &self.options
    }

    pub fn set_options(&mut self, options: Vec<ParcelOption>) -> Result<(), ManifestError> {
        ensure_unique(&options, |o| o.name.as_str(), "option")?;
        self.options = options;
        Ok(())
    }

    /// Builds options from a `name -> {type, description, default, value}` mapping, the shape
    /// produced by a manifest JSON document's `options` object form.
    pub fn options_from_map(map: Map<String, Value>) -> Result<Vec<ParcelOption>, ManifestError> {
        map.into_iter()
            .map(|(name, body)| {
                let body = body
                    .as_object()
                    .ok_or(ManifestError::MalformedField("options"))?;
                let type_label = body
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let description = body
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let default = body.get("default").cloned().unwrap_or(Value::Null);
                let value = body.get("value").cloned().filter(|v| !v.is_null());
                Ok(ParcelOption::new(name, type_label, description, default, value))
            })
            .collect()
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Vec<Setting>) -> Result<(), ManifestError> {
        ensure_unique(&settings, |s| s.name.as_str(), "setting")?;
        self.settings = settings;
        Ok(())
    }

    /// Builds settings from a bare list of names (no configured values).
    pub fn settings_from_names(names: Vec<String>) -> Vec<Setting> {
        names.into_iter().map(|n| Setting::new(n, None)).collect()
    }

    /// Builds settings from a `name -> value` mapping.
    pub fn settings_from_map(map: Map<String, Value>) -> Vec<Setting> {
        map.into_iter()
            .map(|(name, value)| Setting::new(name, Some(value)))
            .collect()
    }

    pub fn requires(&self) -> &[Spec] {
        &self.requires
    }

    pub fn set_requires(&mut self, requires: Vec<Spec>) {
        self.requires = requires;
    }

    pub fn conflicts(&self) -> &[Spec] {
        &self.conflicts
    }

    pub fn set_conflicts(&mut self, conflicts: Vec<Spec>) {
        self.conflicts = conflicts;
    }

    /// Parses a list of `"name==1.0"`-style strings into [`Spec`]s, for the `requires` /
    /// `conflicts` loose-input form.
    pub fn specs_from_strs(specs: &[String]) -> Result<Vec<Spec>, ManifestError> {
        specs
            .iter()
            .map(|s| Spec::parse(s).map_err(ManifestError::from))
            .collect()
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// Adds a file, replacing any existing file of the same basename. This is what keeps
    /// `files` unique by name (§3's invariant) without requiring callers to check first.
    pub fn add_file(&mut self, file: File) {
        self.del_file(file.name());
        self.files.push(file);
    }

    pub fn del_file(&mut self, name: &str) -> Option<File> {
        let index = self.files.iter().position(|f| f.name() == name)?;
        Some(self.files.remove(index))
    }

    pub fn get_file(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|f| f.name() == name)
    }

    /// Returns this manifest's identity as a [`Spec`] (operator always `==`).
    pub fn as_spec(&self) -> Spec {
        Spec::new(self.name.clone(), Operator::Eq, self.version.clone()).with_uuid(self.uuid.clone())
    }

    /// Parses the embedded service definition as YAML.
    pub fn parse_service_definition(&self) -> Result<ServiceDefinition, ManifestError> {
        let name = self
            .service_definition
            .as_deref()
            .ok_or(ManifestError::MissingField("service_definition"))?;
        let file = self
            .get_file(name)
            .ok_or_else(|| ManifestError::MissingReferencedFile(name.to_owned()))?;
        Ok(serde_yaml::from_slice(file.bytes())?)
    }

    /// Loads a manifest from a JSON document on disk. Every basename under `files` and
    /// `service_definition` is resolved against `path`'s directory and read eagerly (§4.2).
    pub fn load(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let raw = std::fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(&raw)?;
        let fields = DocumentFields::extract(doc)?;

        let mut files = Vec::new();
        for name in &fields.file_names {
            files.push(File::from_path(dir.join(name))?);
        }
        if let Some(sd) = &fields.service_definition {
            if !files.iter().any(|f| f.name() == sd) {
                files.push(File::from_path(dir.join(sd))?);
            }
        }

        fields.into_manifest(files)
    }

    /// Reconstitutes a manifest from an already-parsed JSON document and a pool of files whose
    /// contents were extracted from elsewhere (the envelope's inner TAR). Every basename the
    /// document lists under `files`/`service_definition` must be present in `available`.
    pub fn from_document(doc: Value, available: Vec<File>) -> Result<Manifest, ManifestError> {
        let fields = DocumentFields::extract(doc)?;

        let mut pool: BTreeMap<String, File> = available
            .into_iter()
            .map(|f| (f.name().to_owned(), f))
            .collect();

        let mut files = Vec::new();
        for name in &fields.file_names {
            let file = pool
                .remove(name)
                .ok_or_else(|| ManifestError::MissingReferencedFile(name.clone()))?;
            files.push(file);
        }
        if let Some(sd) = &fields.service_definition {
            if !files.iter().any(|f| f.name() == sd) {
                let file = pool
                    .remove(sd)
                    .ok_or_else(|| ManifestError::MissingReferencedFile(sd.clone()))?;
                files.push(file);
            }
        }

        fields.into_manifest(files)
    }

    /// Writes this manifest's canonical JSON document to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let bytes = serde_json::to_vec_pretty(&self.document())?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serializes this manifest into the canonical manifest document (§4.2): a JSON value with
    /// a fixed key order and the `value` field dropped from each option.
    pub fn document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("name".into(), Value::String(self.name.clone()));
        doc.insert("version".into(), Value::String(self.version.to_string()));
        doc.insert("uuid".into(), Value::String(self.uuid.clone()));
        if let Some(description) = &self.description {
            doc.insert("description".into(), Value::String(description.clone()));
        }
        doc.insert(
            "options".into(),
            Value::Array(
                self.options
                    .iter()
                    .map(|o| {
                        serde_json::to_value(OptionDoc {
                            name: o.name.clone(),
                            type_label: o.type_label.clone(),
                            description: o.description.clone(),
                            default: o.default.clone(),
                        })
                        .expect("OptionDoc always serializes")
                    })
                    .collect(),
            ),
        );
        doc.insert(
            "settings".into(),
            Value::Array(
                self.settings
                    .iter()
                    .map(|s| Value::String(s.name.clone()))
                    .collect(),
            ),
        );
        doc.insert(
            "requires".into(),
            Value::Array(self.requires.iter().map(|s| Value::String(s.to_string())).collect()),
        );
        doc.insert(
            "conflicts".into(),
            Value::Array(self.conflicts.iter().map(|s| Value::String(s.to_string())).collect()),
        );
        doc.insert(
            "files".into(),
            Value::Array(self.files.iter().map(|f| Value::String(f.name().to_owned())).collect()),
        );
        if let Some(sd) = &self.service_definition {
            doc.insert("service_definition".into(), Value::String(sd.clone()));
        }
        for (key, value) in &self.extra {
            doc.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(doc)
    }
}

/// Intermediate representation shared by [`Manifest::load`] and [`Manifest::from_document`]: the
/// typed fields plus the raw lists of basenames that still need to be resolved into [`File`]s by
/// the caller (from disk, or from an already-extracted pool).
struct DocumentFields {
    name: String,
    version: Version,
    uuid: String,
    description: Option<String>,
    service_definition: Option<String>,
    file_names: Vec<String>,
    options: Vec<ParcelOption>,
    settings: Vec<Setting>,
    requires: Vec<Spec>,
    conflicts: Vec<Spec>,
    extra: Map<String, Value>,
}

impl DocumentFields {
    fn extract(doc: Value) -> Result<Self, ManifestError> {
        let mut obj = match doc {
            Value::Object(obj) => obj,
            _ => return Err(ManifestError::MalformedField("<root>")),
        };

        let name = take_string(&mut obj, "name")?;
        let version_str = take_string(&mut obj, "version")?;
        let version = Version::parse(&version_str)?;
        let uuid = obj
            .remove("uuid")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let description = obj.remove("description").and_then(|v| v.as_str().map(str::to_owned));
        let service_definition = obj
            .remove("service_definition")
            .and_then(|v| v.as_str().map(str::to_owned));

        let file_names = match obj.remove("files") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_owned)
                        .ok_or(ManifestError::MalformedField("files"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(ManifestError::MalformedField("files")),
            None => Vec::new(),
        };

        let options = match obj.remove("options") {
            Some(Value::Object(map)) => Manifest::options_from_map(map)?,
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    let item = item.as_object().ok_or(ManifestError::MalformedField("options"))?;
                    let name = item
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or(ManifestError::MalformedField("options"))?
                        .to_owned();
                    let type_label = item
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned();
                    let description = item
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned();
                    let default = item.get("default").cloned().unwrap_or(Value::Null);
                    let value = item.get("value").cloned().filter(|v| !v.is_null());
                    Ok(ParcelOption::new(name, type_label, description, default, value))
                })
                .collect::<Result<Vec<_>, ManifestError>>()?,
            Some(_) => return Err(ManifestError::MalformedField("options")),
            None => Vec::new(),
        };
        ensure_unique(&options, |o| o.name.as_str(), "option")?;

        let settings = match obj.remove("settings") {
            Some(Value::Object(map)) => Manifest::settings_from_map(map),
            Some(Value::Array(items)) => {
                let names = items
                    .into_iter()
                    .map(|v| v.as_str().map(str::to_owned).ok_or(ManifestError::MalformedField("settings")))
                    .collect::<Result<Vec<_>, _>>()?;
                Manifest::settings_from_names(names)
            }
            Some(_) => return Err(ManifestError::MalformedField("settings")),
            None => Vec::new(),
        };
        ensure_unique(&settings, |s| s.name.as_str(), "setting")?;

        let requires = Manifest::specs_from_strs(&take_string_list(&mut obj, "requires")?)?;
        let conflicts = Manifest::specs_from_strs(&take_string_list(&mut obj, "conflicts")?)?;

        Ok(DocumentFields {
            name,
            version,
            uuid,
            description,
            service_definition,
            file_names,
            options,
            settings,
            requires,
            conflicts,
            extra: obj,
        })
    }

    fn into_manifest(self, files: Vec<File>) -> Result<Manifest, ManifestError> {
        Ok(Manifest {
            name: self.name,
            version: self.version,
            uuid: self.uuid,
            description: self.description,
            service_definition: self.service_definition,
            options: self.options,
            settings: self.settings,
            requires: self.requires,
            conflicts: self.conflicts,
            files,
            extra: self.extra,
        })
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &'static str) -> Result<String, ManifestError> {
    obj.remove(key)
        .and_then(|v| v.as_str().map(str::to_owned))
        .ok_or(ManifestError::MissingField(key))
}

fn take_string_list(obj: &mut Map<String, Value>, key: &'static str) -> Result<Vec<String>, ManifestError> {
    match obj.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| v.as_str().map(str::to_owned).ok_or(ManifestError::MalformedField(key)))
            .collect(),
        Some(_) => Err(ManifestError::MalformedField(key)),
        None => Ok(Vec::new()),
    }
}

fn ensure_unique<T>(
    items: &[T],
    name_of: impl Fn(&T) -> &str,
    kind: &'static str,
) -> Result<(), ManifestError> {
    let mut seen = std::collections::HashSet::new();
    for item in items {
        let name = name_of(item);
        if !seen.insert(name) {
            return Err(ManifestError::Duplicate {
                kind,
                name: name.to_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_manifest_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        write_temp(&dir, "example.cfg", "key=value\n");
        write_temp(
            &dir,
            "example.yml",
            "configs:\n  main:\n    file: example.cfg\n",
        );
        let manifest_json = r#"{
            "name": "example",
            "version": "0.9.8",
            "description": "An example parcel.",
            "service_definition": "example.yml",
            "files": ["example.cfg"],
            "settings": ["SHANTY_OAUTH_TOKEN"],
            "options": [
                {"name": "OPTION_A_ENABLED", "type": "boolean", "description": "Toggles option A", "default": true}
            ]
        }"#;
        let path = write_temp(&dir, "example.json", manifest_json);

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.name(), "example");
        assert_eq!(manifest.version().to_string(), "0.9.8");
        assert_eq!(manifest.service_definition(), Some("example.yml"));
        assert_eq!(manifest.files()[0].name(), "example.cfg");
        assert_eq!(manifest.settings()[0], Setting::new("SHANTY_OAUTH_TOKEN", None));
        let option = &manifest.options()[0];
        assert_eq!(option.name, "OPTION_A_ENABLED");
        assert_eq!(option.type_label, "boolean");
        assert_eq!(option.description, "Toggles option A");
        assert_eq!(option.default, Value::Bool(true));
        assert!(option.value.is_none());
    }

    #[test]
    fn add_file_replaces_same_name() {
        let mut m = Manifest::new("example", Version::parse("1.0").unwrap());
        m.add_file(File::from_bytes("a.cfg", b"one".to_vec()));
        m.add_file(File::from_bytes("a.cfg", b"two".to_vec()));
        assert_eq!(m.files().len(), 1);
        assert_eq!(m.get_file("a.cfg").unwrap().bytes(), b"two");
    }

    #[test]
    fn duplicate_option_names_rejected() {
        let mut m = Manifest::new("example", Version::parse("1.0").unwrap());
        let options = vec![
            ParcelOption::new("A", "bool", "one", Value::Bool(true), None),
            ParcelOption::new("A", "bool", "two", Value::Bool(false), None),
        ];
        assert!(matches!(
            m.set_options(options),
            Err(ManifestError::Duplicate { .. })
        ));
    }

    #[test]
    fn document_preserves_insertion_order_and_drops_option_value() {
        let mut m = Manifest::new("example", Version::parse("1.0").unwrap());
        m.set_options(vec![ParcelOption::new(
            "A",
            "bool",
            "d",
            Value::Bool(true),
            Some(Value::Bool(false)),
        )])
        .unwrap();
        m.set_requires(vec![Spec::parse("other==1.0").unwrap()]);

        let doc = m.document();
        let obj = doc.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["name", "version", "uuid", "options", "settings", "requires", "conflicts", "files"]
        );
        let options = obj["options"].as_array().unwrap();
        assert!(options[0].as_object().unwrap().get("value").is_none());
        assert_eq!(obj["requires"], serde_json::json!(["other==1.0"]));
    }
}
