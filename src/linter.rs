//! [`lint`]: cross-checks a [`Manifest`] against its embedded service definition (§4.6).

use std::collections::HashSet;

use thiserror::Error;
use tracing::trace;

use crate::manifest::{Manifest, ManifestError};

/// Errors raised by [`lint`]. Each variant names the offending file(s), per §4.6's "all
/// failures report the offending name(s)".
#[derive(Error, Debug)]
pub enum LintError {
    #[error("manifest has no service definition")]
    MissingServiceDefinition,
    #[error("service definition file `{0}` is missing from the manifest's files")]
    ServiceDefinitionFileMissing(String),
    #[error("config file `{0}` referenced by the service definition is missing from the manifest's files")]
    ConfigFileMissing(String),
    #[error("extra files present in parcel: {0:?}")]
    ExtraFiles(Vec<String>),
    #[error("error reading manifest")]
    Manifest(#[from] ManifestError),
}

/// Runs the five-step check sequence from §4.6 against `manifest`.
pub fn lint(manifest: &Manifest) -> Result<(), LintError> {
    let sd_name = manifest
        .service_definition()
        .ok_or(LintError::MissingServiceDefinition)?;

    if manifest.get_file(sd_name).is_none() {
        return Err(LintError::ServiceDefinitionFileMissing(sd_name.to_owned()));
    }

    let service_definition = manifest.parse_service_definition()?;
    let config_names: Vec<String> = service_definition
        .configs
        .values()
        .map(|entry| entry.file.clone())
        .collect();

    for config_name in &config_names {
        if manifest.get_file(config_name).is_none() {
            return Err(LintError::ConfigFileMissing(config_name.clone()));
        }
    }

    let mut allowed: HashSet<&str> = HashSet::new();
    allowed.insert(sd_name);
    allowed.extend(config_names.iter().map(String::as_str));

    let extra: Vec<String> = manifest
        .files()
        .iter()
        .map(|f| f.name())
        .filter(|name| !allowed.contains(name))
        .map(str::to_owned)
        .collect();

    if !extra.is_empty() {
        return Err(LintError::ExtraFiles(extra));
    }

    trace!(service_definition = sd_name, "manifest passed lint");
    Ok(())
}
