use thiserror::Error;

use crate::envelope::EnvelopeError;
use crate::linter::LintError;
use crate::manifest::ManifestError;
use crate::signature::SignatureError;
use crate::solver::SolverError;
use crate::spec::SpecError;
use crate::version::VersionError;

/// The crate-level error type. Each component raises its own error enum; this aggregates them
/// for callers (notably the CLI) that don't want to match on which component failed.
#[derive(Error, Debug)]
pub enum ParcelError {
    #[error("version error")]
    Version(#[from] VersionError),
    #[error("spec error")]
    Spec(#[from] SpecError),
    #[error("manifest error")]
    Manifest(#[from] ManifestError),
    #[error("envelope error")]
    Envelope(#[from] EnvelopeError),
    #[error("signature error")]
    Signature(#[from] SignatureError),
    #[error("solver error")]
    Solver(#[from] SolverError),
    #[error("lint error")]
    Lint(#[from] LintError),
}
