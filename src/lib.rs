//! A package manager for signed service parcels.
//!
//! A parcel is a signed, self-describing archive bundling a service definition, its
//! configuration files, declared options and runtime settings, and a dependency specification
//! (`requires`/`conflicts`). This crate builds and reads that archive format, maintains a
//! catalog of known parcels, and computes installation plans against it with a SAT-backed
//! dependency solver.
//!
//! The core surface is deliberately synchronous and single-threaded: building and reading a
//! parcel, and enumerating solver plans, are ordinary blocking calls. No feature here installs
//! a global logging subscriber -- that is left to binaries linking this crate.

pub mod attrs;
pub mod envelope;
pub mod error;
pub mod linter;
pub mod manifest;
pub mod pallet;
pub mod signature;
pub mod solver;
pub mod spec;
mod utils;
pub mod version;

pub use attrs::{File, ParcelOption, Setting};
pub use envelope::{load_parcel, save_parcel, Parcel};
pub use error::ParcelError;
pub use linter::lint;
pub use manifest::Manifest;
pub use pallet::Pallet;
pub use solver::Solver;
pub use spec::{Operator, Spec};
pub use version::Version;
