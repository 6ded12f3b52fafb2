//! [`Spec`]: a package name with an optional version constraint.
//!
//! A `Spec` plays two roles depending on context. As a *query*, its operator describes the
//! constraint a caller wants satisfied (`>=1.0`, name-only, ...). As a *target* -- typically the
//! identity of a [`crate::manifest::Manifest`] sitting in a catalog -- its operator is always
//! `==`, because a manifest describes one exact, concrete version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

use crate::version::{Version, VersionError};

/// Errors raised while parsing, comparing, or evaluating [`Spec`]s.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// `<`, `<=`, `>`, `>=` (or the `Ord` impl) was used on a spec whose operator is not `==`.
    #[error("specs must be absolute (operator `==`) for comparison: `{0}` is not")]
    InvalidSpecOrdering(String),
    /// Satisfaction evaluation encountered an operator it does not know how to apply.
    #[error("invalid operator: {0:?}")]
    InvalidOperator(Operator),
    #[error("invalid version in spec: {0}")]
    Version(#[from] VersionError),
}

/// The relational operator carried by a [`Spec`]'s version constraint.
///
/// The textual form `=` is always normalized to [`Operator::Eq`] on parse; it is never produced
/// by [`Spec::to_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A package identifier with an optional version constraint.
///
/// See the [module docs](self) for the query/target distinction that governs how a `Spec` is
/// interpreted by [`Spec::satisfies`] and [`Spec::is_satisfied_by`].
#[derive(Debug, Clone)]
pub struct Spec {
    name: String,
    operator: Option<Operator>,
    version: Option<Version>,
    uuid: String,
}

impl Spec {
    /// Creates a new name-only spec (matches any version of `name`).
    pub fn named(name: impl Into<String>) -> Self {
        Spec {
            name: name.into(),
            operator: None,
            version: None,
            uuid: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a new absolute (`operator`-constrained) spec.
    ///
    /// `=` is normalized to `==` as part of construction, matching [`Spec::parse`].
    pub fn new(name: impl Into<String>, operator: Operator, version: Version) -> Self {
        Spec {
            name: name.into(),
            operator: Some(operator),
            version: Some(version),
            uuid: Uuid::new_v4().to_string(),
        }
    }

    /// Overrides the UUID assigned at construction time.
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Parses `"name<op><version>"`.
    ///
    /// Operators are tried in the order `==, <=, >=, =, >, <` (two-character forms first, so
    /// that a bare `>` does not prematch inside `>=`), splitting on the *rightmost* occurrence so
    /// that package names containing the operator's characters are still handled sanely. A
    /// string with no recognized operator yields a name-only spec. `=` is rewritten to `==`.
    pub fn parse(s: &str) -> Result<Self, SpecError> {
        const OPERATORS: &[(&str, Operator)] = &[
            ("==", Operator::Eq),
            ("<=", Operator::Le),
            (">=", Operator::Ge),
            ("=", Operator::Eq),
            (">", Operator::Gt),
            ("<", Operator::Lt),
        ];

        for (token, operator) in OPERATORS {
            if let Some(index) = s.rfind(token) {
                let name = &s[..index];
                let version_str = &s[index + token.len()..];
                let version = Version::parse(version_str)?;
                return Ok(Spec::new(name, *operator, version));
            }
        }

        Ok(Spec::named(s))
    }

    /// Returns `true` iff `self` (as a query) is satisfied by `target`.
    ///
    /// `target` must be absolute (`operator == Eq`) for any operator other than name-only
    /// matching -- anything else is "not satisfied", never an error.
    pub fn is_satisfied_by(&self, target: &Spec) -> Result<bool, SpecError> {
        if self.name != target.name {
            return Ok(false);
        }

        let operator = match self.operator {
            None if self.version.is_none() => return Ok(true),
            Some(op) => op,
            None => {
                // Operator absent but a version present is not constructible via the public
                // API; treat defensively as "no constraint".
                return Ok(true);
            }
        };

        if target.operator != Some(Operator::Eq) {
            return Ok(false);
        }

        let target_version = target.version.as_ref().expect("absolute spec has a version");
        let query_version = self.version.as_ref().expect("operator implies a version");

        Ok(match operator {
            Operator::Eq => target_version == query_version,
            Operator::Ne => target_version != query_version,
            Operator::Ge => target_version >= query_version,
            Operator::Le => target_version <= query_version,
            Operator::Gt => target_version > query_version,
            Operator::Lt => target_version < query_version,
        })
    }

    /// Returns `true` iff `self` (as a target) satisfies the query `other`.
    ///
    /// Equivalent to `other.is_satisfied_by(self)`; kept as a separate method because call
    /// sites read more naturally in one direction or the other.
    pub fn satisfies(&self, other: &Spec) -> Result<bool, SpecError> {
        other.is_satisfied_by(self)
    }

    fn require_absolute(&self) -> Result<&Version, SpecError> {
        if self.operator != Some(Operator::Eq) {
            return Err(SpecError::InvalidSpecOrdering(self.to_string()));
        }
        Ok(self.version.as_ref().expect("absolute spec has a version"))
    }

    /// Orders two absolute specs by version. Both sides must have operator `==`; a non-absolute
    /// side is an error rather than a silent `false`, matching §4.1's comparison guard.
    /// Differently-named specs have no relation at all -- `Ok(None)`, not an error -- so that
    /// every comparison operator built on top of this (`<`, `<=`, `>`, `>=`) comes out `false`
    /// for them rather than comparing unrelated packages' versions against each other.
    pub fn compare(&self, other: &Spec) -> Result<Option<Ordering>, SpecError> {
        let v1 = self.require_absolute()?;
        let v2 = other.require_absolute()?;
        if self.name != other.name {
            return Ok(None);
        }
        Ok(Some(v1.cmp(v2)))
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(operator) = self.operator {
            write!(f, "{}", operator)?;
        }
        if let Some(version) = &self.version {
            write!(f, "{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for Spec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Spec::parse(s)
    }
}

/// Structural equality over `(name, operator, version)`, per §3. Note this intentionally does
/// *not* reproduce the apparent typo in the distilled source (`self.version == other.oper`) --
/// see SPEC_FULL.md §9's Open Questions.
impl PartialEq for Spec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.operator == other.operator && self.version == other.version
    }
}

impl Eq for Spec {}
