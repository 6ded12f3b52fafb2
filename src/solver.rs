//! [`Solver`]: encodes a catalog plus currently-installed and user-selected specs as a CNF
//! formula over variables that are exactly the catalog's integer IDs, feeds it to a SAT engine,
//! and lazily decodes every satisfying model into an `(install, remove)` plan (§4.5).

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, trace};
use varisat::{ExtendFormula, Lit};

use crate::manifest::Manifest;
use crate::pallet::Pallet;
use crate::spec::{Operator, Spec, SpecError};

/// Errors raised while building or solving the dependency CNF.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("invalid spec used as solver input")]
    Spec(#[from] SpecError),
    #[error("installed/selected spec `{0}` has no version; the solver needs an absolute spec")]
    MissingVersion(String),
    #[error("SAT engine error")]
    Sat(#[from] varisat::solver::SolverError),
}

/// Encodes the dependency universe and enumerates installation plans.
#[derive(Debug)]
pub struct Solver {
    pallet: Pallet,
}

impl Solver {
    pub fn new() -> Self {
        Solver {
            pallet: Pallet::new(),
        }
    }

    pub fn pallet(&self) -> &Pallet {
        &self.pallet
    }

    /// Adds `manifest` to the underlying catalog, returning its assigned ID.
    pub fn add(&mut self, manifest: Manifest) -> u64 {
        self.pallet.add(manifest)
    }

    fn lit(id: u64, positive: bool) -> Lit {
        let dimacs = id as isize;
        Lit::from_dimacs(if positive { dimacs } else { -dimacs })
    }

    /// One clause per catalog entry enforcing that at most one version of a name is installed,
    /// plus the entry's own conflicts/requires clauses (§4.5 steps 1-3).
    fn packages_cnf(&self) -> Result<Vec<Vec<Lit>>, SolverError> {
        let mut clauses = Vec::new();
        for (id, manifest) in self.pallet.all() {
            let version = manifest.version().clone();
            let not_this_version = Spec::new(manifest.name(), Operator::Ne, version);
            for found in self.pallet.search(&not_this_version) {
                let (other_id, _) = found?;
                if other_id == id {
                    continue;
                }
                clauses.push(vec![Self::lit(id, false), Self::lit(other_id, false)]);
            }

            for conflict in manifest.conflicts() {
                let mut clause = vec![Self::lit(id, false)];
                for found in self.pallet.search(conflict) {
                    let (cid, _) = found?;
                    clause.push(Self::lit(cid, false));
                }
                clauses.push(clause);
            }

            for requirement in manifest.requires() {
                let mut clause = vec![Self::lit(id, false)];
                for found in self.pallet.search(requirement) {
                    let (rid, _) = found?;
                    clause.push(Self::lit(rid, true));
                }
                clauses.push(clause);
            }
        }
        Ok(clauses)
    }

    /// One clause per installed spec forbidding downgrades below the installed version.
    fn installed_cnf(&self, installed: &[Spec]) -> Result<Vec<Vec<Lit>>, SolverError> {
        installed
            .iter()
            .map(|spec| {
                let version = spec
                    .version()
                    .cloned()
                    .ok_or_else(|| SolverError::MissingVersion(spec.to_string()))?;
                let query = Spec::new(spec.name(), Operator::Ge, version);
                let clause = self
                    .pallet
                    .search(&query)
                    .map(|found| found.map(|(id, _)| Self::lit(id, true)))
                    .collect::<Result<Vec<_>, SpecError>>()?;
                Ok(clause)
            })
            .collect()
    }

    /// One clause per user-selected spec forcing at least one matching catalog entry to be
    /// installed.
    fn selected_cnf(&self, selected: &[Spec]) -> Result<Vec<Vec<Lit>>, SolverError> {
        selected
            .iter()
            .map(|spec| {
                let clause = self
                    .pallet
                    .search(spec)
                    .map(|found| found.map(|(id, _)| Self::lit(id, true)))
                    .collect::<Result<Vec<_>, SpecError>>()?;
                Ok(clause)
            })
            .collect()
    }

    /// The set of catalog IDs matching any installed spec under `(name, >=, version)` -- the
    /// same query used by [`Solver::installed_cnf`]. Used to decide which negative literals in
    /// a model count as "removed" rather than merely "not selected".
    fn installed_ids(&self, installed: &[Spec]) -> Result<HashSet<u64>, SolverError> {
        let mut ids = HashSet::new();
        for spec in installed {
            let version = spec
                .version()
                .cloned()
                .ok_or_else(|| SolverError::MissingVersion(spec.to_string()))?;
            let query = Spec::new(spec.name(), Operator::Ge, version);
            for found in self.pallet.search(&query) {
                let (id, _) = found?;
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    /// Solves for `installed`/`selected` and returns a lazy iterator over every satisfying
    /// `(install, remove)` plan. The SAT engine is driven one model at a time; each model is
    /// excluded by a blocking clause before the next solve, so enumeration can be abandoned
    /// early by simply dropping the iterator.
    pub fn solve(&self, installed: &[Spec], selected: &[Spec]) -> Result<Plans<'_>, SolverError> {
        let mut solver = varisat::Solver::new();

        let mut clause_count = 0;
        for clause in self
            .packages_cnf()?
            .into_iter()
            .chain(self.installed_cnf(installed)?)
            .chain(self.selected_cnf(selected)?)
        {
            solver.add_clause(&clause);
            clause_count += 1;
        }
        debug!(clause_count, "dependency CNF built");

        Ok(Plans {
            pallet: &self.pallet,
            solver,
            installed_ids: self.installed_ids(installed)?,
            exhausted: false,
        })
    }
}

/// Equivalent to [`Solver::new`] -- written by hand rather than derived, since a derived
/// `Default` would go through [`Pallet`]'s own `Default` impl indirectly; spelling it out keeps
/// `Solver::default()` from silently breaking again if `Pallet`'s fields ever change (§3, §4.4:
/// catalog IDs start at 1, and `Solver::lit` panics on ID `0`).
impl Default for Solver {
    fn default() -> Self {
        Solver::new()
    }
}

/// A lazy, pull-based sequence of `(install, remove)` plans. Each [`Iterator::next`] call drives
/// the SAT engine for exactly one more model (§5: the SAT enumeration is a lazy producer).
pub struct Plans<'a> {
    pallet: &'a Pallet,
    solver: varisat::Solver<'static>,
    installed_ids: HashSet<u64>,
    exhausted: bool,
}

impl<'a> Iterator for Plans<'a> {
    type Item = Result<(Vec<Manifest>, Vec<Manifest>), SolverError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.solver.solve() {
            Ok(true) => {}
            Ok(false) => {
                self.exhausted = true;
                return None;
            }
            Err(err) => {
                self.exhausted = true;
                return Some(Err(err.into()));
            }
        }

        let model = self.solver.model().expect("solve() returned true");
        trace!(literals = model.len(), "model decoded");

        let mut install = Vec::new();
        let mut remove = Vec::new();
        let mut blocking = Vec::with_capacity(model.len());
        for lit in &model {
            let dimacs = lit.to_dimacs();
            let id = dimacs.unsigned_abs();
            blocking.push(Lit::from_dimacs(-dimacs));
            if dimacs > 0 {
                if let Some(manifest) = self.pallet.get(id) {
                    install.push(manifest.clone());
                }
            } else if self.installed_ids.contains(&id) {
                if let Some(manifest) = self.pallet.get(id) {
                    remove.push(manifest.clone());
                }
            }
        }
        self.solver.add_clause(&blocking);

        Some(Ok((install, remove)))
    }
}
