//! [`Pallet`]: an append-only catalog of known manifests, keyed by auto-assigned integer IDs
//! and indexed by name for search (§4.4). Catalog entries are `(id, Manifest)` pairs (§3); the
//! solver reasons over a manifest's `requires`/`conflicts` alongside its spec identity.

use std::collections::BTreeMap;

use tracing::trace;

use crate::manifest::Manifest;
use crate::spec::{Spec, SpecError};

/// A catalog of manifests. IDs start at 1 and are assigned in insertion order; nothing is ever
/// removed or renumbered.
#[derive(Debug)]
pub struct Pallet {
    entries: BTreeMap<u64, Manifest>,
    by_name: BTreeMap<String, Vec<u64>>,
    next_id: u64,
}

impl Pallet {
    pub fn new() -> Self {
        Pallet {
            entries: BTreeMap::new(),
            by_name: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Registers `manifest`, assigning and returning the next integer ID.
    pub fn add(&mut self, manifest: Manifest) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_name
            .entry(manifest.name().to_owned())
            .or_default()
            .push(id);
        self.entries.insert(id, manifest);
        trace!(id, "manifest added to pallet");
        id
    }

    pub fn get(&self, id: u64) -> Option<&Manifest> {
        self.entries.get(&id)
    }

    /// Iterates every `(id, manifest)` pair in insertion order.
    pub fn all(&self) -> impl Iterator<Item = (u64, &Manifest)> {
        self.entries.iter().map(|(id, manifest)| (*id, manifest))
    }

    /// Iterates every catalog entry whose name matches `query` and that satisfies it (§3's
    /// satisfaction semantics), in insertion order.
    pub fn search<'a>(
        &'a self,
        query: &'a Spec,
    ) -> impl Iterator<Item = Result<(u64, &'a Manifest), SpecError>> + 'a {
        self.by_name
            .get(query.name())
            .into_iter()
            .flatten()
            .filter_map(move |id| {
                let candidate = self.entries.get(id)?;
                match candidate.as_spec().satisfies(query) {
                    Ok(true) => Some(Ok((*id, candidate))),
                    Ok(false) => None,
                    Err(err) => Some(Err(err)),
                }
            })
    }
}

/// Equivalent to [`Pallet::new`] -- written by hand because the derived `Default` would leave
/// `next_id` at `0`, handing out a first ID that violates "IDs are monotonically increasing from
/// 1" (§3, §4.4).
impl Default for Pallet {
    fn default() -> Self {
        Pallet::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::version::Version;

    fn manifest(name: &str, version: &str) -> Manifest {
        Manifest::new(name, Version::parse(version).unwrap())
    }

    #[test]
    fn ids_are_assigned_from_one_in_insertion_order() {
        let mut pallet = Pallet::new();
        let a = pallet.add(manifest("foo", "1.0"));
        let b = pallet.add(manifest("bar", "2.0"));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(pallet.get(a).unwrap().name(), "foo");
    }

    #[test]
    fn default_assigns_ids_from_one_like_new() {
        let mut pallet = Pallet::default();
        assert_eq!(pallet.add(manifest("foo", "1.0")), 1);
    }

    #[test]
    fn all_iterates_everything_inserted() {
        let mut pallet = Pallet::new();
        pallet.add(manifest("foo", "1.0"));
        pallet.add(manifest("bar", "2.0"));
        let names: Vec<&str> = pallet.all().map(|(_, m)| m.name()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }

    #[test]
    fn search_matches_by_name_and_constraint() {
        let mut pallet = Pallet::new();
        pallet.add(manifest("foo", "1.0"));
        pallet.add(manifest("foo", "2.0"));
        pallet.add(manifest("bar", "1.0"));

        let query = Spec::parse("foo>=2.0").unwrap();
        let hits: Vec<u64> = pallet.search(&query).map(|r| r.unwrap().0).collect();
        assert_eq!(hits, vec![2]);
    }

    #[test]
    fn search_on_unknown_name_yields_nothing() {
        let pallet = Pallet::new();
        let query = Spec::named("missing");
        assert_eq!(pallet.search(&query).count(), 0);
    }
}
