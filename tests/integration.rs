//! End-to-end coverage across manifest loading, envelope round trips, tamper detection, and
//! the solver, driven against fixtures under `tests/data` rather than checked-in binary `.pcl`
//! files (every run signs with a fresh keypair).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parcel::{load_parcel, save_parcel, lint, Manifest, Setting, Spec};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn load_example_manifest() {
    let manifest = Manifest::load(fixture("example.json")).unwrap();

    assert_eq!(manifest.name(), "example");
    assert_eq!(manifest.version().to_string(), "0.9.8");
    assert_eq!(manifest.service_definition(), Some("example.yml"));
    assert_eq!(manifest.files()[0].name(), "example.cfg");
    assert_eq!(manifest.settings()[0], Setting::new("SHANTY_OAUTH_TOKEN", None));

    let option = &manifest.options()[0];
    assert_eq!(option.name, "OPTION_A_ENABLED");
    assert_eq!(option.type_label, "boolean");
    assert_eq!(option.description, "Toggles option A");
    assert_eq!(option.default, serde_json::json!(true));
    assert!(option.value.is_none());

    lint(&manifest).expect("example manifest should lint cleanly");
}

#[test]
fn build_then_load_example_parcel() {
    let manifest = Manifest::load(fixture("example.json")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.pcl");

    let (built, _key) = save_parcel(&manifest, &path, None, false).unwrap();
    assert!(built.pubkey().is_some());
    assert!(built.signature().is_some());

    let loaded = load_parcel(&path, true).unwrap();
    let loaded_manifest = loaded.manifest();

    assert_eq!(loaded_manifest.name(), manifest.name());
    assert_eq!(loaded_manifest.version().to_string(), manifest.version().to_string());
    assert_eq!(loaded_manifest.uuid(), manifest.uuid());
    assert_eq!(loaded_manifest.service_definition(), manifest.service_definition());
    assert_eq!(loaded_manifest.description(), manifest.description());
    assert_eq!(loaded_manifest.options().len(), manifest.options().len());
    assert_eq!(loaded_manifest.settings(), manifest.settings());
    assert_eq!(loaded_manifest.requires(), manifest.requires());
    assert_eq!(loaded_manifest.conflicts(), manifest.conflicts());

    for file in manifest.files() {
        let reloaded = loaded_manifest.get_file(file.name()).expect("file should survive round trip");
        assert_eq!(reloaded.bytes(), file.bytes());
    }

    lint(loaded_manifest).expect("round-tripped example parcel should lint cleanly");
}

/// Flipping bytes anywhere in a saved parcel must break verification -- either because the
/// byte lands in the gzip/tar framing (corrupting the archive) or because it lands in the
/// signed `message`/`signature`/`pubkey` members (corrupting the cryptographic check).
///
/// The one carve-out is the gzip header's MTIME/XFL/OS field at offsets 4-9: those bytes are
/// neither part of the DEFLATE payload nor covered by the trailing CRC32/ISIZE, so
/// `GzDecoder` happily decompresses a file with any of them flipped into byte-identical
/// `message` bytes, and the signature still checks out (see `src/envelope.rs`'s module docs).
/// That sliver sits outside this format's integrity boundary; everything else is covered.
#[test]
fn tampering_anywhere_breaks_verification() {
    const GZIP_HEADER_UNPROTECTED_BYTES: std::ops::Range<usize> = 4..10;

    let manifest = Manifest::load(fixture("example.json")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.pcl");
    save_parcel(&manifest, &path, None, false).unwrap();

    let original = std::fs::read(&path).unwrap();
    assert!(load_parcel(&path, true).is_ok(), "untampered parcel must verify");

    for position in 0..original.len() {
        if GZIP_HEADER_UNPROTECTED_BYTES.contains(&position) {
            continue;
        }
        for corruption in [0x01u8, 0xffu8] {
            let mut bytes = original.clone();
            bytes[position] ^= corruption;
            if bytes == original {
                continue;
            }
            std::fs::write(&path, &bytes).unwrap();
            assert!(
                load_parcel(&path, true).is_err(),
                "byte {position} flipped by {corruption:#x} should fail verification"
            );
        }
    }

    std::fs::write(&path, &original).unwrap();
    assert!(load_parcel(&path, true).is_ok());
}

#[test]
fn spec_comparison_guard() {
    let a = Spec::parse("foobar>=1.0").unwrap();
    let b = Spec::parse("foobar==1.0").unwrap();
    assert!(a.compare(&b).is_err());
}

#[test]
fn satisfaction_matrix() {
    let eq_short = Spec::parse("foobar=1.0").unwrap();
    let eq_long = Spec::parse("foobar=1.0.0").unwrap();
    assert!(eq_short.is_satisfied_by(&eq_long).unwrap());

    let ge = Spec::parse("foobar>=1.0").unwrap();
    let two = Spec::parse("foobar=2.0").unwrap();
    assert!(ge.is_satisfied_by(&two).unwrap());

    let exact = Spec::parse("foobar==1.0").unwrap();
    let patch = Spec::parse("foobar=1.0.1").unwrap();
    assert!(!exact.is_satisfied_by(&patch).unwrap());

    let other_name = Spec::parse("barfoo=1.0").unwrap();
    assert!(!ge.is_satisfied_by(&other_name).unwrap());
}

#[test]
fn solver_upgrade_with_coupled_dependencies() {
    use parcel::version::Version;
    use parcel::{Manifest as M, Solver};

    fn manifest(name: &str, version: &str) -> M {
        M::new(name, Version::parse(version).unwrap())
    }
    fn requiring(mut m: M, specs: &[&str]) -> M {
        m.set_requires(specs.iter().map(|s| Spec::parse(s).unwrap()).collect());
        m
    }
    fn conflicting(mut m: M, specs: &[&str]) -> M {
        m.set_conflicts(specs.iter().map(|s| Spec::parse(s).unwrap()).collect());
        m
    }

    let mut solver = Solver::new();
    solver.add(requiring(manifest("foo", "1.0"), &["bar==1.0"]));
    solver.add(requiring(manifest("foo", "2.0"), &["bar==2.0"]));
    solver.add(requiring(manifest("bar", "1.0"), &["foo==1.0"]));
    solver.add(requiring(manifest("bar", "2.0"), &["foo==2.0"]));
    solver.add(requiring(
        conflicting(manifest("quux", "1.0"), &["foo", "bar"]),
        &["schmoo"],
    ));
    solver.add(manifest("baz", "1.0"));

    let installed = vec![Spec::parse("foo==1.0").unwrap(), Spec::parse("bar==1.0").unwrap()];
    let selected = vec![Spec::parse("foo==2.0").unwrap()];

    let plans: Vec<(Vec<M>, Vec<M>)> = solver
        .solve(&installed, &selected)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(plans.len(), 1);
    let (install, remove) = &plans[0];
    assert_eq!(install.len(), 2);
    assert_eq!(remove.len(), 2);

    let install_names: HashSet<&str> = install.iter().map(M::name).collect();
    assert_eq!(install_names, HashSet::from(["foo", "bar"]));
    let remove_names: HashSet<&str> = remove.iter().map(M::name).collect();
    assert_eq!(remove_names, HashSet::from(["foo", "bar"]));
}
