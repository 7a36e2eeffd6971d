//! Scenario: layered config loading and hashing.
//!
//! # Invariants under test
//!
//! 1. Same inputs give the same hash; key order inside a document does not
//!    matter.
//! 2. Overlays change the hash and only the keys they name.
//! 3. Files load in the order given.
//! 4. A missing file is an error naming the path.
//! 5. The merged result feeds `DeskConfig`.

use std::io::Write;

use dpass_config::{load_layered_yaml, load_layered_yaml_from_strings, DeskConfig};
use dpass_schemas::GateLayout;

const BASE: &str = r#"
layout:
  palace_gates: 16
  torchlight_gates: 16
daemon:
  addr: "127.0.0.1:8898"
  bus_capacity: 256
"#;

const BASE_REORDERED: &str = r#"
daemon:
  bus_capacity: 256
  addr: "127.0.0.1:8898"
layout:
  torchlight_gates: 16
  palace_gates: 16
"#;

const VENUE_OVERLAY: &str = r#"
layout:
  torchlight_gates: 10
"#;

#[test]
fn hash_is_stable_and_order_independent() {
    let a = load_layered_yaml_from_strings(&[BASE]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE]).unwrap();
    let c = load_layered_yaml_from_strings(&[BASE_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash, c.config_hash);
    assert_eq!(a.canonical_json, c.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn overlay_changes_hash_and_named_keys_only() {
    let base = load_layered_yaml_from_strings(&[BASE]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE, VENUE_OVERLAY]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = DeskConfig::from_config_json(&layered.config_json).unwrap();
    assert_eq!(cfg.layout, GateLayout::new(16, 10));
    assert_eq!(cfg.bus_capacity, 256);
}

#[test]
fn files_merge_in_given_order() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("base.yaml");
    let overlay_path = dir.path().join("venue.yaml");
    std::fs::File::create(&base_path)
        .unwrap()
        .write_all(BASE.as_bytes())
        .unwrap();
    std::fs::File::create(&overlay_path)
        .unwrap()
        .write_all(VENUE_OVERLAY.as_bytes())
        .unwrap();

    let base_s = base_path.to_str().unwrap();
    let overlay_s = overlay_path.to_str().unwrap();

    let forward = load_layered_yaml(&[base_s, overlay_s]).unwrap();
    assert_eq!(forward.config_json["layout"]["torchlight_gates"], 10);

    let reverse = load_layered_yaml(&[overlay_s, base_s]).unwrap();
    assert_eq!(reverse.config_json["layout"]["torchlight_gates"], 16);

    let from_strings = load_layered_yaml_from_strings(&[BASE, VENUE_OVERLAY]).unwrap();
    assert_eq!(forward.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let ghost = dir.path().join("nope.yaml");
    let ghost_s = ghost.to_str().unwrap();
    let err = load_layered_yaml(&[ghost_s]).unwrap_err();
    assert!(err.to_string().contains("nope.yaml"), "{err}");
}

#[test]
fn invalid_yaml_is_rejected() {
    let err = load_layered_yaml_from_strings(&[BASE, "layout: [unclosed"]).unwrap_err();
    assert!(err.to_string().contains("invalid yaml"), "{err}");
}
