//! Store Tests
//!
//! The engine over a project directory on disk.

use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use rarity_engine::model::{TraitRef, NONE_TRAIT};
use rarity_engine::rarity::LayerScope;
use rarity_engine::state::{BackupRotation, JsonFileStore, RarityStore};
use rarity_engine::{EngineConfig, RarityEngine};

fn write_traits(root: &Path) {
    let layers: [(&str, &[&str]); 3] = [
        ("Background", &["Red.png", "Blue.png", "Green.jpg"]),
        ("Eyes", &["Glow.png", "Plain.svg", "readme.txt"]),
        ("Hat", &[]),
    ];
    for (layer, files) in layers {
        let dir = root.join(layer);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), b"").unwrap();
        }
    }
}

fn open(project: &Path) -> RarityEngine<JsonFileStore> {
    let settings = EngineConfig::default();
    let store = JsonFileStore::new(project, settings.max_backups);
    RarityEngine::open(store, settings)
}

#[test]
fn test_initialize_from_trait_folders() {
    let art = tempdir().unwrap();
    let project = tempdir().unwrap();
    write_traits(art.path());

    let store = JsonFileStore::new(project.path(), 3);
    let engine = RarityEngine::initialize(store, EngineConfig::default(), art.path(), None).unwrap();

    assert_eq!(
        engine.config().layer_names(),
        vec!["Background".to_string(), "Eyes".to_string(), "Hat".to_string()]
    );
    let background = engine.config().layer("Background").unwrap();
    assert_eq!(
        background.trait_names(),
        vec!["Blue".to_string(), "Green".to_string(), "Red".to_string(), NONE_TRAIT.to_string()]
    );
    assert_abs_diff_eq!(engine.get_rarity("Background", "Red").unwrap(), 33.34);
    assert_abs_diff_eq!(engine.get_rarity("Eyes", "Glow").unwrap(), 50.0);
    assert!(!engine.config().layer("Eyes").unwrap().has_trait("readme"));

    // A layer without images only carries the disabled None trait.
    assert_eq!(engine.config().layer("Hat").unwrap().trait_names(), vec![NONE_TRAIT.to_string()]);
    assert!(engine.diagnostics().is_empty());

    assert!(project.path().join("rarity_config.json").exists());
    assert!(project.path().join("sets.json").exists());
}

#[test]
fn test_initialize_missing_folder_fails() {
    let project = tempdir().unwrap();
    let store = JsonFileStore::new(project.path(), 3);
    let result = RarityEngine::initialize(
        store,
        EngineConfig::default(),
        &project.path().join("missing"),
        None,
    );
    assert!(result.is_err());
}

#[test]
fn test_state_survives_reopen() {
    let art = tempdir().unwrap();
    let project = tempdir().unwrap();
    write_traits(art.path());
    let layers = vec!["Background".to_string(), "Eyes".to_string()];
    let store = JsonFileStore::new(project.path(), 3);
    let mut engine =
        RarityEngine::initialize(store, EngineConfig::default(), art.path(), Some(&layers)).unwrap();

    engine.adjust_rarity_values("Background", "Red", 20.0).unwrap();
    engine
        .add_forced_combination(&TraitRef::new("Background", "Red"), &TraitRef::new("Eyes", "Glow"))
        .unwrap();
    engine.toggle_lock("Background", None).unwrap();
    let expected = engine.config().clone();

    let mut reopened = open(project.path());

    assert_eq!(reopened.config().layer_names(), expected.layer_names());
    for name in expected.layer_names() {
        let (a, b) = (reopened.config().layer(&name).unwrap(), expected.layer(&name).unwrap());
        for (trait_name, record) in b.records("set1") {
            assert_abs_diff_eq!(a.value(&trait_name, "set1"), record.value, epsilon = 0.01);
        }
        assert_eq!(a.is_locked("set1"), b.is_locked("set1"));
    }
    assert_abs_diff_eq!(reopened.get_rarity("Eyes", "Glow").unwrap(), 20.0);

    let forced = reopened.forced_combinations();
    assert!(forced.contains(&TraitRef::new("Eyes", "Glow"), &TraitRef::new("Background", "Red")));
}

#[test]
fn test_corrupt_config_opens_empty() {
    let project = tempdir().unwrap();
    fs::write(project.path().join("rarity_config.json"), "{ definitely not json").unwrap();

    let engine = open(project.path());

    assert!(engine.config().is_empty());
    assert_eq!(engine.active_set(), "set1");
}

#[test]
fn test_reload_keeps_memory_on_bad_file() {
    let art = tempdir().unwrap();
    let project = tempdir().unwrap();
    write_traits(art.path());
    let store = JsonFileStore::new(project.path(), 3);
    let mut engine = RarityEngine::initialize(store, EngineConfig::default(), art.path(), None).unwrap();

    fs::write(project.path().join("rarity_config.json"), "[]").unwrap();

    assert!(engine.reload().is_err());
    assert_eq!(engine.config().len(), 3);
}

#[test]
fn test_saves_rotate_rarity_backups() {
    let art = tempdir().unwrap();
    let project = tempdir().unwrap();
    write_traits(art.path());
    let store = JsonFileStore::new(project.path(), 2);
    let mut engine = RarityEngine::initialize(store, EngineConfig::default(), art.path(), None).unwrap();

    for _ in 0..4 {
        engine.equalize_rarity(LayerScope::All).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    let backups = BackupRotation::list_backups(&project.path().join("backups")).unwrap();
    assert_eq!(backups.len(), 2);
    assert!(engine.store().load_rarity_config().is_ok());
}
