//! CLI Command Implementations
//!
//! Each command opens the project's engine, performs one operation and
//! prints the result.

use std::path::Path;

use tracing::info;

use crate::config::EngineConfig;
use crate::engine::RarityEngine;
use crate::error::Result;
use crate::model::TraitRef;
use crate::rarity::{LayerScope, OperationOutcome};
use crate::state::JsonFileStore;

type Engine = RarityEngine<JsonFileStore>;

fn load_settings(project: &Path) -> Result<EngineConfig> {
    EngineConfig::load(&EngineConfig::path_in(project))
}

/// Open the engine for `project`, switching to `set` when given.
pub fn open_engine(project: &Path, set: Option<&str>) -> Result<Engine> {
    let settings = load_settings(project)?;
    let store = JsonFileStore::new(project, settings.max_backups);
    let mut engine = RarityEngine::open(store, settings);
    if let Some(set) = set {
        engine.set_active_set(set)?;
    }
    Ok(engine)
}

/// Build a fresh rarity config from a traits folder.
pub fn init(project: &Path, traits: &Path, layers: &[String]) -> Result<()> {
    info!("Initializing rarity config in: {}", project.display());

    let settings = load_settings(project)?;
    let store = JsonFileStore::new(project, settings.max_backups);
    let layers = (!layers.is_empty()).then_some(layers);
    let engine = RarityEngine::initialize(store, settings, traits, layers)?;

    println!("Initialized {} layer(s) in set '{}'", engine.config().len(), engine.active_set());
    for (name, layer) in engine.config().layers() {
        println!("  {}: {} trait(s)", name, layer.traits.len());
    }
    Ok(())
}

/// Print every trait of one layer, or of all layers.
pub fn show(engine: &Engine, layer: Option<&str>) -> Result<()> {
    let set = engine.active_set();
    let names = match layer {
        Some(name) => {
            engine.config().require_layer(name)?;
            vec![name.to_string()]
        }
        None => engine.config().layer_names(),
    };

    println!("Set: {}", set);
    println!("{:-<60}", "");
    for name in names {
        let layer = engine.config().require_layer(&name)?;
        let state = layer.set_state(set);
        println!(
            "{}{}{}",
            name,
            if state.locked { " [locked]" } else { "" },
            if state.active { "" } else { " [inactive]" }
        );
        for (trait_name, record) in layer.records(set) {
            let mut flags = Vec::new();
            if !record.enabled {
                flags.push("disabled");
            }
            if record.locked {
                flags.push("locked");
            }
            println!("  {:<24} {:>7.2}  {}", trait_name, record.value, flags.join(", "));
        }
        println!("  {:<24} {:>7.2}", "total", layer.enabled_total(set));
    }
    Ok(())
}

fn print_outcome(action: &str, outcome: &OperationOutcome) {
    println!("{}: {} layer(s) changed", action, outcome.changed.len());
    for name in &outcome.skipped_locked {
        println!("  skipped locked layer: {}", name);
    }
}

pub fn equalize(engine: &mut Engine, layer: Option<&str>) -> Result<()> {
    let outcome = engine.equalize_rarity(LayerScope::from_option(layer))?;
    print_outcome("Equalized", &outcome);
    Ok(())
}

pub fn randomize(engine: &mut Engine, layer: Option<&str>) -> Result<()> {
    let outcome = engine.randomize_layer(LayerScope::from_option(layer))?;
    print_outcome("Randomized", &outcome);
    Ok(())
}

pub fn reset(engine: &mut Engine, layer: Option<&str>) -> Result<()> {
    let outcome = engine.reset_layer_rarity(LayerScope::from_option(layer))?;
    print_outcome("Reset", &outcome);
    Ok(())
}

pub fn skip(engine: &mut Engine, layer: &str) -> Result<()> {
    let outcome = engine.handle_skip_toggle(layer)?;
    println!(
        "Skip {} for {}{}",
        if outcome.skip_enabled { "enabled" } else { "disabled" },
        layer,
        if outcome.redistributed { " (redistributed)" } else { "" }
    );
    Ok(())
}

pub fn set_value(engine: &mut Engine, layer: &str, trait_name: &str, value: f64) -> Result<()> {
    let applied = engine.adjust_rarity_values(layer, trait_name, value)?;
    println!("{}/{} = {:.2}", layer, trait_name, applied);
    if (applied - value).abs() > f64::EPSILON {
        println!("  (requested {:.2}, clamped to the available budget)", value);
    }
    Ok(())
}

pub fn lock(engine: &mut Engine, layer: &str, trait_name: Option<&str>) -> Result<()> {
    let locked = engine.toggle_lock(layer, trait_name)?;
    let target = match trait_name {
        Some(name) => format!("{}/{}", layer, name),
        None => layer.to_string(),
    };
    println!("{} {}", target, if locked { "locked" } else { "unlocked" });
    Ok(())
}

/// Check layers against 100 and list every out-of-tolerance (layer, set).
pub fn validate(engine: &Engine, layer: Option<&str>) -> Result<()> {
    match layer {
        Some(name) => {
            let ok = engine.validate_layer_probabilities(name)?;
            println!("{}: {}", name, if ok { "OK" } else { "does not sum to 100" });
        }
        None => {
            let report = engine.diagnostics();
            if report.is_empty() {
                println!("All layers sum to 100.");
            }
            for entry in report {
                println!("{} in {}: total {:.2}", entry.layer, entry.set, entry.total);
            }
        }
    }
    Ok(())
}

pub fn global(engine: &Engine, layer: &str) -> Result<()> {
    let rows = engine.get_global_rarity_data(layer)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

pub fn force(engine: &mut Engine, a: &TraitRef, b: &TraitRef, remove: bool) -> Result<()> {
    if remove {
        let removed = engine.remove_forced_combination(a, b)?;
        println!("{}", if removed { "Removed forced pair" } else { "Pair was not forced" });
        return Ok(());
    }

    if engine.add_forced_combination(a, b)? {
        println!("Forced {} with {}", a, b);
    } else {
        println!("Pair already forced");
    }
    let resolution = engine.last_forced_resolution();
    for clamp in &resolution.clamps {
        println!("  clamped {} to {} (moved {:.2})", clamp.upper, clamp.lower, clamp.excess);
    }
    if resolution.dropped_excess > 0.0 {
        println!("  {:.2} had no recipient and was dropped", resolution.dropped_excess);
    }
    Ok(())
}

pub fn incompat(engine: &mut Engine, a: &TraitRef, b: &TraitRef, remove: bool) -> Result<()> {
    if remove {
        let removed = engine.remove_incompatibility(a, b)?;
        println!("{}", if removed { "Removed incompatibility" } else { "Pair was not incompatible" });
    } else if engine.add_incompatibility(a, b)? {
        println!("{} and {} are now incompatible", a, b);
    } else {
        println!("Pair already incompatible");
    }
    Ok(())
}

pub fn cleanup(engine: &mut Engine) -> Result<()> {
    let report = engine.cleanup_constraints()?;
    println!(
        "Removed {} forced and {} incompatible pair(s)",
        report.forced.count(),
        report.incompatible.count()
    );
    for (set, pair) in report.forced.removed.iter().chain(&report.incompatible.removed) {
        println!("  [{}] {} / {}", set, pair.a, pair.b);
    }
    Ok(())
}
