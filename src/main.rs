//! Rarity CLI
//!
//! Command-line interface for the rarity engine.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rarity_engine::cli::commands;
use rarity_engine::cli::{Cli, Commands};
use rarity_engine::model::TraitRef;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Rarity CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(&cli.project, cli.set.as_deref(), cmd),
        None => {
            println!("Rarity CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(project: &std::path::Path, set: Option<&str>, cmd: Commands) -> anyhow::Result<()> {
    if let Commands::Init { traits, layers } = &cmd {
        return commands::init(project, traits, layers)
            .with_context(|| format!("failed to initialize {}", project.display()));
    }

    let mut engine = commands::open_engine(project, set)
        .with_context(|| format!("failed to open project {}", project.display()))?;

    let result = match cmd {
        Commands::Init { .. } => Ok(()),
        Commands::Show { layer } => commands::show(&engine, layer.as_deref()),
        Commands::Equalize { layer } => commands::equalize(&mut engine, layer.as_deref()),
        Commands::Randomize { layer, seed } => {
            if let Some(seed) = seed {
                engine = engine.with_seed(seed);
            }
            commands::randomize(&mut engine, layer.as_deref())
        }
        Commands::Reset { layer } => commands::reset(&mut engine, layer.as_deref()),
        Commands::Skip { layer } => commands::skip(&mut engine, &layer),
        Commands::Set {
            layer,
            trait_name,
            value,
        } => commands::set_value(&mut engine, &layer, &trait_name, value),
        Commands::Lock { layer, trait_name } => {
            commands::lock(&mut engine, &layer, trait_name.as_deref())
        }
        Commands::Validate { layer } => commands::validate(&engine, layer.as_deref()),
        Commands::Global { layer } => commands::global(&engine, &layer),
        Commands::Force {
            layer_a,
            trait_a,
            layer_b,
            trait_b,
            remove,
        } => commands::force(
            &mut engine,
            &TraitRef::new(layer_a, trait_a),
            &TraitRef::new(layer_b, trait_b),
            remove,
        ),
        Commands::Incompat {
            layer_a,
            trait_a,
            layer_b,
            trait_b,
            remove,
        } => commands::incompat(
            &mut engine,
            &TraitRef::new(layer_a, trait_a),
            &TraitRef::new(layer_b, trait_b),
            remove,
        ),
        Commands::Cleanup => commands::cleanup(&mut engine),
    };

    result.map_err(|e| match e.recovery_suggestion() {
        Some(hint) => anyhow::Error::new(e).context(hint),
        None => anyhow::Error::new(e),
    })
}
