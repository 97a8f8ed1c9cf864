//! CLI Module
//!
//! Command-line interface for editing a project's rarity tables.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rarity CLI - configure trait probabilities for layered generative art
#[derive(Parser, Debug)]
#[command(name = "rarity-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding the rarity tables
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Set to operate on (defaults to the configured default set)
    #[arg(short, long, global = true)]
    pub set: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a fresh rarity config from a traits folder
    #[command(name = "init")]
    Init {
        /// Folder with one subfolder of trait images per layer
        #[arg(short, long)]
        traits: PathBuf,

        /// Layers to include, bottom first (defaults to every subfolder)
        #[arg(short, long, value_delimiter = ',')]
        layers: Vec<String>,
    },

    /// Print trait values
    #[command(name = "show")]
    Show {
        /// Only this layer
        layer: Option<String>,
    },

    /// Split each layer's budget equally
    #[command(name = "equalize")]
    Equalize {
        /// Only this layer
        layer: Option<String>,
    },

    /// Draw a random distribution
    #[command(name = "randomize")]
    Randomize {
        /// Only this layer
        layer: Option<String>,

        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Zero every unlocked trait
    #[command(name = "reset")]
    Reset {
        /// Only this layer
        layer: Option<String>,
    },

    /// Toggle the layer's None trait
    #[command(name = "skip")]
    Skip {
        layer: String,
    },

    /// Set one trait's value
    #[command(name = "set")]
    Set {
        layer: String,

        #[arg(value_name = "TRAIT")]
        trait_name: String,

        value: f64,
    },

    /// Toggle the lock of a trait, or of the whole layer
    #[command(name = "lock")]
    Lock {
        layer: String,

        #[arg(value_name = "TRAIT")]
        trait_name: Option<String>,
    },

    /// Check that layers sum to 100
    #[command(name = "validate")]
    Validate {
        /// Only this layer
        layer: Option<String>,
    },

    /// Show a layer's rarity across every set
    #[command(name = "global")]
    Global {
        layer: String,
    },

    /// Force two traits to appear together
    #[command(name = "force")]
    Force {
        layer_a: String,
        trait_a: String,
        layer_b: String,
        trait_b: String,

        /// Remove the pair instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Forbid two traits from appearing together
    #[command(name = "incompat")]
    Incompat {
        layer_a: String,
        trait_a: String,
        layer_b: String,
        trait_b: String,

        /// Remove the pair instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Drop constraints that reference missing or disabled traits
    #[command(name = "cleanup")]
    Cleanup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_global_options_after_subcommand() {
        let cli = Cli::parse_from(["rarity-cli", "set", "Eyes", "Glow", "42.5", "--set", "set2"]);
        assert_eq!(cli.set.as_deref(), Some("set2"));
        match cli.command {
            Some(Commands::Set {
                layer,
                trait_name,
                value,
            }) => {
                assert_eq!(layer, "Eyes");
                assert_eq!(trait_name, "Glow");
                assert_eq!(value, 42.5);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_splits_layer_list() {
        let cli = Cli::parse_from(["rarity-cli", "init", "--traits", "art", "--layers", "Background,Eyes"]);
        match cli.command {
            Some(Commands::Init { traits, layers }) => {
                assert_eq!(traits, PathBuf::from("art"));
                assert_eq!(layers, vec!["Background", "Eyes"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
