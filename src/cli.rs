// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines global settings overrides and the init, scan and clean subcommands.

use std::path::PathBuf;

use acr_sweep::config::Overrides;
use acr_sweep::output::OutputMode;
use acr_sweep::reconcile::DeletionMode;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "acr-sweep")]
#[command(about = "Find and delete Azure Container Registry images no App Service uses")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Container registry name
    #[arg(long, global = true, env = "AZURE_ACR_NAME")]
    pub registry: Option<String>,

    /// Azure subscription ID
    #[arg(long, global = true, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,

    /// Resource group of the registry
    #[arg(long, global = true, env = "AZURE_ACR_RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    /// Age in days past which a manifest is considered old
    #[arg(long, global = true)]
    pub older_than_days: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            registry: self.registry.clone(),
            subscription: self.subscription.clone(),
            resource_group: self.resource_group.clone(),
            threshold_days: self.older_than_days,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new acr-sweep.yml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Report unused and old-but-referenced manifests without deleting
    Scan,

    /// Report, then delete unused manifests (mock or hard)
    Clean {
        /// Deletion mode: mock or hard (prompted when omitted)
        #[arg(long)]
        mode: Option<DeletionMode>,

        /// Skip the final DELETE confirmation
        #[arg(short, long)]
        yes: bool,
    },
}
