use std::path::PathBuf;

use clap::{ArgAction, Args};

use crate::config::Config;

// Global flags shared across every subcommand.
//
//   -c / --config   Path to a config.toml file
//   --endpoint      Base URL override
//   -v / --verbose  Debug logging
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to a config.toml file (default: ~/.tasklink/config.toml)
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "TASKLINK_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Endpoint base URL, overriding the config file
    #[arg(long, value_name = "URL", env = "TASKLINK_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Debug logging
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone()
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint.base_url = endpoint.clone();
        }
    }
}
