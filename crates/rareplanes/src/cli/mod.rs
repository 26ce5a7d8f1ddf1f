//! Command-line interface for rareplanes.
//!
//! Flags here override values from the configuration file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::flight::BoundingBox;
use crate::logging::Verbosity;

/// Maximum number of challenges that can be displayed.
pub const MAX_CHALLENGES: usize = 3;

/// rareplanes - Find rare aircraft flying right now
///
/// Fetches live flights worldwide, joins them against the Skycards rarity
/// catalog and shows the rarest ones in a table and on an interactive map.
#[derive(Debug, Parser)]
#[command(name = "rareplanes")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Minimum rarity score to report (e.g. 8 for all Ultras)
    #[arg(long, value_name = "SCORE", allow_negative_numbers = true)]
    pub min_rarity: Option<f64>,

    /// Only search one region: south,north,west,east
    #[arg(long, value_name = "S,N,W,E", allow_hyphen_values = true)]
    pub bounds: Option<BoundingBox>,

    /// Where to write the HTML map
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Only print the table, don't write a map
    #[arg(long)]
    pub no_map: bool,

    /// Run the live map server instead of a one-off scan
    #[arg(long)]
    pub serve: bool,

    /// With --serve, don't open the map in a browser
    #[arg(long, requires = "serve")]
    pub no_browser: bool,

    /// A challenge to display alongside the results (repeatable)
    #[arg(long = "challenge", value_name = "TEXT")]
    pub challenges: Vec<String>,
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                2 => Verbosity::Debug,
                _ => Verbosity::Trace,
            }
        }
    }

    /// Check flag combinations clap can't express.
    ///
    /// # Errors
    ///
    /// Returns an error if too many challenges were given.
    pub fn validate(&self) -> Result<()> {
        if self.challenges.len() > MAX_CHALLENGES {
            return Err(Error::TooManyChallenges {
                count: self.challenges.len(),
                max: MAX_CHALLENGES,
            });
        }
        Ok(())
    }

    /// Apply flag overrides on top of loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(min_rarity) = self.min_rarity {
            config.scan.min_rarity = min_rarity;
        }
        if let Some(output) = &self.output {
            config.map.output.clone_from(output);
        }
        config.validate()
    }

    /// The regions to fetch: the `--bounds` override or the whole world.
    #[must_use]
    pub fn regions(&self) -> Vec<BoundingBox> {
        self.bounds
            .map_or_else(crate::flight::world_regions, |bounds| vec![bounds])
    }
}
