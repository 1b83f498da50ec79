//! Command line arguments.

use super::app_config::LogLevel;
use crate::domain::entities::{CoverArtKind, DisplayContext};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Global flags plus the subcommand to run. Every flag overrides `config.toml`.
#[derive(Debug, Parser)]
#[command(
    name = "sonicart",
    version,
    about = "Fetch and cache cover art from a Subsonic-compatible music server",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", env = "SONICART_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", env = "SONICART_LOG_PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, env = "SONICART_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Music server root URL.
    #[arg(long, value_name = "URL", env = "SONICART_SERVER_URL")]
    pub server_url: Option<String>,

    /// Music server username.
    #[arg(long, env = "SONICART_USERNAME")]
    pub username: Option<String>,

    /// Salted password token.
    #[arg(long, env = "SONICART_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Salt used for the token.
    #[arg(long, env = "SONICART_SALT", hide_env_values = true)]
    pub salt: Option<String>,

    /// Disk cache directory.
    #[arg(long, value_name = "PATH", env = "SONICART_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// `sonicart` subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one cover and report where it came from.
    Fetch {
        /// Album or artist id.
        id: String,

        /// Album cover or artist image.
        #[arg(long, value_enum, default_value_t = CoverArtKind::Album)]
        kind: CoverArtKind,

        /// Where the cover will be shown; decides the pixel size.
        #[arg(long, value_enum, default_value_t = DisplayContext::GridCell)]
        context: DisplayContext,

        /// Write the decoded cover to this file.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Warm the caches for several covers at once.
    Prefetch {
        /// Album or artist ids, in display order.
        #[arg(required = true)]
        ids: Vec<String>,

        /// Album covers or artist images.
        #[arg(long, value_enum, default_value_t = CoverArtKind::Album)]
        kind: CoverArtKind,

        /// Where the covers will be shown.
        #[arg(long, value_enum, default_value_t = DisplayContext::GridCell)]
        context: DisplayContext,
    },
    /// Show disk cache usage.
    Stats,
    /// Delete every cover from the disk cache.
    ClearDisk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let args = CliArgs::parse_from([
            "sonicart", "fetch", "ar-7", "--kind", "artist", "--context", "hero", "-o", "out.png",
        ]);
        match args.command {
            Command::Fetch {
                id,
                kind,
                context,
                output,
            } => {
                assert_eq!(id, "ar-7");
                assert_eq!(kind, CoverArtKind::Artist);
                assert_eq!(context, DisplayContext::Hero);
                assert_eq!(output, Some(PathBuf::from("out.png")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_prefetch_defaults() {
        let args = CliArgs::parse_from(["sonicart", "prefetch", "al-1", "al-2"]);
        match args.command {
            Command::Prefetch { ids, kind, context } => {
                assert_eq!(ids, vec!["al-1", "al-2"]);
                assert_eq!(kind, CoverArtKind::Album);
                assert_eq!(context, DisplayContext::GridCell);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_prefetch_requires_ids() {
        assert!(CliArgs::try_parse_from(["sonicart", "prefetch"]).is_err());
    }
}
