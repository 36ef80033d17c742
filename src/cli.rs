//! Command-line interface definitions.
//!
//! Each notifier job is a subcommand; a scheduler (cron, systemd timers)
//! invokes one per entry. The settings file can be given with `--config` or
//! the `NOTIFIER_CONFIG` environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Mail new items from ~/.newsfeeds
/// notifier newsfeed
///
/// # Use an explicit settings file
/// notifier --config /etc/notifier.yaml comics
///
/// # Inspect a feed without touching any state
/// notifier debug-feed https://example.com/feed
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML settings file (default: ~/.notifier.yaml)
    #[arg(short, long, env = "NOTIFIER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mail a digest of new items across all feeds in ~/.newsfeeds
    Newsfeed,
    /// Mail each new podcast episode from the feeds in ~/.podgrabr
    Podgrabr,
    /// Mail each new episode of the Datatilsynet podcast
    Datatilsynet,
    /// Mail today's comic strips
    Comics,
    /// Mail the Lichess games where it is my move
    Lichess,
    /// Mail the cards of a Trello board ordered by due date
    Trello,
    /// Mail C64 remixes released on remix.kwed.org during the last day
    Kwed,
    /// Fetch a feed and print its entries
    DebugFeed {
        /// Feed URL
        url: String,
    },
}

impl Command {
    /// Name used for per-job settings overrides.
    pub fn job_name(&self) -> &'static str {
        match self {
            Self::Newsfeed => "newsfeed",
            Self::Podgrabr => "podgrabr",
            Self::Datatilsynet => "datatilsynet",
            Self::Comics => "comics",
            Self::Lichess => "lichess",
            Self::Trello => "trello",
            Self::Kwed => "kwed",
            Self::DebugFeed { .. } => "debug-feed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["notifier", "--config", "/tmp/n.yaml", "newsfeed"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/n.yaml")));
        assert_eq!(cli.command, Command::Newsfeed);
    }

    #[test]
    fn test_config_after_subcommand() {
        let cli = Cli::parse_from(["notifier", "comics", "-c", "/tmp/n.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/n.yaml")));
        assert_eq!(cli.command.job_name(), "comics");
    }

    #[test]
    fn test_debug_feed_takes_url() {
        let cli = Cli::parse_from(["notifier", "debug-feed", "https://example.com/feed"]);
        assert_eq!(
            cli.command,
            Command::DebugFeed {
                url: "https://example.com/feed".into()
            }
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["notifier"]).is_err());
    }
}
