//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storage::SessionId;

#[derive(Debug, Parser)]
#[command(name = "drowsiness-monitor", version, about = "Driver drowsiness monitor")]
pub struct Cli {
    /// Configuration file (default: drowsiness-monitor.toml if present)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run a monitoring session until the camera ends or Ctrl-C (default)
    Live,
    /// List sessions, or the detection log of one session
    History {
        /// Session to show the detection log for
        id: Option<SessionId>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete all sessions and detection logs
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Subcommand to run; `live` when none was given
    pub fn command_or_live(&self) -> Command {
        self.command.clone().unwrap_or(Command::Live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("drowsiness-monitor").chain(args.iter().copied()))
    }

    #[test]
    fn test_definition_is_consistent() {
        <Cli as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_live_is_default() {
        assert_eq!(parse(&[]).unwrap().command_or_live(), Command::Live);
        assert_eq!(parse(&["live"]).unwrap().command_or_live(), Command::Live);
    }

    #[test]
    fn test_history_forms() {
        assert_eq!(
            parse(&["history"]).unwrap().command_or_live(),
            Command::History { id: None, json: false }
        );
        assert_eq!(
            parse(&["history", "12", "--json"]).unwrap().command_or_live(),
            Command::History { id: Some(12), json: true }
        );
        assert!(parse(&["history", "twelve"]).is_err());
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = parse(&["-c", "cab.toml", "clear"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("cab.toml")));
        assert_eq!(cli.command_or_live(), Command::Clear { yes: false });

        let cli = parse(&["clear", "--yes", "--config", "cab.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("cab.toml")));
        assert_eq!(cli.command_or_live(), Command::Clear { yes: true });

        assert!(parse(&["-c"]).is_err());
    }

    #[test]
    fn test_rejects_unknown() {
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["replay"]).is_err());
        let help = parse(&["--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
