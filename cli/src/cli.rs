// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, ffi::OsString, path::PathBuf};

use clap::{ArgMatches, Command, ValueHint, arg, builder::styling, crate_version, value_parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::cmd_filter::CmdFilter;
use crate::cmd_freebusy::CmdFreeBusy;

/// Name of the application.
pub const APP_NAME: &str = "calsys";

/// Run the calsys command-line interface.
///
/// # Errors
///
/// Command failures are reported on stderr; this only fails if the logging
/// subscriber cannot be installed.
pub async fn run() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| e as Box<dyn Error>)?;

    match Cli::parse() {
        Ok(cli) => {
            if let Err(e) = cli.run().await {
                eprintln!("{} {}", "Error:".red(), e);
            }
        }
        Err(e) => eprintln!("{} {}", "Error:".red(), e),
    }
    Ok(())
}

/// Command-line interface
#[derive(Debug)]
pub struct Cli {
    /// Path to the configuration file
    pub config: Option<PathBuf>,

    /// The command to execute
    pub command: Commands,
}

impl Cli {
    /// Create the command-line interface
    #[must_use]
    pub fn command() -> Command {
        const STYLES: styling::Styles = styling::Styles::styled()
            .header(styling::AnsiColor::Green.on_default().bold())
            .usage(styling::AnsiColor::Green.on_default().bold())
            .literal(styling::AnsiColor::Blue.on_default().bold())
            .placeholder(styling::AnsiColor::Cyan.on_default());

        Command::new(APP_NAME)
            .about("CalDAV filter compilation and free-busy aggregation.")
            .author("Zexin Yuan <aim@yzx9.xyz>")
            .version(crate_version!())
            .styles(STYLES)
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                arg!(-c --config [CONFIG] "Path to the configuration file")
                    .long_help(
                        "\
Path to the configuration file. Defaults to $CALSYS_CONFIG, then \
$XDG_CONFIG_HOME/calsys/config.toml on Linux and MacOS, %APPDATA%/calsys/config.toml on Windows.",
                    )
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath),
            )
            .subcommand(CmdFilter::command())
            .subcommand(CmdFreeBusy::command())
    }

    /// Parse the command-line arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not form a valid command.
    pub fn parse() -> Result<Self, Box<dyn Error>> {
        let commands = Self::command();
        let matches = commands.get_matches();
        Self::from(&matches)
    }

    /// Parse the specified arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not form a valid command.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let commands = Self::command();
        let matches = commands.try_get_matches_from(args)?;
        Self::from(&matches)
    }

    /// Create a CLI instance from the `ArgMatches`
    ///
    /// # Errors
    ///
    /// Returns an error if a subcommand rejects its arguments.
    pub fn from(matches: &ArgMatches) -> Result<Self, Box<dyn Error>> {
        let command = match matches.subcommand() {
            Some((CmdFilter::NAME, matches)) => Commands::Filter(CmdFilter::from(matches)),
            Some((CmdFreeBusy::NAME, matches)) => Commands::FreeBusy(CmdFreeBusy::from(matches)?),
            _ => return Err("No command given, see --help".into()),
        };

        let config = matches.get_one("config").cloned();
        Ok(Cli { config, command })
    }

    /// Run the command
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        self.command.run(self.config).await
    }
}

/// The commands available in the CLI
#[derive(Debug, Clone)]
pub enum Commands {
    /// Compile a filter and show the result
    Filter(CmdFilter),

    /// Compute free-busy
    FreeBusy(CmdFreeBusy),
}

impl Commands {
    /// Run the command with the given configuration
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn run(self, config: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
        match self {
            Commands::Filter(a) => a.run().await,
            Commands::FreeBusy(a) => a.run(config).await,
        }
    }
}
