// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    error::Error,
    path::{Path, PathBuf},
};

use calsys_freebusy::{
    ClientCache, FreeBusy, HttpSource, RawFreeBusy, aggregate, freetime, parse_instant,
};
use clap::{Arg, ArgMatches, Command, ValueHint, value_parser};
use colored::Colorize;
use jiff::Timestamp;

use crate::config::parse_config;

#[derive(Debug, Clone)]
pub struct CmdFreeBusy {
    pub server: Option<String>,
    pub principal: Option<String>,
    pub free_file: Option<PathBuf>,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl CmdFreeBusy {
    pub const NAME: &str = "freebusy";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("fb")
            .about("Compute the busy periods of a principal")
            .arg(
                Arg::new("principal")
                    .long("principal")
                    .short('p')
                    .value_name("HREF")
                    .help("Principal URL, resolved against the configured principal prefixes"),
            )
            .arg(
                Arg::new("server")
                    .long("server")
                    .short('s')
                    .value_name("NAME")
                    .requires("principal")
                    .help("Server to ask, instead of the one mapped to the principal"),
            )
            .arg(
                Arg::new("free-file")
                    .long("free-file")
                    .value_name("FILE")
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath)
                    .conflicts_with_all(["principal", "server"])
                    .help("Local free-time document to invert, instead of asking a server"),
            )
            .arg(
                Arg::new("start")
                    .long("start")
                    .value_name("UTC")
                    .required(true)
                    .help("Range start, e.g. 20240101T080000Z"),
            )
            .arg(
                Arg::new("end")
                    .long("end")
                    .value_name("UTC")
                    .required(true)
                    .help("Range end, exclusive"),
            )
    }

    pub fn from(matches: &ArgMatches) -> Result<Self, Box<dyn Error>> {
        let principal = matches.get_one::<String>("principal").cloned();
        let free_file = matches.get_one::<PathBuf>("free-file").cloned();
        if principal.is_none() && free_file.is_none() {
            return Err("Either --principal or --free-file is required".into());
        }

        let instant = |id: &str| -> Result<Timestamp, Box<dyn Error>> {
            let value = matches
                .get_one::<String>(id)
                .ok_or_else(|| format!("--{id} is required"))?;
            Ok(parse_instant(value)?)
        };
        Ok(Self {
            server: matches.get_one::<String>("server").cloned(),
            principal,
            free_file,
            start: instant("start")?,
            end: instant("end")?,
        })
    }

    pub async fn run(self, config: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "computing free-busy...");
        let fb = match (&self.free_file, &self.principal) {
            (Some(path), _) => self.from_file(path).await?,
            (None, Some(principal)) => self.from_server(config, principal).await?,
            (None, None) => return Err("Either --principal or --free-file is required".into()),
        };
        print_free_busy(&fb);
        Ok(())
    }

    async fn from_file(&self, path: &Path) -> Result<FreeBusy, Box<dyn Error>> {
        let xml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let free = freetime::decode(&xml)?;
        Ok(aggregate(RawFreeBusy::Free(free), self.start, self.end)?)
    }

    async fn from_server(
        &self,
        config: Option<PathBuf>,
        principal: &str,
    ) -> Result<FreeBusy, Box<dyn Error>> {
        let config = parse_config(config).await?;
        let (name, server) = match &self.server {
            Some(name) => {
                let server = config
                    .server(name)
                    .ok_or_else(|| format!("Unknown server '{name}'"))?;
                (name.as_str(), server)
            }
            None => config
                .server_for(principal)
                .ok_or_else(|| format!("No server configured for {principal}"))?,
        };
        let account = config.principal_account(principal).unwrap_or(principal);
        tracing::debug!(
            server = name,
            account,
            kind = ?config.principal_kind(principal),
            "resolved principal"
        );

        let cache = ClientCache::new();
        let source = HttpSource::new(name, server.clone(), &cache)?;
        Ok(source.free_busy(account, self.start, self.end).await?)
    }
}

fn print_free_busy(fb: &FreeBusy) {
    let lines = fb.to_freebusy_lines();
    if lines.is_empty() {
        println!("{} {}", "Free:".green(), fb.range());
        return;
    }
    for line in lines {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CmdFreeBusy, Box<dyn Error>> {
        let cmd = Command::new("test").subcommand(CmdFreeBusy::command());
        let matches = cmd.try_get_matches_from(args)?;
        match matches.subcommand() {
            Some((CmdFreeBusy::NAME, sub)) => CmdFreeBusy::from(sub),
            _ => Err("Expected freebusy subcommand".into()),
        }
    }

    #[test]
    fn test_parse_principal() {
        let cmd = parse(&[
            "test",
            "freebusy",
            "--principal",
            "/principals/users/jdoe",
            "--server",
            "exchange",
            "--start",
            "20240101T080000Z",
            "--end",
            "2024-01-01T16:00:00Z",
        ])
        .unwrap();
        assert_eq!(cmd.principal.as_deref(), Some("/principals/users/jdoe"));
        assert_eq!(cmd.server.as_deref(), Some("exchange"));
        assert_eq!(cmd.end, parse_instant("20240101T160000Z").unwrap());
    }

    #[test]
    fn test_parse_requires_source() {
        let args = ["test", "fb", "--start", "20240101T080000Z", "--end", "20240101T160000Z"];
        assert!(parse(&args).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_instant() {
        let args = ["test", "fb", "-p", "/p/a", "--start", "tomorrow", "--end", "20240101T160000Z"];
        assert!(parse(&args).is_err());
    }

    #[test]
    fn test_parse_free_file_conflicts_with_principal() {
        let args = [
            "test",
            "fb",
            "--free-file",
            "free.xml",
            "-p",
            "/p/a",
            "--start",
            "20240101T080000Z",
            "--end",
            "20240101T160000Z",
        ];
        assert!(parse(&args).is_err());
    }

    #[tokio::test]
    async fn from_file_inverts_free_time() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("free.xml");
        std::fs::write(
            &path,
            r#"<freetime>
                 <period start="20240101T090000Z" end="20240101T100000Z"/>
                 <period start="20240101T140000Z" end="20240101T150000Z"/>
               </freetime>"#,
        )
        .unwrap();

        let cmd = parse(&[
            "test",
            "fb",
            "--free-file",
            path.to_str().unwrap(),
            "--start",
            "20240101T080000Z",
            "--end",
            "20240101T160000Z",
        ])
        .unwrap();
        let fb = cmd.from_file(&path).await.unwrap();
        assert_eq!(
            fb.to_freebusy_lines(),
            ["FREEBUSY;FBTYPE=BUSY:20240101T080000Z/20240101T090000Z,\
              20240101T100000Z/20240101T140000Z,20240101T150000Z/20240101T160000Z"]
        );
    }
}
