// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Backend configuration: servers and principal mappings.
//!
//! Built once from TOML and shared by reference; nothing mutates it
//! afterwards.

use std::collections::BTreeMap;

use crate::error::FreeBusyError;

/// Authentication method for a backend server.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication.
    #[serde(rename = "none")]
    #[default]
    None,
    /// Basic authentication (username/password).
    #[serde(rename = "basic")]
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
    /// Bearer token authentication (OAuth).
    #[serde(rename = "bearer")]
    Bearer {
        /// Bearer token.
        token: String,
    },
}

/// Backend system a server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServerKind {
    /// IBM Domino; answers free time.
    Domino,
    /// Exchange-like service; answers bitmasks.
    Exchange,
    /// Google Calendar; answers Atom feeds.
    Google,
}

/// Kind of principal a URL prefix addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PrincipalKind {
    /// A person.
    User,
    /// A bookable resource such as a room.
    Resource,
    /// A group of principals.
    Group,
    /// A host.
    Host,
}

/// One backend server.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ServerConfig {
    /// Backend kind.
    pub kind: ServerKind,
    /// Base URL of the free-busy service.
    pub base_url: String,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Minutes per bitmask digit (Exchange).
    #[serde(default = "default_cell_minutes")]
    pub cell_minutes: u32,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout() -> u64 {
    30
}

const fn default_cell_minutes() -> u32 {
    15
}

fn default_user_agent() -> String {
    concat!("calsys/", env!("CARGO_PKG_VERSION")).to_string()
}

impl ServerConfig {
    /// A server with default timeout, granularity and no authentication.
    pub fn new(kind: ServerKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            auth: AuthMethod::default(),
            timeout_secs: default_timeout(),
            cell_minutes: default_cell_minutes(),
            user_agent: default_user_agent(),
        }
    }
}

/// Servers and principal mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct SysConfig {
    /// Servers by name.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    /// Principal URL prefix to principal kind.
    #[serde(default)]
    pub principals: BTreeMap<String, PrincipalKind>,
    /// Principal URL prefix to server name.
    #[serde(default)]
    pub principal_servers: BTreeMap<String, String>,
}

impl SysConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FreeBusyError::Config`] for invalid TOML, a server with an
    /// empty base URL, zero timeout or granularity, or a principal mapped to
    /// an unknown server.
    #[tracing::instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, FreeBusyError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        tracing::debug!(
            servers = config.servers.len(),
            principals = config.principals.len(),
            "loaded backend configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), FreeBusyError> {
        for (name, server) in &self.servers {
            if server.base_url.trim().is_empty() {
                return Err(FreeBusyError::Config(format!(
                    "server '{name}' has an empty base_url"
                )));
            }
            if server.timeout_secs == 0 || server.cell_minutes == 0 {
                return Err(FreeBusyError::Config(format!(
                    "server '{name}' needs a positive timeout_secs and cell_minutes"
                )));
            }
        }
        for (prefix, server) in &self.principal_servers {
            if !self.servers.contains_key(server) {
                return Err(FreeBusyError::Config(format!(
                    "principal prefix '{prefix}' refers to unknown server '{server}'"
                )));
            }
        }
        Ok(())
    }

    /// Kind of the principal at `href`, by longest prefix match.
    #[must_use]
    pub fn principal_kind(&self, href: &str) -> Option<PrincipalKind> {
        longest_prefix(&self.principals, href).map(|(_, kind)| *kind)
    }

    /// Server holding the principal at `href`, by longest prefix match.
    #[must_use]
    pub fn server_for(&self, href: &str) -> Option<(&str, &ServerConfig)> {
        let (_, name) = longest_prefix(&self.principal_servers, href)?;
        self.servers
            .get_key_value(name)
            .map(|(name, server)| (name.as_str(), server))
    }

    /// Server by name.
    #[must_use]
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.get(name)
    }

    /// Backend account of the principal at `href`: the path after the
    /// matching principal prefix, without trailing slash.
    #[must_use]
    pub fn principal_account<'a>(&self, href: &'a str) -> Option<&'a str> {
        let (prefix, _) = longest_prefix(&self.principals, href)?;
        let account = href.get(prefix.len()..)?.trim_end_matches('/');
        (!account.is_empty()).then_some(account)
    }
}

fn longest_prefix<'m, V>(map: &'m BTreeMap<String, V>, href: &str) -> Option<(&'m str, &'m V)> {
    map.iter()
        .filter(|(prefix, _)| href.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(prefix, v)| (prefix.as_str(), v))
}
