// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP free-busy sources with authentication and per-host client reuse.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use jiff::Timestamp;
use reqwest::{Client, RequestBuilder, Url, header};

use crate::aggregate::{RawFreeBusy, aggregate};
use crate::config::{AuthMethod, ServerConfig, ServerKind};
use crate::error::FreeBusyError;
use crate::period::{FreeBusy, Period, format_utc};
use crate::{bitmask, feed, freetime};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    host: String,
    port: Option<u16>,
    secure: bool,
}

impl ClientKey {
    fn of(url: &Url) -> Self {
        Self {
            host: url.host_str().unwrap_or_default().to_ascii_lowercase(),
            port: url.port_or_known_default(),
            secure: url.scheme() == "https",
        }
    }
}

/// One HTTP client per host, port and scheme.
///
/// Clients carry no per-server settings; authentication, timeout and user
/// agent are set on each request.
#[derive(Debug, Default)]
pub struct ClientCache {
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl ClientCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no client has been built yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn client_for(&self, url: &Url) -> Result<Client, FreeBusyError> {
        let key = ClientKey::of(url);
        let mut clients = self.lock();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        tracing::debug!(host = %key.host, port = ?key.port, secure = key.secure, "building HTTP client");
        let client = Client::builder().build()?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientKey, Client>> {
        // The map stays consistent across a panic, so poisoning is ignored.
        self.clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// A configured backend server that answers free-busy requests over HTTP.
#[derive(Debug)]
pub struct HttpSource {
    name: String,
    server: ServerConfig,
    base: Url,
    client: Client,
}

impl HttpSource {
    /// Creates a source for `server`, reusing a cached client for its host.
    ///
    /// # Errors
    ///
    /// Returns [`FreeBusyError::Config`] if the base URL does not parse, or
    /// [`FreeBusyError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        server: ServerConfig,
        cache: &ClientCache,
    ) -> Result<Self, FreeBusyError> {
        let name = name.into();
        let base = Url::parse(&server.base_url)
            .map_err(|e| FreeBusyError::Config(format!("server '{name}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(FreeBusyError::Config(format!(
                "server '{name}': base_url is not a hierarchical URL"
            )));
        }
        let client = cache.client_for(&base)?;
        Ok(Self {
            name,
            server,
            base,
            client,
        })
    }

    /// Server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server kind.
    #[must_use]
    pub const fn kind(&self) -> ServerKind {
        self.server.kind
    }

    /// URL of the free-busy request for `account` over `[start, end)`.
    #[must_use]
    pub fn request_url(&self, account: &str, start: Timestamp, end: Timestamp) -> Url {
        let mut url = self.base.clone();
        let segments: &[&str] = match self.server.kind {
            ServerKind::Exchange => &["public", ""],
            ServerKind::Domino => &["freetime"],
            ServerKind::Google => &["feeds", account, "private", "full"],
        };
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }

        {
            let mut query = url.query_pairs_mut();
            match self.server.kind {
                ServerKind::Exchange => {
                    query
                        .append_pair("cmd", "freebusy")
                        .append_pair("start", &start.to_string())
                        .append_pair("end", &end.to_string())
                        .append_pair("interval", &self.server.cell_minutes.to_string())
                        .append_pair("u", &format!("SMTP:{account}"));
                }
                ServerKind::Domino => {
                    query
                        .append_pair("user", account)
                        .append_pair("start", &format_utc(start))
                        .append_pair("end", &format_utc(end));
                }
                ServerKind::Google => {
                    query
                        .append_pair("start-min", &start.to_string())
                        .append_pair("start-max", &end.to_string());
                }
            }
        }
        url
    }

    fn build_request(&self, url: Url) -> RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.server.user_agent)
            .timeout(Duration::from_secs(self.server.timeout_secs));

        match &self.server.auth {
            AuthMethod::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            AuthMethod::Bearer { token } => {
                req = req.bearer_auth(token);
            }
            AuthMethod::None => {}
        }

        req
    }

    /// Fetches and decodes the backend document for `account`.
    ///
    /// # Errors
    ///
    /// - [`FreeBusyError::InvalidRange`] if `start >= end`,
    /// - [`FreeBusyError::Unavailable`] if the server is unreachable, times
    ///   out, answers with a non-success status or an unparseable body,
    /// - [`FreeBusyError::MalformedPeriods`] for inverted periods.
    pub async fn fetch(
        &self,
        account: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<RawFreeBusy, FreeBusyError> {
        Period::new(start, end)?;
        let url = self.request_url(account, start, end);
        tracing::debug!(server = %self.name, kind = %self.server.kind, %url, "requesting free-busy");

        let resp = self.build_request(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(server = %self.name, %status, "free-busy request failed");
            return Err(FreeBusyError::Unavailable(format!(
                "server '{}' answered {status}",
                self.name
            )));
        }
        let body = resp.text().await?;

        match self.server.kind {
            ServerKind::Exchange => Ok(RawFreeBusy::Busy(bitmask::decode_response(
                &body,
                start,
                self.server.cell_minutes,
            )?)),
            ServerKind::Domino => Ok(RawFreeBusy::Free(freetime::decode(&body)?)),
            ServerKind::Google => Ok(RawFreeBusy::Busy(feed::decode(&body)?)),
        }
    }

    /// Fetches, decodes and aggregates free-busy for `account`.
    ///
    /// # Errors
    ///
    /// See [`HttpSource::fetch`] and [`aggregate`].
    pub async fn free_busy(
        &self,
        account: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<FreeBusy, FreeBusyError> {
        let raw = self.fetch(account, start, end).await?;
        aggregate(raw, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::parse_instant;

    fn source(kind: ServerKind, base_url: &str, cache: &ClientCache) -> HttpSource {
        HttpSource::new("test", ServerConfig::new(kind, base_url), cache).unwrap()
    }

    #[test]
    fn request_url_per_kind() {
        let cache = ClientCache::new();
        let start = parse_instant("20240115T080000Z").unwrap();
        let end = parse_instant("20240115T160000Z").unwrap();

        let exchange = source(ServerKind::Exchange, "https://mail.example.com", &cache);
        let url = exchange.request_url("room1@example.com", start, end);
        assert_eq!(url.path(), "/public/");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("cmd".to_string(), "freebusy".to_string())));
        assert!(pairs.contains(&("interval".to_string(), "15".to_string())));
        assert!(pairs.contains(&("u".to_string(), "SMTP:room1@example.com".to_string())));

        let domino = source(ServerKind::Domino, "https://domino.example.com/mail/", &cache);
        let url = domino.request_url("room1", start, end);
        assert_eq!(url.path(), "/mail/freetime");
        assert_eq!(
            url.query(),
            Some("user=room1&start=20240115T080000Z&end=20240115T160000Z")
        );

        let google = source(ServerKind::Google, "https://www.google.com/calendar", &cache);
        let url = google.request_url("jdoe@example.com", start, end);
        assert_eq!(url.path(), "/calendar/feeds/jdoe@example.com/private/full");
    }

    #[test]
    fn client_cache_reuses_per_host() {
        let cache = ClientCache::new();
        source(ServerKind::Exchange, "https://mail.example.com", &cache);
        source(ServerKind::Domino, "https://mail.example.com/other", &cache);
        assert_eq!(cache.len(), 1);

        source(ServerKind::Domino, "http://mail.example.com", &cache);
        source(ServerKind::Domino, "https://mail.example.com:8443", &cache);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn shared_client_keeps_per_server_user_agent() {
        let cache = ClientCache::new();
        let start = parse_instant("20240115T080000Z").unwrap();
        let end = parse_instant("20240115T160000Z").unwrap();

        let mut first = ServerConfig::new(ServerKind::Domino, "https://mail.example.com");
        first.user_agent = "first/1.0".to_string();
        let mut second = ServerConfig::new(ServerKind::Exchange, "https://mail.example.com/ex");
        second.user_agent = "second/2.0".to_string();

        let first = HttpSource::new("first", first, &cache).unwrap();
        let second = HttpSource::new("second", second, &cache).unwrap();
        assert_eq!(cache.len(), 1);

        for (source, agent) in [(&first, "first/1.0"), (&second, "second/2.0")] {
            let url = source.request_url("room1", start, end);
            let req = source.build_request(url).build().unwrap();
            assert_eq!(req.headers().get(header::USER_AGENT).unwrap(), agent);
        }
    }

    #[test]
    fn source_rejects_bad_base_url() {
        let cache = ClientCache::new();
        let err = HttpSource::new(
            "bad",
            ServerConfig::new(ServerKind::Domino, "not a url"),
            &cache,
        )
        .unwrap_err();
        assert!(matches!(err, FreeBusyError::Config(_)));
        assert!(cache.is_empty());
    }
}
