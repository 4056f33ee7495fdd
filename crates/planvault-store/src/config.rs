use std::env;

/// Connection settings for the Postgres store backend.
///
/// Reads from the `PLANVAULT_DATABASE_URL` environment variable, falling back
/// to `postgresql://localhost:5432/planvault` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL, optionally with a `?query` part.
    pub database_url: String,
}

/// A connection URL split into `<server>/<database>?<query>`.
struct UrlParts<'a> {
    server: &'a str,
    database: Option<&'a str>,
    query: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    fn split(url: &'a str) -> Self {
        let (base, query) = match url.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (url, None),
        };
        match base.rsplit_once('/') {
            // `postgresql://host` has only the scheme's slashes before the host.
            Some((server, name)) if !server.ends_with('/') => Self {
                server,
                database: Some(name).filter(|n| !n.is_empty()),
                query,
            },
            _ => Self {
                server: base,
                database: None,
                query,
            },
        }
    }
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/planvault";

    /// Environment variable consulted by [`DbConfig::from_env`].
    pub const ENV_VAR: &str = "PLANVAULT_DATABASE_URL";

    /// Database provisioning connects here to run `CREATE DATABASE`.
    pub const MAINTENANCE_DB: &str = "postgres";

    pub fn from_env() -> Self {
        let database_url =
            env::var(Self::ENV_VAR).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Database name from the URL path, ignoring any query string.
    pub fn database_name(&self) -> Option<&str> {
        UrlParts::split(&self.database_url).database
    }

    /// Same server, user and query parameters, pointed at the maintenance
    /// database.
    pub fn maintenance_url(&self) -> String {
        let parts = UrlParts::split(&self.database_url);
        let mut url = format!("{}/{}", parts.server, Self::MAINTENANCE_DB);
        if let Some(query) = parts.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// The connection URL with any password masked, for logs and errors.
    pub fn redacted_url(&self) -> String {
        redact_password(&self.database_url)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

pub(crate) fn redact_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_owned();
    };
    let authority_end = url[scheme_end..]
        .find('/')
        .map_or(url.len(), |i| scheme_end + i);
    let authority = &url[scheme_end..authority_end];

    match authority.rfind('@') {
        Some(at) => match authority[..at].split_once(':') {
            Some((user, _)) => format!(
                "{}{user}:***{}",
                &url[..scheme_end],
                &url[scheme_end + at..]
            ),
            None => url.to_owned(),
        },
        None => url.to_owned(),
    }
}
