// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection strings of the form
//! `scheme://[user[:password]@]host[,host...][:port]`.

use std::fmt;
use std::str::FromStr;

use crate::error::FsError;

pub const DEFAULT_DATASOURCE: &str = "etcd://127.0.0.1:2379";

const ETCD_DEFAULT_PORT: u16 = 2379;

/// Backends the filesystem can be mounted on. The set is closed and chosen
/// once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Etcd,
    /// Process-local map, for dry runs and tests.
    Memory,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Etcd => "etcd",
            Scheme::Memory => "mem",
        }
    }

    fn default_port(&self) -> Option<u16> {
        match self {
            Scheme::Etcd => Some(ETCD_DEFAULT_PORT),
            Scheme::Memory => None,
        }
    }
}

impl FromStr for Scheme {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "etcd" => Ok(Scheme::Etcd),
            "mem" => Ok(Scheme::Memory),
            other => Err(FsError::UnsupportedBackendScheme(other.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A parsed connection string. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datasource {
    scheme: Scheme,
    hosts: Vec<String>,
    port: Option<u16>,
    credentials: Option<Credentials>,
}

impl Datasource {
    pub fn parse(conn: &str) -> Result<Self, FsError> {
        let invalid = |why: &str| FsError::InvalidConnectionString(format!("{conn}: {why}"));

        let (scheme, rest) = conn
            .trim()
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if scheme.is_empty() {
            return Err(invalid("missing scheme"));
        }
        let scheme: Scheme = scheme.parse()?;

        // Anything after the authority (path, query, fragment) is ignored.
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();

        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((userinfo, hostport)) => (Some(userinfo), hostport),
            None => (None, authority),
        };

        let credentials = match userinfo {
            Some(info) => {
                let (username, password) = info.split_once(':').unwrap_or((info, ""));
                if username.is_empty() {
                    return Err(invalid("empty user name"));
                }
                Some(Credentials {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
            None => None,
        };

        // The port follows the last ':' unless that colon sits inside an
        // IPv6 literal such as `[::1]`.
        let (hosts, port) = match hostport.rsplit_once(':') {
            Some((hosts, port)) if !port.contains(']') => {
                let port = if port.is_empty() {
                    None
                } else {
                    Some(port.parse::<u16>().map_err(|_| invalid("bad port"))?)
                };
                (hosts, port)
            }
            _ => (hostport, None),
        };

        let hosts = if hosts.is_empty() {
            Vec::new()
        } else {
            hosts
                .split(',')
                .map(|h| {
                    let h = h.trim();
                    if h.is_empty() || h.contains(char::is_whitespace) {
                        Err(invalid("bad host list"))
                    } else {
                        Ok(h.to_string())
                    }
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        if hosts.is_empty() && scheme == Scheme::Etcd {
            return Err(invalid("no host"));
        }

        Ok(Self {
            scheme,
            hosts,
            port,
            credentials,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Explicit port, falling back to the scheme's default.
    pub fn port(&self) -> Option<u16> {
        self.port.or_else(|| self.scheme.default_port())
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// One `host:port` endpoint per host, all sharing the port.
    pub fn endpoints(&self) -> Vec<String> {
        match self.port() {
            Some(port) => self.hosts.iter().map(|h| format!("{h}:{port}")).collect(),
            None => self.hosts.clone(),
        }
    }
}

impl FromStr for Datasource {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Datasource::parse(s)
    }
}
