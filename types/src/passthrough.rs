//! Passthrough ("no proxy for") host patterns.
//!
//! Accepted entries:
//!
//! - `HOST_NAME[:PORT]`, e.g. `example.com`, `.mozilla.org`, `example.com:1234`
//! - `IP_LITERAL[:PORT]`, IPv6 literals in brackets when a port is given (`[::123]:80`)
//! - `IP_LITERAL/PREFIX_LENGTH`, CIDR notation
//! - `<local>`, every host name without a period
//!
//! Entries are separated by commas and/or whitespace.

use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

const LOCAL_TOKEN: &str = "<local>";

/// Hosts that browsers never send through a proxy.
const NEVER_PROXIED: [&str; 4] = ["localhost", "127.0.0.1", "::1", "[::1]"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassthroughError {
    #[error("invalid host pattern '{0}'")]
    InvalidHost(String),
    #[error("invalid port in '{0}'")]
    InvalidPort(String),
    #[error("invalid address in '{0}'")]
    InvalidAddress(String),
    #[error("prefix length out of range in '{0}'")]
    InvalidPrefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughEntry {
    /// `<local>`: host names without a period.
    Local,
    Host { name: String, port: Option<u16> },
    Ip { addr: IpAddr, port: Option<u16> },
    Cidr { addr: IpAddr, prefix: u8 },
}

impl PassthroughEntry {
    pub fn parse(token: &str) -> Result<Self, PassthroughError> {
        if token.eq_ignore_ascii_case(LOCAL_TOKEN) {
            return Ok(Self::Local);
        }

        if let Some((addr, prefix)) = token.split_once('/') {
            let addr = strip_brackets(addr);
            let addr: IpAddr = addr
                .parse()
                .map_err(|_| PassthroughError::InvalidAddress(token.to_string()))?;
            let prefix: u8 = prefix
                .parse()
                .map_err(|_| PassthroughError::InvalidPrefix(token.to_string()))?;
            let max = if addr.is_ipv4() { 32 } else { 128 };
            if prefix > max {
                return Err(PassthroughError::InvalidPrefix(token.to_string()));
            }
            return Ok(Self::Cidr { addr, prefix });
        }

        if let Some(rest) = token.strip_prefix('[') {
            let (inner, tail) = rest
                .split_once(']')
                .ok_or_else(|| PassthroughError::InvalidAddress(token.to_string()))?;
            let addr: IpAddr = inner
                .parse()
                .map_err(|_| PassthroughError::InvalidAddress(token.to_string()))?;
            let port = match tail {
                "" => None,
                tail => Some(parse_port(tail.strip_prefix(':'), token)?),
            };
            return Ok(Self::Ip { addr, port });
        }

        // Bare IPv6 literal without port.
        if let Ok(addr) = token.parse::<IpAddr>() {
            return Ok(Self::Ip { addr, port: None });
        }

        let (host, port) = match token.rsplit_once(':') {
            Some((host, port)) => (host, Some(parse_port(Some(port), token)?)),
            None => (token, None),
        };

        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(Self::Ip { addr, port });
        }

        if host.is_empty() || !host.chars().all(is_host_char) {
            return Err(PassthroughError::InvalidHost(token.to_string()));
        }
        Ok(Self::Host {
            name: host.to_ascii_lowercase(),
            port,
        })
    }

    /// Whether `host` (no port) is excluded from proxying by this entry.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        let host = strip_brackets(host).to_ascii_lowercase();
        match self {
            Self::Local => !host.contains('.') && host.parse::<IpAddr>().is_err(),
            Self::Host { name, .. } => {
                let suffix = name.trim_start_matches('*').trim_start_matches('.');
                host == suffix || host.ends_with(&format!(".{suffix}"))
            }
            Self::Ip { addr, .. } => host.parse::<IpAddr>().is_ok_and(|h| h == *addr),
            Self::Cidr { addr, prefix } => host
                .parse::<IpAddr>()
                .is_ok_and(|h| in_network(h, *addr, *prefix)),
        }
    }
}

impl fmt::Display for PassthroughEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str(LOCAL_TOKEN),
            Self::Host { name, port: None } => f.write_str(name),
            Self::Host {
                name,
                port: Some(port),
            } => write!(f, "{name}:{port}"),
            Self::Ip { addr, port: None } => write!(f, "{addr}"),
            Self::Ip {
                addr: IpAddr::V6(addr),
                port: Some(port),
            } => write!(f, "[{addr}]:{port}"),
            Self::Ip {
                addr: IpAddr::V4(addr),
                port: Some(port),
            } => write!(f, "{addr}:{port}"),
            Self::Cidr { addr, prefix } => write!(f, "{addr}/{prefix}"),
        }
    }
}

/// Parsed passthrough list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassthroughList {
    entries: Vec<PassthroughEntry>,
}

impl PassthroughList {
    pub fn parse(raw: &str) -> Result<Self, PassthroughError> {
        let entries = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(PassthroughEntry::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[PassthroughEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether connections to `host` bypass the proxy.
    #[must_use]
    pub fn bypasses(&self, host: &str) -> bool {
        let lower = host.to_ascii_lowercase();
        NEVER_PROXIED.contains(&lower.as_str()) || self.entries.iter().any(|e| e.matches(host))
    }
}

impl fmt::Display for PassthroughList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '*')
}

fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(s)
}

fn parse_port(port: Option<&str>, token: &str) -> Result<u16, PassthroughError> {
    port.and_then(|p| p.parse::<u16>().ok())
        .ok_or_else(|| PassthroughError::InvalidPort(token.to_string()))
}

fn in_network(host: IpAddr, network: IpAddr, prefix: u8) -> bool {
    match (host, network) {
        (IpAddr::V4(h), IpAddr::V4(n)) => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            u32::from(h) & mask == u32::from(n) & mask
        }
        (IpAddr::V6(h), IpAddr::V6(n)) => {
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            u128::from(h) & mask == u128::from(n) & mask
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_entry_kind() {
        let list =
            PassthroughList::parse("<local>, .mozilla.org, example.com:1234, 192.168.1.0/24, [::123]:8080")
                .unwrap();
        assert_eq!(
            list.entries(),
            &[
                PassthroughEntry::Local,
                PassthroughEntry::Host {
                    name: ".mozilla.org".to_string(),
                    port: None
                },
                PassthroughEntry::Host {
                    name: "example.com".to_string(),
                    port: Some(1234)
                },
                PassthroughEntry::Cidr {
                    addr: "192.168.1.0".parse().unwrap(),
                    prefix: 24
                },
                PassthroughEntry::Ip {
                    addr: "::123".parse().unwrap(),
                    port: Some(8080)
                },
            ]
        );
    }

    #[test]
    fn whitespace_and_empty_entries_are_skipped() {
        let list = PassthroughList::parse(" a.example ,,\n b.example ").unwrap();
        assert_eq!(list.entries().len(), 2);
        assert!(PassthroughList::parse("").unwrap().is_empty());
    }

    #[test]
    fn bare_ipv6_and_ipv4_with_port() {
        assert_eq!(
            PassthroughEntry::parse("::1").unwrap(),
            PassthroughEntry::Ip {
                addr: "::1".parse().unwrap(),
                port: None
            }
        );
        assert_eq!(
            PassthroughEntry::parse("10.1.2.3:80").unwrap(),
            PassthroughEntry::Ip {
                addr: "10.1.2.3".parse().unwrap(),
                port: Some(80)
            }
        );
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(
            PassthroughEntry::parse("example.com:http"),
            Err(PassthroughError::InvalidPort(_))
        ));
        assert!(matches!(
            PassthroughEntry::parse("10.0.0.0/33"),
            Err(PassthroughError::InvalidPrefix(_))
        ));
        assert!(matches!(
            PassthroughEntry::parse("nonsense/8"),
            Err(PassthroughError::InvalidAddress(_))
        ));
        assert!(matches!(
            PassthroughEntry::parse("bad!host"),
            Err(PassthroughError::InvalidHost(_))
        ));
        assert!(matches!(
            PassthroughEntry::parse("[::1"),
            Err(PassthroughError::InvalidAddress(_))
        ));
    }

    #[test]
    fn local_matches_dotless_hosts_only() {
        let list = PassthroughList::parse("<local>").unwrap();
        assert!(list.bypasses("intranet"));
        assert!(!list.bypasses("intranet.corp"));
        assert!(!list.bypasses("10.0.0.1"));
    }

    #[test]
    fn host_entries_match_subdomains() {
        let list = PassthroughList::parse(".mozilla.org, example.com").unwrap();
        assert!(list.bypasses("www.mozilla.org"));
        assert!(list.bypasses("mozilla.org"));
        assert!(list.bypasses("EXAMPLE.com"));
        assert!(list.bypasses("api.example.com"));
        assert!(!list.bypasses("notexample.com"));
    }

    #[test]
    fn cidr_entries_match_addresses_in_range() {
        let list = PassthroughList::parse("192.168.1.0/24, fd00::/8, 0.0.0.0/0").unwrap();
        assert!(list.bypasses("192.168.1.77"));
        assert!(list.bypasses("[fd12::1]"));
        assert!(list.bypasses("8.8.8.8"));

        let list = PassthroughList::parse("192.168.1.0/24").unwrap();
        assert!(!list.bypasses("192.168.2.1"));
        assert!(!list.bypasses("::ffff:192.168.1.1"));
    }

    #[test]
    fn loopback_is_never_proxied() {
        let list = PassthroughList::default();
        assert!(list.bypasses("localhost"));
        assert!(list.bypasses("127.0.0.1"));
        assert!(list.bypasses("[::1]"));
        assert!(!list.bypasses("example.com"));
    }

    #[test]
    fn display_rejoins_entries() {
        let list = PassthroughList::parse("<local>,example.com:1234  [::1]:80,10.0.0.0/8").unwrap();
        assert_eq!(list.to_string(), "<local>, example.com:1234, [::1]:80, 10.0.0.0/8");
    }
}
