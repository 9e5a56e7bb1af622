//! Backend targets and per-request target selection

use http::uri::Authority;
use relay_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An upstream backend address (`host:port`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    authority: Authority,
}

impl Target {
    /// Parse a `host:port` address
    pub fn parse(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(Error::config("target address cannot be empty"));
        }

        let authority = Authority::from_str(addr)
            .map_err(|e| Error::config(format!("invalid target '{addr}': {e}")))?;

        if addr.contains('@') {
            return Err(Error::config(format!(
                "target '{addr}' must not carry user information"
            )));
        }

        match authority.port_u16() {
            None => {
                return Err(Error::config(format!(
                    "target '{addr}' must be in <host>:<port> form"
                )))
            }
            Some(0) => {
                return Err(Error::config(format!("target '{addr}' has port 0")));
            }
            Some(_) => {}
        }

        Ok(Self { authority })
    }

    /// Host part
    pub fn host(&self) -> &str {
        self.authority.host()
    }

    /// Port part
    pub fn port(&self) -> u16 {
        // parse() rejects authorities without a port
        self.authority.port_u16().unwrap_or(80)
    }

    /// The address as `host:port`
    pub fn as_str(&self) -> &str {
        self.authority.as_str()
    }

    /// The address as a URI authority
    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a backend is picked when several targets are configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Balancing {
    /// Rotate through targets in order
    #[default]
    RoundRobin,
    /// Always use the first target
    First,
}

/// Picks the backend for each request.
///
/// Holds a non-empty target list for its whole lifetime.
#[derive(Debug)]
pub struct TargetSelector {
    targets: Vec<Target>,
    balancing: Balancing,
    counter: AtomicUsize,
}

impl TargetSelector {
    /// Create a selector, failing if no targets are given
    pub fn new(targets: Vec<Target>, balancing: Balancing) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::config(
                "proxy requires at least one backend target <host>:<port>",
            ));
        }

        Ok(Self {
            targets,
            balancing,
            counter: AtomicUsize::new(0),
        })
    }

    /// Round-robin selector over the given targets
    pub fn round_robin(targets: Vec<Target>) -> Result<Self> {
        Self::new(targets, Balancing::RoundRobin)
    }

    /// Select the target for the next request
    pub fn select(&self) -> &Target {
        let index = match self.balancing {
            Balancing::First => 0,
            Balancing::RoundRobin => {
                self.counter.fetch_add(1, Ordering::Relaxed) % self.targets.len()
            }
        };
        &self.targets[index]
    }

    /// Configured targets, in order
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Balancing policy
    pub fn balancing(&self) -> Balancing {
        self.balancing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(addrs: &[&str]) -> Vec<Target> {
        addrs.iter().map(|a| Target::parse(a).unwrap()).collect()
    }

    #[test]
    fn test_parse_target() {
        let target = Target::parse("127.0.0.1:8080").unwrap();
        assert_eq!(target.host(), "127.0.0.1");
        assert_eq!(target.port(), 8080);
        assert_eq!(target.to_string(), "127.0.0.1:8080");

        let target: Target = " backend.internal:3000 ".parse().unwrap();
        assert_eq!(target.as_str(), "backend.internal:3000");
    }

    #[test]
    fn test_parse_target_rejects_bad_input() {
        assert!(Target::parse("").is_err());
        assert!(Target::parse("localhost").is_err());
        assert!(Target::parse("http://localhost:80/path").is_err());
    }

    #[test]
    fn test_parse_target_rejects_userinfo() {
        let err = Target::parse("user:pw@backend:80").unwrap_err();
        assert!(err.to_string().contains("user information"));
        assert!(Target::parse("@backend:80").is_err());
    }

    #[test]
    fn test_parse_target_rejects_port_zero() {
        let err = Target::parse("backend:0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(Target::parse("backend:1").is_ok());
    }

    #[test]
    fn test_round_robin_cycles_in_order() {
        let selector =
            TargetSelector::round_robin(targets(&["a:1", "b:2", "c:3"])).unwrap();

        let picked: Vec<&str> = (0..6).map(|_| selector.select().as_str()).collect();
        assert_eq!(picked, vec!["a:1", "b:2", "c:3", "a:1", "b:2", "c:3"]);
    }

    #[test]
    fn test_first_pins_target() {
        let selector = TargetSelector::new(targets(&["a:1", "b:2"]), Balancing::First).unwrap();
        for _ in 0..4 {
            assert_eq!(selector.select().as_str(), "a:1");
        }
    }

    #[test]
    fn test_empty_targets_rejected() {
        let result = TargetSelector::round_robin(Vec::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_balancing_serde() {
        let balancing: Balancing = serde_yaml::from_str("round_robin").unwrap();
        assert_eq!(balancing, Balancing::RoundRobin);
        let balancing: Balancing = serde_yaml::from_str("first").unwrap();
        assert_eq!(balancing, Balancing::First);
    }
}
