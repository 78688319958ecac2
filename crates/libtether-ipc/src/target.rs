//! Connection targets and default endpoints
//!
//! A target is either a local socket (Unix domain socket, or a named pipe on
//! Windows) or a TCP `(host, port)`. In `auto` mode the local socket is tried
//! first and TCP is the fallback.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use libtether_core::{TetherConfig, TetherError, TransportMode};

/// TCP port the supervisor's control channel listens on by default
pub const DEFAULT_CONTROL_PORT: u16 = 45470;

/// One control-channel endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionTarget {
    /// Unix domain socket path or Windows pipe name
    Local(PathBuf),
    /// TCP host and port
    Tcp { host: String, port: u16 },
}

impl ConnectionTarget {
    pub fn is_local(&self) -> bool {
        matches!(self, ConnectionTarget::Local(_))
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Local(path) => write!(f, "local:{}", path.display()),
            ConnectionTarget::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
        }
    }
}

impl FromStr for ConnectionTarget {
    type Err = TetherError;

    /// Accepts `tcp://host:port`, `host:port`, or a socket path / pipe name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TetherError::InvalidConfig("empty control endpoint".to_string()));
        }

        if let Some(addr) = s.strip_prefix("tcp://") {
            return parse_host_port(addr).ok_or_else(|| {
                TetherError::InvalidConfig(format!("invalid TCP endpoint '{}'", s))
            });
        }

        let looks_like_path = s.starts_with('/')
            || s.starts_with('.')
            || s.starts_with('\\')
            || s.contains(std::path::MAIN_SEPARATOR);
        if !looks_like_path {
            if let Some(target) = parse_host_port(s) {
                return Ok(target);
            }
        }

        Ok(ConnectionTarget::Local(PathBuf::from(s)))
    }
}

fn parse_host_port(s: &str) -> Option<ConnectionTarget> {
    let (host, port) = s.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if host.is_empty() || port == 0 {
        return None;
    }
    Some(ConnectionTarget::Tcp {
        host: host.to_string(),
        port,
    })
}

/// Default local control socket for this user
///
/// - `$XDG_RUNTIME_DIR/tether-supervisor.sock` when available
/// - `/tmp/tether-supervisor-<uid>.sock` otherwise on Unix
/// - `\\.\pipe\tether-supervisor` on Windows
pub fn default_local_target() -> ConnectionTarget {
    ConnectionTarget::Local(default_local_path())
}

#[cfg(unix)]
fn default_local_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("tether-supervisor.sock");
    }
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/tether-supervisor-{}.sock", uid))
}

#[cfg(not(unix))]
fn default_local_path() -> PathBuf {
    PathBuf::from(r"\\.\pipe\tether-supervisor")
}

/// Ordered connection candidates for a transport mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    pub mode: TransportMode,
    pub local: ConnectionTarget,
    pub tcp: ConnectionTarget,
}

impl TargetSet {
    /// Build from config; an explicit endpoint replaces the default of its kind
    pub fn from_config(config: &TetherConfig) -> Result<Self, TetherError> {
        let mut set = Self {
            mode: config.transport,
            local: default_local_target(),
            tcp: ConnectionTarget::Tcp {
                host: config.host.clone(),
                port: DEFAULT_CONTROL_PORT,
            },
        };

        if let Some(ref endpoint) = config.control_endpoint {
            match endpoint.parse::<ConnectionTarget>()? {
                target @ ConnectionTarget::Local(_) => set.local = target,
                target @ ConnectionTarget::Tcp { .. } => set.tcp = target,
            }
        }

        Ok(set)
    }

    /// Targets to try, in preference order
    pub fn candidates(&self) -> Vec<ConnectionTarget> {
        match self.mode {
            TransportMode::Auto => vec![self.local.clone(), self.tcp.clone()],
            TransportMode::Local => vec![self.local.clone()],
            TransportMode::Remote => vec![self.tcp.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_forms() {
        let expected = ConnectionTarget::Tcp {
            host: "127.0.0.1".to_string(),
            port: 45470,
        };
        assert_eq!("tcp://127.0.0.1:45470".parse::<ConnectionTarget>().unwrap(), expected);
        assert_eq!("127.0.0.1:45470".parse::<ConnectionTarget>().unwrap(), expected);
    }

    #[test]
    fn test_parse_local_forms() {
        assert_eq!(
            "/run/user/1000/sup.sock".parse::<ConnectionTarget>().unwrap(),
            ConnectionTarget::Local(PathBuf::from("/run/user/1000/sup.sock"))
        );
        assert!(r"\\.\pipe\tether-supervisor"
            .parse::<ConnectionTarget>()
            .unwrap()
            .is_local());
    }

    #[test]
    fn test_parse_rejects_bad_tcp() {
        assert!("tcp://localhost:notaport".parse::<ConnectionTarget>().is_err());
        assert!("".parse::<ConnectionTarget>().is_err());
    }

    #[test]
    fn test_display() {
        let target = ConnectionTarget::Tcp {
            host: "localhost".to_string(),
            port: 9,
        };
        assert_eq!(target.to_string(), "tcp:localhost:9");
    }

    #[test]
    fn test_candidate_order() {
        let config = TetherConfig::default();
        let set = TargetSet::from_config(&config).unwrap();
        let candidates = set.candidates();
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].is_local());
        assert!(!candidates[1].is_local());

        let pinned = TargetSet {
            mode: TransportMode::Remote,
            ..set
        };
        assert_eq!(pinned.candidates().len(), 1);
        assert!(!pinned.candidates()[0].is_local());
    }

    #[test]
    fn test_endpoint_override_replaces_matching_kind() {
        let config = TetherConfig {
            control_endpoint: Some("tcp://10.0.0.2:5000".to_string()),
            ..TetherConfig::default()
        };
        let set = TargetSet::from_config(&config).unwrap();
        assert_eq!(
            set.tcp,
            ConnectionTarget::Tcp {
                host: "10.0.0.2".to_string(),
                port: 5000
            }
        );
        assert_eq!(set.local, default_local_target());
    }
}
