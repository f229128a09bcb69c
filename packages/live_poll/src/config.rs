use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use live_poll_core::PollRegistryConfig;

// =============================================================================
// Unified config (figment-deserialized from defaults / livepoll.toml / env vars)
// =============================================================================
//
// Equivalent ways to configure:
//
//   livepoll.toml:   [server]
//                    port = 4000
//
//   env var:         LIVEPOLL_SERVER__PORT=4000   (double underscore = nesting)
//
//   plain env var:   PORT=4000                    (what hosting platforms set)
//
// CLI flags (--host / --port) are applied last by `ServerConfig::with_overrides`.

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub polls: PollsFileConfig,
}

/// Listener and connection knobs (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            send_channel_capacity: default_send_channel_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Poll lifecycle knobs (lives under `[polls]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollsFileConfig {
    #[serde(default = "default_enforce_time_limit")]
    pub enforce_time_limit: bool,
    #[serde(default = "default_max_retained_polls")]
    pub max_retained_polls: usize,
}

impl Default for PollsFileConfig {
    fn default() -> Self {
        Self {
            enforce_time_limit: default_enforce_time_limit(),
            max_retained_polls: default_max_retained_polls(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_send_channel_capacity() -> usize {
    100
}
fn default_broadcast_capacity() -> usize {
    256
}
fn default_enforce_time_limit() -> bool {
    true
}
fn default_max_retained_polls() -> usize {
    32
}

/// Build a figment that layers: defaults → livepoll.toml → LIVEPOLL_* env vars → PORT.
///
/// Env vars use double-underscore for nesting into sections:
///   `LIVEPOLL_POLLS__ENFORCE_TIME_LIMIT=false`  →  `polls.enforce_time_limit = false`
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("LIVEPOLL_").split("__"))
        .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub websocket: WebSocketConfig,
    pub polls: PollRegistryConfig,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Per-connection outbound queue depth
    pub send_channel_capacity: usize,
    /// Fan-out channel depth; slower receivers skip ahead
    pub broadcast_capacity: usize,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            host: fc.server.host.clone(),
            port: fc.server.port,
            websocket: WebSocketConfig {
                send_channel_capacity: fc.server.send_channel_capacity.max(1),
                broadcast_capacity: fc.server.broadcast_capacity.max(1),
            },
            polls: PollRegistryConfig {
                enforce_time_limit: fc.polls.enforce_time_limit,
                max_retained_polls: fc.polls.max_retained_polls.max(1),
            },
        }
    }

    /// Apply command-line flags, which beat every other layer.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        use anyhow::Context;
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_server_file_config_defaults() {
        let d = ServerFileConfig::default();
        assert_eq!(d.host, "0.0.0.0");
        assert_eq!(d.port, 3000);
        assert_eq!(d.send_channel_capacity, 100);
        assert_eq!(d.broadcast_capacity, 256);
    }

    #[test]
    fn test_polls_file_config_defaults() {
        let d = PollsFileConfig::default();
        assert!(d.enforce_time_limit);
        assert_eq!(d.max_retained_polls, 32);
    }

    // ── ServerConfig::from_file ─────────────────────────────────────────

    #[test]
    fn test_server_config_from_file() {
        let fc = FileConfig {
            server: ServerFileConfig {
                host: "127.0.0.1".into(),
                port: 8080,
                send_channel_capacity: 8,
                broadcast_capacity: 16,
            },
            polls: PollsFileConfig {
                enforce_time_limit: false,
                max_retained_polls: 4,
            },
        };
        let sc = ServerConfig::from_file(&fc);
        assert_eq!(sc.port, 8080);
        assert_eq!(sc.websocket.send_channel_capacity, 8);
        assert_eq!(sc.websocket.broadcast_capacity, 16);
        assert!(!sc.polls.enforce_time_limit);
        assert_eq!(sc.polls.max_retained_polls, 4);
    }

    #[test]
    fn test_zero_capacities_clamped() {
        let mut fc = FileConfig::default();
        fc.server.send_channel_capacity = 0;
        fc.server.broadcast_capacity = 0;
        fc.polls.max_retained_polls = 0;
        let sc = ServerConfig::from_file(&fc);
        assert_eq!(sc.websocket.send_channel_capacity, 1);
        assert_eq!(sc.websocket.broadcast_capacity, 1);
        assert_eq!(sc.polls.max_retained_polls, 1);
    }

    #[test]
    fn test_cli_overrides_win() {
        let sc = ServerConfig::default().with_overrides(Some("127.0.0.1".into()), Some(9999));
        assert_eq!(sc.bind_addr().unwrap(), "127.0.0.1:9999".parse().unwrap());

        let untouched = ServerConfig::default().with_overrides(None, None);
        assert_eq!(untouched.host, "0.0.0.0");
    }

    #[test]
    fn test_bind_addr_rejects_garbage_host() {
        let sc = ServerConfig::default().with_overrides(Some("not a host".into()), None);
        assert!(sc.bind_addr().is_err());
    }

    // ── load_config ─────────────────────────────────────────────────────

    // Env-reading tests run inside figment::Jail, which serializes them and
    // restores the environment afterwards.

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let fc: FileConfig = load_config(Path::new("livepoll.toml")).extract()?;
            assert_eq!(fc.server.host, "0.0.0.0");
            assert_eq!(fc.server.port, 3000);
            assert!(fc.polls.enforce_time_limit);
            Ok(())
        });
    }

    #[test]
    fn test_plain_port_env_sets_listen_port() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORT", "4000");
            let fc: FileConfig = load_config(Path::new("livepoll.toml")).extract()?;
            assert_eq!(fc.server.port, 4000);

            let sc = ServerConfig::from_file(&fc);
            assert_eq!(sc.clone().with_overrides(None, None).port, 4000);
            // The CLI flag still wins
            assert_eq!(sc.with_overrides(None, Some(5000)).port, 5000);
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_beats_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "livepoll.toml",
                "[server]\nport = 3500\nhost = \"10.0.0.1\"\n\n[polls]\nmax_retained_polls = 5\n",
            )?;
            jail.set_env("LIVEPOLL_SERVER__PORT", "4100");
            jail.set_env("LIVEPOLL_POLLS__ENFORCE_TIME_LIMIT", "false");

            let fc: FileConfig = load_config(Path::new("livepoll.toml")).extract()?;
            assert_eq!(fc.server.port, 4100);
            assert!(!fc.polls.enforce_time_limit);
            // Keys only the file sets survive
            assert_eq!(fc.server.host, "10.0.0.1");
            assert_eq!(fc.polls.max_retained_polls, 5);
            Ok(())
        });
    }

    #[test]
    fn test_plain_port_beats_prefixed_port() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LIVEPOLL_SERVER__PORT", "4100");
            jail.set_env("PORT", "4200");
            let fc: FileConfig = load_config(Path::new("livepoll.toml")).extract()?;
            assert_eq!(fc.server.port, 4200);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("livepoll.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"192.168.1.1\"\n\n[polls]\nenforce_time_limit = false\nmax_retained_polls = 5\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(&path).extract().unwrap();
        assert_eq!(fc.server.host, "192.168.1.1");
        assert!(!fc.polls.enforce_time_limit);
        assert_eq!(fc.polls.max_retained_polls, 5);
        // Unset keys keep their defaults
        assert_eq!(fc.server.send_channel_capacity, 100);
    }
}
