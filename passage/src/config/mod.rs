mod migration;

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use log::error;
use rand::Rng as _;
use serde::Deserialize;
use thiserror::Error;

/// The configuration file template written on first startup.
const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Schema version freshly written configurations carry.
pub const CURRENT_CONFIG_VERSION: &str = "2.8";

pub const DEFAULT_SECRET_FILE: &str = "forwarding.secret";
pub const FORWARDING_SECRET_ENV: &str = "PASSAGE_FORWARDING_SECRET";
const FORWARDING_SECRET_LENGTH: usize = 12;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Forwarding secret file {0} does not exist")]
    ForwardingSecretMissing(PathBuf),
    #[error("Forwarding secret path {0} is not a regular file")]
    ForwardingSecretPathInvalid(PathBuf),
}

/// Scheme by which the proxy conveys the real player identity to the
/// backend server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ForwardingMode {
    #[default]
    None,
    Legacy,
    BungeeGuard,
    Modern,
}

impl ForwardingMode {
    pub fn requires_secret(self) -> bool {
        matches!(self, ForwardingMode::Modern | ForwardingMode::BungeeGuard)
    }
}

/// How much of a backend's ping response is passed through to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PingPassthrough {
    #[default]
    Disabled,
    Mods,
    Description,
    All,
}

/// The `[servers]` table: registered backends plus the order to try them
/// in when a player first joins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Servers {
    #[serde(default, rename = "try")]
    pub attempt_connection_order: Vec<String>,
    #[serde(flatten)]
    pub servers: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Advanced {
    #[serde(rename = "compression-threshold")]
    pub compression_threshold: i32,
    #[serde(rename = "compression-level")]
    pub compression_level: i32,
    #[serde(rename = "login-ratelimit")]
    pub login_ratelimit: i64,
    #[serde(rename = "connection-timeout")]
    pub connection_timeout: i32,
    #[serde(rename = "read-timeout")]
    pub read_timeout: i32,
    #[serde(rename = "haproxy-protocol")]
    pub haproxy_protocol: bool,
    #[serde(rename = "tcp-fast-open")]
    pub tcp_fast_open: bool,
    #[serde(rename = "bungee-plugin-message-channel")]
    pub bungee_plugin_message_channel: bool,
    #[serde(rename = "show-ping-requests")]
    pub show_ping_requests: bool,
    #[serde(rename = "failover-on-unexpected-server-disconnect")]
    pub failover_on_unexpected_server_disconnect: bool,
    #[serde(rename = "announce-proxy-commands")]
    pub announce_proxy_commands: bool,
    #[serde(rename = "log-command-executions")]
    pub log_command_executions: bool,
    #[serde(rename = "log-player-connections")]
    pub log_player_connections: bool,
}

impl Default for Advanced {
    fn default() -> Self {
        Self {
            compression_threshold: 256,
            compression_level: -1,
            login_ratelimit: 3000,
            connection_timeout: 5000,
            read_timeout: 30000,
            haproxy_protocol: false,
            tcp_fast_open: false,
            bungee_plugin_message_channel: true,
            show_ping_requests: false,
            failover_on_unexpected_server_disconnect: true,
            announce_proxy_commands: true,
            log_command_executions: false,
            log_player_connections: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Query {
    pub enabled: bool,
    pub port: u16,
    pub map: String,
    #[serde(rename = "show-plugins")]
    pub show_plugins: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 25565,
            map: "Passage".to_owned(),
            show_plugins: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub enabled: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Authentication {
    #[serde(rename = "enable-littleskin")]
    pub enable_littleskin: bool,
    #[serde(rename = "littleskin-whitelist")]
    pub littleskin_whitelist: Vec<String>,
}

impl Default for Authentication {
    fn default() -> Self {
        Self {
            enable_littleskin: true,
            littleskin_whitelist: Vec::new(),
        }
    }
}

/// The proxy configuration, frozen at startup.
///
/// [`Config::read`] brings the on-disk document up to the current schema,
/// resolves the forwarding secret and normalizes names; after that the
/// snapshot never changes, with [`Config::set_haproxy_protocol`] as the
/// single documented exception.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub motd: String,
    #[serde(rename = "show-max-players")]
    pub show_max_players: i32,
    #[serde(rename = "online-mode")]
    pub online_mode: bool,
    #[serde(rename = "force-key-authentication")]
    pub force_key_authentication: bool,
    #[serde(rename = "announce-forge")]
    pub announce_forge: bool,
    #[serde(rename = "prevent-client-proxy-connections")]
    pub prevent_client_proxy_connections: bool,
    #[serde(rename = "kick-existing-players")]
    pub kick_existing_players: bool,
    #[serde(rename = "enable-player-address-logging")]
    pub enable_player_address_logging: bool,
    #[serde(rename = "player-info-forwarding-mode")]
    pub player_info_forwarding_mode: ForwardingMode,
    #[serde(rename = "ping-passthrough")]
    pub ping_passthrough: PingPassthrough,
    #[serde(rename = "forwarding-secret-file")]
    pub forwarding_secret_file: Option<String>,
    #[serde(rename = "accepts-transfers")]
    pub accepts_transfers: bool,
    #[serde(rename = "config-version")]
    pub config_version: String,
    pub servers: Servers,
    #[serde(rename = "forced-hosts")]
    pub forced_hosts: HashMap<String, Vec<String>>,
    pub advanced: Advanced,
    pub query: Query,
    pub metrics: Metrics,
    pub authentication: Authentication,
    #[serde(skip)]
    pub forwarding_secret: Vec<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:25565".to_owned(),
            motd: "<#09add3>A Passage Proxy".to_owned(),
            show_max_players: 500,
            online_mode: true,
            force_key_authentication: true,
            announce_forge: true,
            prevent_client_proxy_connections: false,
            kick_existing_players: false,
            enable_player_address_logging: true,
            player_info_forwarding_mode: ForwardingMode::default(),
            ping_passthrough: PingPassthrough::default(),
            forwarding_secret_file: None,
            accepts_transfers: false,
            config_version: CURRENT_CONFIG_VERSION.to_owned(),
            servers: Servers::default(),
            forced_hosts: HashMap::new(),
            advanced: Advanced::default(),
            query: Query::default(),
            metrics: Metrics::default(),
            authentication: Authentication::default(),
            forwarding_secret: Vec::new(),
        }
    }
}

impl Config {
    /// Load the configuration at `path`, creating it (and the default
    /// forwarding secret) on first startup, and migrating older schema
    /// versions forward in place.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if !path.exists() {
            std::fs::write(path, DEFAULT_CONFIG)?;
            let secret_path = directory.join(DEFAULT_SECRET_FILE);
            if !secret_path.exists() {
                std::fs::write(&secret_path, generate_secret(FORWARDING_SECRET_LENGTH))?;
            }
        }

        let mut document: toml::Table = toml::from_str(&std::fs::read_to_string(path)?)?;
        if migration::run(&mut document, &directory)? {
            std::fs::write(path, toml::to_string_pretty(&document)?)?;
        }

        let mut config: Config = document.try_into()?;
        config.normalize();
        config.forwarding_secret = resolve_forwarding_secret(
            std::env::var(FORWARDING_SECRET_ENV).ok().as_deref(),
            config.forwarding_secret_file.as_deref(),
            &directory,
        )?;
        Ok(config)
    }

    /// Server names lose stray quote characters, forced-host names match
    /// case-insensitively.
    fn normalize(&mut self) {
        self.servers.servers = std::mem::take(&mut self.servers.servers)
            .into_iter()
            .map(|(name, address)| (clean_server_name(&name), address))
            .collect();
        for name in &mut self.servers.attempt_connection_order {
            *name = clean_server_name(name);
        }
        self.forced_hosts = std::mem::take(&mut self.forced_hosts)
            .into_iter()
            .map(|(host, targets)| {
                (
                    host.to_lowercase(),
                    targets.iter().map(|target| clean_server_name(target)).collect(),
                )
            })
            .collect();
    }

    /// Check every startup invariant, logging each fault. Returns whether
    /// the configuration is usable; the caller decides to abort.
    pub fn validate(&self) -> bool {
        let mut valid = true;

        if self.bind.parse::<SocketAddr>().is_err() {
            error!("Invalid bind address {:?}, expected an ip:port pair", self.bind);
            valid = false;
        }

        for (name, address) in &self.servers.servers {
            if !valid_host_port(address) {
                error!("Server {:?} has invalid address {:?}", name, address);
                valid = false;
            }
        }
        for name in &self.servers.attempt_connection_order {
            if !self.servers.servers.contains_key(name) {
                error!("Connection order entry {:?} is not a registered server", name);
                valid = false;
            }
        }
        for (host, targets) in &self.forced_hosts {
            for target in targets {
                if !self.servers.servers.contains_key(target) {
                    error!("Forced host {:?} references unknown server {:?}", host, target);
                    valid = false;
                }
            }
        }

        if self.player_info_forwarding_mode.requires_secret() && self.forwarding_secret.is_empty()
        {
            error!(
                "Forwarding mode {:?} requires a non-empty forwarding secret",
                self.player_info_forwarding_mode
            );
            valid = false;
        }

        if !(-1..=9).contains(&self.advanced.compression_level) {
            error!(
                "Invalid compression level {} (must be -1..=9)",
                self.advanced.compression_level
            );
            valid = false;
        }
        if self.advanced.compression_threshold < -1 {
            error!(
                "Invalid compression threshold {} (must be >= -1)",
                self.advanced.compression_threshold
            );
            valid = false;
        }
        if self.advanced.login_ratelimit < 0 {
            error!(
                "Invalid login ratelimit {}ms (must be >= 0)",
                self.advanced.login_ratelimit
            );
            valid = false;
        }
        if self.query.enabled && self.query.port == 0 {
            error!("Query is enabled but has no usable port");
            valid = false;
        }

        valid
    }

    /// The one mutation the frozen snapshot allows.
    pub fn set_haproxy_protocol(&mut self, enabled: bool) {
        self.advanced.haproxy_protocol = enabled;
    }
}

fn clean_server_name(name: &str) -> String {
    name.replace('"', "")
}

fn valid_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok_and(|port| port > 0),
        None => false,
    }
}

/// Environment override first, then the configured secret file, then the
/// default one next to the configuration.
fn resolve_forwarding_secret(
    env_secret: Option<&str>,
    secret_file: Option<&str>,
    directory: &Path,
) -> Result<Vec<u8>, ConfigError> {
    if let Some(secret) = env_secret {
        if !secret.is_empty() {
            return Ok(secret.as_bytes().to_vec());
        }
    }
    let path = directory.join(secret_file.unwrap_or(DEFAULT_SECRET_FILE));
    if path.is_dir() {
        return Err(ConfigError::ForwardingSecretPathInvalid(path));
    }
    if !path.is_file() {
        return Err(ConfigError::ForwardingSecretMissing(path));
    }
    Ok(std::fs::read_to_string(&path)?.trim().as_bytes().to_vec())
}

pub(crate) fn generate_secret(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}
