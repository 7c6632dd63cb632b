//! Connection map parsing
//!
//! Turns the raw `[redis]` table handed over by the host into a typed
//! [`ConnectionConfig`]. Exactly one deployment mode survives parsing.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use toml::{Table, Value};

/// Host used when an entry leaves `host` empty
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when an entry leaves `port` empty or zero
pub const DEFAULT_PORT: u16 = 6379;

const CLUSTER_FLAG_KEY: &str = "cluster";
const CLUSTER_CONFIG_KEY: &str = "cluster_config";
const OPTIONS_KEY: &str = "options";

/// Keys inside `cluster_config` that configure the aggregate client instead of naming a seed
const CLUSTER_OPTION_KEYS: [&str; 6] = [
    OPTIONS_KEY,
    "read_timeout",
    "timeout",
    "persistent",
    "prefix",
    "failover",
];

/// One deployment mode, resolved from the raw connection map
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionConfig {
    /// Named single-node connections in configured order
    Single(Vec<NamedNode>),
    /// One aggregate client over a set of seed nodes
    Cluster(ClusterConfig),
}

/// A single-node entry together with the name it was configured under
#[derive(Debug, Clone, PartialEq)]
pub struct NamedNode {
    pub name: String,
    pub node: NodeConfig,
}

/// Settings for one single-node connection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Connect timeout in seconds, 0 for none
    pub timeout: f64,
    pub persistent: bool,
    /// Connection-level key prefix, empty for none
    pub prefix: String,
    /// Logical database index, 0 leaves the server default selected
    pub database: i64,
}

/// Address of one cluster seed node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedNode {
    pub host: String,
    pub port: u16,
}

/// Options for the aggregate cluster client
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterOptions {
    /// Response timeout in seconds, 0 for none
    pub read_timeout: f64,
    /// Connect timeout in seconds, 0 for none
    pub timeout: f64,
    pub persistent: bool,
    pub prefix: String,
    /// Replica failover policy; empty leaves the client default
    pub failover: String,
}

/// Cluster seed list plus client options
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterConfig {
    pub seeds: Vec<SeedNode>,
    pub options: ClusterOptions,
}

/// How reads are spread over replicas when the cluster fails over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverPolicy {
    None,
    Error,
    Distribute,
    DistributeReplicas,
}

impl FailoverPolicy {
    /// Whether read commands may be served by replicas
    pub fn reads_from_replicas(self) -> bool {
        matches!(self, Self::Distribute | Self::DistributeReplicas)
    }
}

impl FromStr for FailoverPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "error" => Ok(Self::Error),
            "distribute" => Ok(Self::Distribute),
            "distribute_replicas" | "distribute_slaves" => Ok(Self::DistributeReplicas),
            other => Err(ConfigError::Invalid(format!(
                "Unknown cluster failover policy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FailoverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Error => "error",
            Self::Distribute => "distribute",
            Self::DistributeReplicas => "distribute_replicas",
        };
        f.write_str(name)
    }
}

impl NodeConfig {
    /// Create a node configuration for the given address
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn host(&self) -> &str {
        host_or_default(&self.host)
    }

    pub fn port(&self) -> u16 {
        port_or_default(self.port)
    }

    /// `host:port` with defaults applied
    pub fn address(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        seconds(self.timeout)
    }

    pub fn prefix(&self) -> Option<&str> {
        non_empty(&self.prefix)
    }

    /// Database to select after connecting, `None` when unset
    pub fn database(&self) -> Option<i64> {
        (self.database != 0).then_some(self.database)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        check_seconds(self.timeout, &format!("Connection '{}' timeout", name))?;
        if self.database < 0 {
            return Err(ConfigError::Invalid(format!(
                "Connection '{}' database cannot be negative",
                name
            )));
        }
        Ok(())
    }
}

impl SeedNode {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// `host:port` with defaults applied
    pub fn address(&self) -> String {
        format!("{}:{}", host_or_default(&self.host), port_or_default(self.port))
    }
}

impl ClusterOptions {
    pub fn read_timeout(&self) -> Option<Duration> {
        seconds(self.read_timeout)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        seconds(self.timeout)
    }

    pub fn prefix(&self) -> Option<&str> {
        non_empty(&self.prefix)
    }

    /// The configured failover policy, `None` when left empty
    pub fn failover_policy(&self) -> Result<Option<FailoverPolicy>, ConfigError> {
        non_empty(&self.failover).map(str::parse).transpose()
    }
}

impl ClusterConfig {
    pub fn new(seeds: Vec<SeedNode>, options: ClusterOptions) -> Self {
        Self { seeds, options }
    }

    /// Seed addresses rendered as `host:port`
    pub fn seed_addresses(&self) -> Vec<String> {
        self.seeds.iter().map(SeedNode::address).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.seeds.is_empty() {
            return Err(ConfigError::Invalid(
                "Cluster mode requires at least one seed node".to_string(),
            ));
        }
        check_seconds(self.options.read_timeout, "Cluster read_timeout")?;
        check_seconds(self.options.timeout, "Cluster timeout")?;
        self.options.failover_policy()?;
        Ok(())
    }
}

impl ConnectionConfig {
    /// Single-node configuration from `(name, node)` pairs
    pub fn single<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (S, NodeConfig)>,
        S: Into<String>,
    {
        Self::Single(
            nodes
                .into_iter()
                .map(|(name, node)| NamedNode {
                    name: name.into(),
                    node,
                })
                .collect(),
        )
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }

    /// Parse the raw connection map
    ///
    /// `cluster = true` selects the cluster branch, which reads only
    /// `cluster_config`; any single-node entry next to it makes the map
    /// ambiguous. Otherwise every non-reserved key is a single-node entry and
    /// `cluster_config` is passed over untouched.
    pub fn from_table(servers: &Table) -> Result<Self, ConfigError> {
        let cluster = match servers.get(CLUSTER_FLAG_KEY) {
            None => false,
            Some(Value::Boolean(flag)) => *flag,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "`cluster` must be a boolean, got {}",
                    other.type_str()
                )));
            }
        };

        let mut entries = servers.iter().filter(|(key, _)| !is_reserved(key));

        let config = if cluster {
            if let Some((name, _)) = entries.next() {
                return Err(ConfigError::Invalid(format!(
                    "Ambiguous connection map: cluster mode is enabled but single-node entry '{}' is also configured",
                    name
                )));
            }

            let cluster_table = match servers.get(CLUSTER_CONFIG_KEY) {
                Some(Value::Table(table)) => table,
                Some(other) => {
                    return Err(ConfigError::Invalid(format!(
                        "`cluster_config` must be a table, got {}",
                        other.type_str()
                    )));
                }
                None => {
                    return Err(ConfigError::Invalid(
                        "Cluster mode requires a `cluster_config` table".to_string(),
                    ));
                }
            };
            Self::Cluster(parse_cluster(cluster_table)?)
        } else {
            let defaults = match servers.get(OPTIONS_KEY) {
                None => Table::new(),
                Some(Value::Table(table)) => table.clone(),
                Some(other) => {
                    return Err(ConfigError::Invalid(format!(
                        "`options` must be a table, got {}",
                        other.type_str()
                    )));
                }
            };

            let nodes = entries
                .map(|(name, value)| parse_node(name, value, &defaults))
                .collect::<Result<Vec<_>, _>>()?;
            Self::Single(nodes)
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that hold for programmatically built configs too
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Single(nodes) => {
                if nodes.is_empty() {
                    return Err(ConfigError::Invalid(
                        "At least one connection must be configured".to_string(),
                    ));
                }
                for (index, named) in nodes.iter().enumerate() {
                    if nodes[..index].iter().any(|n| n.name == named.name) {
                        return Err(ConfigError::Invalid(format!(
                            "Connection '{}' is configured twice",
                            named.name
                        )));
                    }
                    named.node.validate(&named.name)?;
                }
                Ok(())
            }
            Self::Cluster(cluster) => cluster.validate(),
        }
    }
}

fn is_reserved(key: &str) -> bool {
    matches!(key, CLUSTER_FLAG_KEY | CLUSTER_CONFIG_KEY | OPTIONS_KEY)
}

fn parse_node(name: &str, value: &Value, defaults: &Table) -> Result<NamedNode, ConfigError> {
    let Value::Table(entry) = value else {
        return Err(ConfigError::Invalid(format!(
            "Connection '{}' must be a table, got {}",
            name,
            value.type_str()
        )));
    };

    let mut merged = defaults.clone();
    for (key, field) in entry {
        merged.insert(key.clone(), field.clone());
    }

    let node = Value::Table(merged)
        .try_into::<NodeConfig>()
        .map_err(|e| ConfigError::Invalid(format!("Connection '{}': {}", name, e)))?;

    Ok(NamedNode {
        name: name.to_string(),
        node,
    })
}

fn parse_cluster(table: &Table) -> Result<ClusterConfig, ConfigError> {
    let mut options = Table::new();
    let mut seeds = Vec::new();

    for (key, value) in table {
        if CLUSTER_OPTION_KEYS.contains(&key.as_str()) {
            if key != OPTIONS_KEY {
                options.insert(key.clone(), value.clone());
            }
            continue;
        }

        let seed = value
            .clone()
            .try_into::<SeedNode>()
            .map_err(|e| ConfigError::Invalid(format!("Cluster seed '{}': {}", key, e)))?;
        seeds.push(seed);
    }

    // Nested `options` wins over inline keys
    match table.get(OPTIONS_KEY) {
        None => {}
        Some(Value::Table(nested)) => {
            for (key, value) in nested {
                options.insert(key.clone(), value.clone());
            }
        }
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "`cluster_config.options` must be a table, got {}",
                other.type_str()
            )));
        }
    }

    let options = Value::Table(options)
        .try_into::<ClusterOptions>()
        .map_err(|e| ConfigError::Invalid(format!("Cluster options: {}", e)))?;

    Ok(ClusterConfig { seeds, options })
}

fn host_or_default(host: &str) -> &str {
    if host.is_empty() { DEFAULT_HOST } else { host }
}

fn port_or_default(port: u16) -> u16 {
    if port == 0 { DEFAULT_PORT } else { port }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn seconds(value: f64) -> Option<Duration> {
    if value > 0.0 {
        Duration::try_from_secs_f64(value).ok()
    } else {
        None
    }
}

/// Rejects anything `Duration` cannot hold, not just negatives and NaN
fn check_seconds(value: f64, what: &str) -> Result<(), ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| {
        ConfigError::Invalid(format!(
            "{} must be a non-negative number of seconds ({}): {}",
            what, value, e
        ))
    })?;
    Ok(())
}
