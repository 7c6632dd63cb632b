//! Redis backend
//!
//! Single nodes use a multiplexed connection; clusters use the async cluster
//! client, which routes each key to its slot. A persistent backend opens its
//! connection once and clones it for every command, a transient one opens a
//! fresh connection per call.
//!
//! A cluster only accepts pipelines whose keys share one hash slot, so cluster
//! batches are split per slot and the slot pipelines run concurrently.

use crate::backend::{Backend, Connector, KeyPrefix};
use crate::batch::{Batch, Command, Reply};
use crate::errors::CacheError;
use async_trait::async_trait;
use config::{ClusterConfig, NodeConfig};
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Client, Cmd, FromRedisValue, Pipeline, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Number of hash slots in a Redis cluster
pub const CLUSTER_SLOTS: u16 = 16384;

/// Cluster hash slot of `key`
///
/// Only the first non-empty `{...}` section is hashed when present, so keys
/// sharing a hash tag land in the same slot.
pub fn hash_slot(key: &str) -> u16 {
    let bytes = key.as_bytes();
    let tagged = bytes.iter().position(|b| *b == b'{').and_then(|open| {
        let rest = &bytes[open + 1..];
        rest.iter()
            .position(|b| *b == b'}')
            .filter(|close| *close > 0)
            .map(|close| &rest[..close])
    });

    crc16::State::<crc16::XMODEM>::calculate(tagged.unwrap_or(bytes)) % CLUSTER_SLOTS
}

/// Batch commands sent together in one pipeline, tagged with their position
/// in the original batch
#[derive(Debug, Clone, PartialEq, Eq)]
struct CommandGroup {
    slot: Option<u16>,
    parts: Vec<(usize, Command)>,
}

/// Every command in one group, for connections without slot routing
fn single_group(commands: &[Command]) -> Vec<CommandGroup> {
    let parts: Vec<(usize, Command)> = commands
        .iter()
        .cloned()
        .enumerate()
        .filter(|(_, command)| !is_empty_del(command))
        .collect();

    if parts.is_empty() {
        Vec::new()
    } else {
        vec![CommandGroup { slot: None, parts }]
    }
}

/// One group per hash slot; a multi-key DEL is split across the slots it touches
fn split_by_slot(commands: &[Command]) -> Vec<CommandGroup> {
    let mut slots: BTreeMap<u16, Vec<(usize, Command)>> = BTreeMap::new();

    for (index, command) in commands.iter().enumerate() {
        match command {
            Command::Set { key, .. } | Command::SetEx { key, .. } => {
                slots
                    .entry(hash_slot(key))
                    .or_default()
                    .push((index, command.clone()));
            }
            Command::Del { keys } => {
                let mut by_slot: BTreeMap<u16, Vec<String>> = BTreeMap::new();
                for key in keys {
                    by_slot.entry(hash_slot(key)).or_default().push(key.clone());
                }
                for (slot, keys) in by_slot {
                    slots
                        .entry(slot)
                        .or_default()
                        .push((index, Command::Del { keys }));
                }
            }
        }
    }

    slots
        .into_iter()
        .map(|(slot, parts)| CommandGroup {
            slot: Some(slot),
            parts,
        })
        .collect()
}

fn is_empty_del(command: &Command) -> bool {
    matches!(command, Command::Del { keys } if keys.is_empty())
}

/// Reassemble per-group replies into one reply per batch command, in order
///
/// DEL counts from a split command are summed.
fn merge_replies(
    commands: &[Command],
    groups: &[CommandGroup],
    replies: Vec<Vec<Value>>,
) -> Result<Vec<Reply>, String> {
    let mut merged: Vec<Option<Reply>> = commands
        .iter()
        .map(|command| is_empty_del(command).then_some(Reply::Deleted(0)))
        .collect();

    if replies.len() != groups.len() {
        return Err(format!(
            "expected {} pipelines, got {}",
            groups.len(),
            replies.len()
        ));
    }

    for (group, values) in groups.iter().zip(replies) {
        if values.len() != group.parts.len() {
            return Err(format!(
                "expected {} replies, got {}",
                group.parts.len(),
                values.len()
            ));
        }

        for ((index, command), value) in group.parts.iter().zip(values) {
            let reply = match command {
                Command::Del { .. } => Reply::Deleted(
                    redis::from_redis_value::<u64>(&value).map_err(|e| e.to_string())?,
                ),
                Command::Set { .. } | Command::SetEx { .. } => Reply::Ok,
            };
            merged[*index] = Some(match (merged[*index], reply) {
                (Some(Reply::Deleted(seen)), Reply::Deleted(count)) => {
                    Reply::Deleted(seen + count)
                }
                (_, reply) => reply,
            });
        }
    }

    merged
        .into_iter()
        .enumerate()
        .map(|(index, reply)| reply.ok_or_else(|| format!("no reply for command {}", index)))
        .collect()
}

fn pipeline(group: &CommandGroup) -> Pipeline {
    let mut pipe = redis::pipe();
    for (_, command) in &group.parts {
        match command {
            Command::Set { key, value } => {
                pipe.cmd("SET").arg(key).arg(value);
            }
            Command::SetEx {
                key,
                value,
                seconds,
            } => {
                pipe.cmd("SETEX").arg(key).arg(seconds).arg(value);
            }
            Command::Del { keys } => {
                pipe.cmd("DEL").arg(keys);
            }
        }
    }
    pipe
}

enum Link {
    Node {
        client: Client,
        shared: Option<MultiplexedConnection>,
        connect_timeout: Option<Duration>,
    },
    Cluster {
        client: ClusterClient,
        shared: Option<ClusterConnection>,
    },
}

/// Backend over a Redis node or cluster
pub struct RedisBackend {
    target: String,
    link: Link,
    prefix: KeyPrefix,
}

impl Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (mode, persistent) = match &self.link {
            Link::Node { shared, .. } => ("node", shared.is_some()),
            Link::Cluster { shared, .. } => ("cluster", shared.is_some()),
        };

        f.debug_struct("RedisBackend")
            .field("target", &self.target)
            .field("mode", &mode)
            .field("persistent", &persistent)
            .field("prefix", &self.prefix.as_deref())
            .finish()
    }
}

impl RedisBackend {
    /// Open a single-node backend
    pub async fn connect_node(node: &NodeConfig) -> Result<Self, CacheError> {
        let target = node.address();
        let url = match node.database() {
            Some(database) => format!("redis://{}/{}", target, database),
            None => format!("redis://{}", target),
        };
        let client = Client::open(url.as_str())?;
        let connect_timeout = node.connect_timeout();

        let shared = if node.persistent {
            Some(open_node(&client, connect_timeout, &target).await?)
        } else {
            None
        };

        Ok(Self {
            target,
            link: Link::Node {
                client,
                shared,
                connect_timeout,
            },
            prefix: KeyPrefix::new(node.prefix()),
        })
    }

    /// Open an aggregate cluster backend
    pub async fn connect_cluster(cluster: &ClusterConfig) -> Result<Self, CacheError> {
        let seeds = cluster.seed_addresses();
        let options = &cluster.options;

        let mut builder =
            ClusterClient::builder(seeds.iter().map(|seed| format!("redis://{}", seed)));
        if let Some(timeout) = options.connect_timeout() {
            builder = builder.connection_timeout(timeout);
        }
        if let Some(timeout) = options.read_timeout() {
            builder = builder.response_timeout(timeout);
        }
        if let Some(policy) = options.failover_policy()? {
            if policy.reads_from_replicas() {
                builder = builder.read_from_replicas();
            }
        }
        let client = builder.build()?;

        let shared = if options.persistent {
            Some(client.get_async_connection().await?)
        } else {
            None
        };

        Ok(Self {
            target: seeds.join(","),
            link: Link::Cluster { client, shared },
            prefix: KeyPrefix::new(options.prefix()),
        })
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, CacheError> {
        match &self.link {
            Link::Node {
                client,
                shared,
                connect_timeout,
            } => {
                let mut conn = match shared {
                    Some(conn) => conn.clone(),
                    None => open_node(client, *connect_timeout, &self.target).await?,
                };
                Ok(cmd.query_async(&mut conn).await?)
            }
            Link::Cluster { client, shared } => {
                let mut conn = match shared {
                    Some(conn) => conn.clone(),
                    None => client.get_async_connection().await?,
                };
                Ok(cmd.query_async(&mut conn).await?)
            }
        }
    }

    /// Send each group as its own pipeline and collect replies per group
    async fn query_groups(&self, groups: &[CommandGroup]) -> Result<Vec<Vec<Value>>, CacheError> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        match &self.link {
            Link::Node {
                client,
                shared,
                connect_timeout,
            } => {
                let mut conn = match shared {
                    Some(conn) => conn.clone(),
                    None => open_node(client, *connect_timeout, &self.target).await?,
                };
                let mut replies = Vec::with_capacity(groups.len());
                for group in groups {
                    replies.push(pipeline(group).query_async(&mut conn).await?);
                }
                Ok(replies)
            }
            Link::Cluster { client, shared } => {
                let conn = match shared {
                    Some(conn) => conn.clone(),
                    None => client.get_async_connection().await?,
                };

                let mut tasks = JoinSet::new();
                for (position, group) in groups.iter().enumerate() {
                    let mut conn = conn.clone();
                    let pipe = pipeline(group);
                    tasks.spawn(async move {
                        let values: redis::RedisResult<Vec<Value>> =
                            pipe.query_async(&mut conn).await;
                        (position, values)
                    });
                }

                let mut replies = vec![Vec::new(); groups.len()];
                while let Some(joined) = tasks.join_next().await {
                    let (position, values) = joined.map_err(|e| {
                        CacheError::Connection(format!("slot pipeline aborted: {}", e))
                    })?;
                    replies[position] = values?;
                }
                Ok(replies)
            }
        }
    }

    /// Prefixed commands grouped the way this connection can pipeline them
    fn plan(&self, batch: &Batch) -> (Vec<Command>, Vec<CommandGroup>) {
        let commands: Vec<Command> = batch
            .commands()
            .iter()
            .map(|command| self.prefix.apply_command(command))
            .collect();

        let groups = match &self.link {
            Link::Node { .. } => single_group(&commands),
            Link::Cluster { .. } => split_by_slot(&commands),
        };
        (commands, groups)
    }
}

async fn open_node(
    client: &Client,
    connect_timeout: Option<Duration>,
    target: &str,
) -> Result<MultiplexedConnection, CacheError> {
    match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Timeout(format!("connecting to {} after {:?}", target, limit)))?
            .map_err(CacheError::from),
        None => Ok(client.get_multiplexed_async_connection().await?),
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.query(redis::cmd("GET").arg(self.prefix.apply(key))).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.query(redis::cmd("MGET").arg(self.prefix.apply_all(keys)))
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.query(redis::cmd("SET").arg(self.prefix.apply(key)).arg(value))
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError> {
        self.query(
            redis::cmd("SETEX")
                .arg(self.prefix.apply(key))
                .arg(seconds)
                .arg(value),
        )
        .await
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("DEL").arg(self.prefix.apply_all(keys)))
            .await
    }

    async fn flush_db(&self) -> Result<(), CacheError> {
        self.query(&redis::cmd("FLUSHDB")).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let _: String = self.query(&redis::cmd("PING")).await?;
        Ok(())
    }

    async fn execute_batch(&self, batch: &Batch) -> Result<Vec<Reply>, CacheError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let failed = |message: String| CacheError::Operation {
            keys: batch.keys(),
            applied: None,
            message,
        };

        let (commands, groups) = self.plan(batch);
        crate::trace_log!(
            "Sending {} command(s) as {} pipeline(s) to {}",
            commands.len(),
            groups.len(),
            self.target
        );

        let replies = self
            .query_groups(&groups)
            .await
            .map_err(|e| failed(e.to_string()))?;

        merge_replies(&commands, &groups, replies).map_err(failed)
    }
}

/// Connector that opens [`RedisBackend`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    async fn connect_node(
        &self,
        name: &str,
        node: &NodeConfig,
    ) -> Result<Arc<dyn Backend>, CacheError> {
        let backend = RedisBackend::connect_node(node).await.map_err(|e| {
            CacheError::Connection(format!(
                "Failed to open connection '{}' to {}: {}",
                name,
                node.address(),
                e
            ))
        })?;
        crate::debug_log!("Opened connection '{}': {:?}", name, backend);
        Ok(Arc::new(backend))
    }

    async fn connect_cluster(
        &self,
        cluster: &ClusterConfig,
    ) -> Result<Arc<dyn Backend>, CacheError> {
        let backend = RedisBackend::connect_cluster(cluster)
            .await
            .map_err(|e| match e {
                CacheError::Config(_) => e,
                other => CacheError::Connection(format!(
                    "Failed to open cluster client for {}: {}",
                    cluster.seed_addresses().join(","),
                    other
                )),
            })?;
        crate::debug_log!("Opened cluster connection: {:?}", backend);
        Ok(Arc::new(backend))
    }
}
