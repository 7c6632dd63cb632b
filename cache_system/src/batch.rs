//! Pipelined write batches
//!
//! A [`Batch`] is a plain list of write commands. Backends send every command
//! before reading any reply, so a batch costs one network round trip (one per
//! hash slot on a cluster). It is not a transaction: a failure part-way
//! through can leave earlier commands applied.

/// One write command inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
    SetEx { key: String, value: String, seconds: u64 },
    Del { keys: Vec<String> },
}

/// Reply to one batched command, in command order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Deleted(u64),
}

impl Command {
    /// Keys this command writes
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Set { key, .. } | Self::SetEx { key, .. } => vec![key.as_str()],
            Self::Del { keys } => keys.iter().map(String::as_str).collect(),
        }
    }
}

/// Ordered list of commands executed as one pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn set_ex(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        seconds: u64,
    ) -> &mut Self {
        self.commands.push(Command::SetEx {
            key: key.into(),
            value: value.into(),
            seconds,
        });
        self
    }

    /// Queue a delete; an empty key list queues nothing
    pub fn del<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if !keys.is_empty() {
            self.commands.push(Command::Del { keys });
        }
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every key touched by the batch, in command order
    pub fn keys(&self) -> Vec<String> {
        self.commands
            .iter()
            .flat_map(Command::keys)
            .map(str::to_string)
            .collect()
    }
}
