//! Store connection, version handshake and the probe used by analysis rules.
//!
//! Everything that talks to the server goes through [`RedisStore`]. Rules and
//! global analyzers only see the [`StoreProbe`] capability so they can be
//! exercised against an in-memory fake.

use crate::error::{ProfilerError, Result, MIN_SERVER_VERSION};
use crate::models::KeyType;
use redis::{Client, Connection, ErrorKind, IntoConnectionInfo, RedisError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Keys per pipeline round trip.
const PIPELINE_CHUNK: usize = 1000;

/// Read-only queries the analysis rules may run against the store.
pub trait StoreProbe {
    /// Number of keys in the selected database.
    fn db_size(&self) -> Result<u64>;

    /// Parsed `INFO <section>` reply.
    fn info(&self, section: &str) -> Result<HashMap<String, String>>;

    /// Value of a config parameter, `None` if unknown or `CONFIG` is disabled.
    fn config_get(&self, parameter: &str) -> Result<Option<String>>;

    /// Length of each key using the type's length command.
    fn lengths(&self, key_type: KeyType, keys: &[&str]) -> Result<Vec<u64>>;

    /// Internal encoding of each key (`OBJECT ENCODING`).
    fn encodings(&self, keys: &[&str]) -> Result<Vec<String>>;

    /// Bytes reported by `MEMORY USAGE`, `None` where the server can't tell.
    fn memory_usage(&self, keys: &[&str]) -> Result<Vec<Option<u64>>>;
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
    pub ssl: bool,
    pub timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
            ssl: false,
            timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectionSettings {
    /// Human readable target, never includes the password.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }

    fn url(&self) -> String {
        let scheme = if self.ssl { "rediss" } else { "redis" };
        format!("{}://{}:{}/{}", scheme, self.host, self.port, self.db)
    }
}

/// A live connection to the store.
pub struct RedisStore {
    connection: RefCell<Connection>,
    target: String,
    version: String,
}

impl RedisStore {
    /// Connect and check that the server is recent enough.
    ///
    /// Both failures are fatal for a run; no retries are attempted.
    pub fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let target = settings.target();
        let connectivity = |source: RedisError| ProfilerError::Connectivity {
            target: target.clone(),
            source,
        };

        let mut conn_info = settings.url().into_connection_info().map_err(connectivity)?;
        conn_info.redis.password = settings.password.clone();

        let client = Client::open(conn_info).map_err(connectivity)?;
        let mut connection = client
            .get_connection_with_timeout(settings.timeout)
            .map_err(connectivity)?;

        let server_info: String = redis::cmd("INFO")
            .arg("server")
            .query(&mut connection)
            .map_err(connectivity)?;
        let version = parse_info(&server_info)
            .remove("redis_version")
            .ok_or_else(|| ProfilerError::MalformedVersion(String::from("<missing>")))?;
        check_version(&version)?;

        info!("Connected to {} (server {})", target, version);

        Ok(Self {
            connection: RefCell::new(connection),
            target,
            version,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// One `SCAN` step. Returns the next cursor and the raw key names.
    pub fn scan_batch(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<Vec<u8>>)> {
        let mut con = self.connection.borrow_mut();
        let reply = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query(&mut *con)?;
        Ok(reply)
    }

    /// Pipelined `TYPE` for a batch of raw key names.
    pub fn types(&self, keys: &[Vec<u8>]) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("TYPE").arg(key.as_slice());
        }

        let mut con = self.connection.borrow_mut();
        Ok(pipe.query(&mut *con)?)
    }

    /// Run `command <key>` for every key, chunked into pipelines.
    fn pipelined<T: redis::FromRedisValue>(&self, command: &[&str], keys: &[&str]) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(keys.len());
        let mut con = self.connection.borrow_mut();

        for chunk in keys.chunks(PIPELINE_CHUNK) {
            let mut pipe = redis::pipe();
            for key in chunk {
                pipe.cmd(command[0]);
                for word in &command[1..] {
                    pipe.arg(*word);
                }
                pipe.arg(*key);
            }
            let batch: Vec<T> = pipe.query(&mut *con)?;
            out.extend(batch);
        }

        Ok(out)
    }
}

impl StoreProbe for RedisStore {
    fn db_size(&self) -> Result<u64> {
        let mut con = self.connection.borrow_mut();
        Ok(redis::cmd("DBSIZE").query(&mut *con)?)
    }

    fn info(&self, section: &str) -> Result<HashMap<String, String>> {
        let mut con = self.connection.borrow_mut();
        let raw: String = redis::cmd("INFO").arg(section).query(&mut *con)?;
        Ok(parse_info(&raw))
    }

    fn config_get(&self, parameter: &str) -> Result<Option<String>> {
        let mut con = self.connection.borrow_mut();
        let reply: std::result::Result<Vec<String>, RedisError> =
            redis::cmd("CONFIG").arg("GET").arg(parameter).query(&mut *con);

        match reply {
            Ok(pair) => Ok(pair.into_iter().nth(1)),
            Err(e) if e.kind() == ErrorKind::ResponseError => {
                debug!("CONFIG GET {} refused: {}", parameter, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn lengths(&self, key_type: KeyType, keys: &[&str]) -> Result<Vec<u64>> {
        self.pipelined(&[length_command(key_type)], keys)
    }

    fn encodings(&self, keys: &[&str]) -> Result<Vec<String>> {
        let raw: Vec<Option<String>> = self.pipelined(&["OBJECT", "ENCODING"], keys)?;
        Ok(raw
            .into_iter()
            .map(|e| e.unwrap_or_else(|| "unknown".to_string()))
            .collect())
    }

    fn memory_usage(&self, keys: &[&str]) -> Result<Vec<Option<u64>>> {
        match self.pipelined::<Option<u64>>(&["MEMORY", "USAGE"], keys) {
            Ok(sizes) => Ok(sizes),
            Err(ProfilerError::Store(e)) if e.kind() == ErrorKind::ResponseError => {
                debug!("MEMORY USAGE unavailable: {}", e);
                Ok(vec![None; keys.len()])
            }
            Err(e) => Err(e),
        }
    }
}

/// The command returning the element count (or byte length) of a key.
pub fn length_command(key_type: KeyType) -> &'static str {
    match key_type {
        KeyType::String => "STRLEN",
        KeyType::Hash => "HLEN",
        KeyType::List => "LLEN",
        KeyType::Set => "SCARD",
        KeyType::ZSet => "ZCARD",
    }
}

/// Parse an `INFO` reply into `field -> value`, skipping section headers.
pub fn parse_info(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Fail unless `version` is at least [`MIN_SERVER_VERSION`].
pub fn check_version(version: &str) -> Result<()> {
    let mut parts = version.split('.').map(|p| p.parse::<u32>());
    let (major, minor) = match (parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor))) => (major, minor),
        _ => return Err(ProfilerError::MalformedVersion(version.to_string())),
    };

    if (major, minor) >= MIN_SERVER_VERSION {
        Ok(())
    } else {
        Err(ProfilerError::IncompatibleVersion {
            found: version.to_string(),
            required: format!("{}.{}", MIN_SERVER_VERSION.0, MIN_SERVER_VERSION.1),
        })
    }
}
