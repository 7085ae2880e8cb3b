// crates/ccguard-store-redis/src/connection.rs
// ============================================================================
// Module: Redis Hash Connection
// Description: Minimal hash-command surface used by the Redis store.
// Purpose: Isolate the network client behind a small, fakeable trait.
// Dependencies: redis
// ============================================================================

//! ## Overview
//! [`HashConnection`] lists the five hash commands the store needs.
//! [`RedisConnection`] implements them over a synchronous `redis` client
//! connection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use redis::Client;
use redis::Commands;
use redis::ConnectionAddr;
use redis::ConnectionInfo;
use redis::RedisConnectionInfo;

use crate::store::RedisStoreConfig;
use crate::store::RedisStoreError;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Hash commands required by [`crate::RedisReferenceStore`].
pub trait HashConnection {
    /// Returns the field names of a hash (`HKEYS`).
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError`] when the command fails.
    fn hkeys(&mut self, key: &str) -> Result<Vec<String>, RedisStoreError>;

    /// Returns one field of a hash (`HGET`).
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError`] when the command fails.
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<Vec<u8>>, RedisStoreError>;

    /// Sets a field only when it is absent (`HSETNX`); returns true if set.
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError`] when the command fails.
    fn hset_nx(&mut self, key: &str, field: &str, value: &[u8]) -> Result<bool, RedisStoreError>;

    /// Sets a field unconditionally (`HSET`).
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError`] when the command fails.
    fn hset(&mut self, key: &str, field: &str, value: &[u8]) -> Result<(), RedisStoreError>;

    /// Returns every field of a hash (`HGETALL`).
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError`] when the command fails.
    fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, Vec<u8>>, RedisStoreError>;
}

// ============================================================================
// SECTION: Redis Client
// ============================================================================

/// Synchronous Redis connection.
pub struct RedisConnection {
    /// Underlying client connection.
    inner: redis::Connection,
}

impl RedisConnection {
    /// Connects to the configured Redis server.
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError::Connection`] when the server is unreachable.
    pub fn connect(config: &RedisStoreConfig) -> Result<Self, RedisStoreError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: config.password.clone(),
                ..RedisConnectionInfo::default()
            },
        };
        let client = Client::open(info).map_err(connection_error)?;
        let timeout = Duration::from_millis(config.timeout_ms);
        let inner = client.get_connection_with_timeout(timeout).map_err(connection_error)?;
        inner.set_read_timeout(Some(timeout)).map_err(connection_error)?;
        inner.set_write_timeout(Some(timeout)).map_err(connection_error)?;
        Ok(Self {
            inner,
        })
    }
}

impl HashConnection for RedisConnection {
    fn hkeys(&mut self, key: &str) -> Result<Vec<String>, RedisStoreError> {
        self.inner.hkeys(key).map_err(command_error)
    }

    fn hget(&mut self, key: &str, field: &str) -> Result<Option<Vec<u8>>, RedisStoreError> {
        self.inner.hget(key, field).map_err(command_error)
    }

    fn hset_nx(&mut self, key: &str, field: &str, value: &[u8]) -> Result<bool, RedisStoreError> {
        self.inner.hset_nx(key, field, value).map_err(command_error)
    }

    fn hset(&mut self, key: &str, field: &str, value: &[u8]) -> Result<(), RedisStoreError> {
        self.inner.hset(key, field, value).map_err(command_error)
    }

    fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, Vec<u8>>, RedisStoreError> {
        self.inner.hgetall(key).map_err(command_error)
    }
}

/// Maps client errors raised while connecting.
fn connection_error(err: redis::RedisError) -> RedisStoreError {
    RedisStoreError::Connection(err.to_string())
}

/// Maps client errors raised by commands.
fn command_error(err: redis::RedisError) -> RedisStoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        RedisStoreError::Connection(err.to_string())
    } else {
        RedisStoreError::Command(err.to_string())
    }
}
