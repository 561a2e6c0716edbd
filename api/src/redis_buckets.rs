// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;

use crate::admission::{BucketOutcome, BucketStore, EndpointLimit};
use crate::errors::StoreError;

// KEYS[1] bucket key
// ARGV capacity, refill_rate, now, idle ttl (seconds)
// Returns {admitted, tokens}. Tokens travel as a string since Lua numbers
// in a reply table are truncated to integers.
const TAKE_TOKEN_SCRIPT: &str = r"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local state = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(state[1])
local ts = tonumber(state[2])
if tokens == nil or ts == nil then
  tokens = capacity
  ts = now
end

local elapsed = math.max(0, now - ts)
tokens = math.min(capacity, tokens + elapsed * refill_rate)

if tokens < 1 then
  return {0, tostring(tokens)}
end

tokens = tokens - 1
redis.call('HSET', key, 'tokens', tostring(tokens), 'ts', ARGV[3])
redis.call('EXPIRE', key, ttl)
return {1, tostring(tokens)}
";

/// Buckets shared by every instance through one Redis server.
///
/// The refill/consume step runs as a server-side script, so concurrent
/// callers on any instance are serialized per key by Redis itself.
#[derive(Clone)]
pub struct RedisBucketStore {
    connection: ConnectionManager,
    script: Script,
}

impl RedisBucketStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self::new(connection))
    }

    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            script: Script::new(TAKE_TOKEN_SCRIPT),
        }
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    #[tracing::instrument(skip(self, limit))]
    async fn take(
        &self,
        key: &str,
        limit: &EndpointLimit,
        now: f64,
        idle_ttl: Duration,
    ) -> Result<BucketOutcome, StoreError> {
        // the manager is a cheap handle onto one multiplexed connection
        let mut connection = self.connection.clone();

        let (admitted, tokens): (i64, String) = self
            .script
            .key(key)
            .arg(limit.capacity)
            .arg(limit.refill_rate)
            .arg(now)
            .arg(idle_ttl.as_secs().max(1))
            .invoke_async(&mut connection)
            .await?;

        let tokens = tokens.parse::<f64>().map_err(|e| {
            StoreError::Unavailable(format!("unexpected token count {tokens:?}: {e}"))
        })?;

        Ok(BucketOutcome {
            admitted: admitted == 1,
            tokens,
        })
    }
}
