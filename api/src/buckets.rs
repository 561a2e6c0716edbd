// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::admission::{BucketOutcome, BucketState, BucketStore, EndpointLimit, step};
use crate::constants::{BUCKET_SHARDS, BUCKET_SWEEP_INTERVAL};
use crate::errors::StoreError;

struct Entry {
    state: BucketState,
    expires: Instant,
}

#[derive(Default)]
struct Shard {
    buckets: HashMap<String, Entry>,
    next_sweep: Option<Instant>,
}

impl Shard {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, entry| entry.expires > now);
        self.next_sweep = Some(now + BUCKET_SWEEP_INTERVAL);
        before - self.buckets.len()
    }
}

/// Single-process bucket store. Only suitable for one service instance.
///
/// Keys are spread over independently locked shards. Each shard drops its
/// expired entries at most once per sweep interval while serving a take;
/// [`MemoryBucketStore::purge_expired`] reclaims shards that see no traffic.
pub struct MemoryBucketStore {
    shards: Box<[Mutex<Shard>]>,
    hasher: RandomState,
}

impl Default for MemoryBucketStore {
    fn default() -> Self {
        Self::with_shards(BUCKET_SHARDS)
    }
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(count: usize) -> Self {
        Self {
            shards: (0..count.max(1)).map(|_| Mutex::default()).collect(),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &str) -> &Mutex<Shard> {
        let index = self.hasher.hash_one(key) % self.shards.len() as u64;
        &self.shards[index as usize]
    }

    /// Live (unexpired) buckets.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut live = 0;
        for shard in self.shards.iter() {
            let shard = shard.lock().await;
            live += shard.buckets.values().filter(|entry| entry.expires > now).count();
        }
        live
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every expired bucket and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in self.shards.iter() {
            removed += shard.lock().await.sweep(now);
        }
        removed
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn take(
        &self,
        key: &str,
        limit: &EndpointLimit,
        now: f64,
        idle_ttl: Duration,
    ) -> Result<BucketOutcome, StoreError> {
        let instant = Instant::now();
        let mut shard = self.shard(key).lock().await;

        if shard.next_sweep.is_none_or(|at| instant >= at) {
            shard.sweep(instant);
        }

        let current = match shard.buckets.get(key) {
            Some(entry) if entry.expires > instant => Some(entry.state),
            _ => None,
        };

        let (outcome, next) = step(current, limit, now);
        match next {
            Some(state) => {
                shard.buckets.insert(
                    key.to_string(),
                    Entry {
                        state,
                        expires: instant + idle_ttl,
                    },
                );
            }
            None if current.is_none() => {
                shard.buckets.remove(key);
            }
            None => {}
        }

        Ok(outcome)
    }
}
