// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Intake API
//!
//! HTTP service for a symptom-intake workflow, authenticated by rotating
//! API keys and throttled by token buckets shared between instances.
//!
//! ## Architecture
//!
//! ```text
//! Client -> HTTP API -> gate (verify key, take token) -> handler
//!                            |                 |
//!                            |                 +-> bucket store (Redis or memory)
//!                            +-> identity store + intake-vault (decrypt, compare)
//! ```
//!
//! ## Modules
//!
//! - [`admission`]: token-bucket admission controller and its store trait
//! - [`application`]: Axum router, shared state and server setup
//! - [`buckets`]: in-process bucket store
//! - [`clock`]: wall clock and a manual clock for tests
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: headers, endpoint limits and validation bounds
//! - [`errors`]: application error types with HTTP response mapping
//! - [`gate`]: authentication and admission middleware
//! - [`identity`]: identity records and their store
//! - [`lifecycle`]: API key issuance, verification, rotation and revocation
//! - [`models`]: request/response types with validation
//! - [`provider`]: analysis provider trait and error taxonomy
//! - [`redis_buckets`]: Redis bucket store driven by a Lua script
//! - [`routes`]: HTTP route handlers
//! - [`submissions`]: symptom submissions and their store
//!
//! ## Usage
//!
//! ```bash
//! export INTAKE_CREDENTIAL_KEY=$(intake-api --generate-key)
//! intake-api --port 8080 --redis-url redis://127.0.0.1:6379
//! ```
//!
//! ## Security Considerations
//!
//! - Only ciphertext of API keys is stored; plaintext is zeroized on drop
//! - Unknown users and wrong secrets are indistinguishable to the caller
//! - Tokens are only consumed after the caller has been verified
//! - Bucket store outages reject protected requests unless configured to fail open

pub mod admission;
pub mod application;
pub mod buckets;
pub mod clock;
pub mod configuration;
pub mod constants;
pub mod errors;
pub mod gate;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod provider;
pub mod redis_buckets;
pub mod routes;
pub mod submissions;
