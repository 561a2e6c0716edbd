// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use intake_api::admission::BucketStore;
use intake_api::application::{AppState, Application};
use intake_api::buckets::MemoryBucketStore;
use intake_api::clock::SystemClock;
use intake_api::configuration::ServiceOptions;
use intake_api::constants::BUCKET_SWEEP_INTERVAL;
use intake_api::identity::MemoryIdentityStore;
use intake_api::provider::UnconfiguredProvider;
use intake_api::redis_buckets::RedisBucketStore;
use intake_api::submissions::MemorySubmissionStore;
use intake_vault::{CredentialKey, Vault};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // get configuration options from command line arguments or environment variables
    let options = ServiceOptions::parse();

    if options.generate_key {
        let key = CredentialKey::generate().context("unable to generate credential key")?;
        println!("{}", key.to_base64());
        return Ok(());
    }

    println!("[api] init");

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        // span fields are already on every event
        .with_current_span(false)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();

    tracing::info!("[api] {:?}", &options);

    let encoded = options
        .credential_key
        .as_deref()
        .context("missing credential key")?;
    let key = CredentialKey::from_base64(encoded).context("invalid credential key")?;
    let vault = Vault::new(&key, options.vault_policy()).context("invalid credential key")?;
    drop(key);

    let buckets: Arc<dyn BucketStore> = match options.redis_url.as_deref() {
        Some(url) => {
            tracing::info!("[api] using shared bucket store");
            Arc::new(
                RedisBucketStore::connect(url)
                    .await
                    .context("unable to connect to bucket store")?,
            )
        }
        None => {
            tracing::warn!("[api] no redis url configured, buckets are local to this instance");
            let store = Arc::new(MemoryBucketStore::new());
            let sweeper = store.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(BUCKET_SWEEP_INTERVAL).await;
                    let removed = sweeper.purge_expired().await;
                    tracing::debug!("[api] dropped {} idle buckets", removed);
                }
            });
            store as Arc<dyn BucketStore>
        }
    };

    let state = Arc::new(AppState::new(
        Arc::new(vault),
        Arc::new(MemoryIdentityStore::new()),
        buckets,
        Arc::new(MemorySubmissionStore::new()),
        Arc::new(UnconfiguredProvider),
        Arc::new(SystemClock),
        options.admission_settings(),
    ));

    let application = Application::build(&options, state).await?;

    application.run_until_stopped().await?;
    Ok(())
}
