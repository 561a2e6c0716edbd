// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::serve::Serve;
use intake_vault::Vault;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admission::{AdmissionController, AdmissionSettings, BucketStore};
use crate::clock::Clock;
use crate::configuration::ServiceOptions;
use crate::constants::{
    MAX_BODY_SIZE, REQUEST_TIMEOUT, REVOKE_CREDENTIAL_LIMIT, SYMPTOM_CHECK_LIMIT,
    SYMPTOM_HISTORY_LIMIT,
};
use crate::gate::{self, Gate};
use crate::identity::IdentityStore;
use crate::lifecycle::CredentialManager;
use crate::provider::AnalysisProvider;
use crate::routes;
use crate::submissions::SubmissionStore;

pub struct AppState {
    pub credentials: CredentialManager,
    pub admission: AdmissionController,
    pub submissions: Arc<dyn SubmissionStore>,
    pub provider: Arc<dyn AnalysisProvider>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        vault: Arc<Vault>,
        identities: Arc<dyn IdentityStore>,
        buckets: Arc<dyn BucketStore>,
        submissions: Arc<dyn SubmissionStore>,
        provider: Arc<dyn AnalysisProvider>,
        clock: Arc<dyn Clock>,
        settings: AdmissionSettings,
    ) -> Self {
        Self {
            credentials: CredentialManager::new(identities, vault, clock.clone()),
            admission: AdmissionController::new(buckets, clock.clone(), settings),
            submissions,
            provider,
            clock,
        }
    }
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(
        options: &ServiceOptions,
        state: Arc<AppState>,
    ) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(address).await?;
        let server = run(listener, state)?;
        let port = server.local_addr()?.port();

        tracing::info!("[api] listening at http://{}:{}", options.host, port);

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Routes plus the middleware stack shared by production and tests.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/auth/signup", post(routes::signup))
        .route("/auth/signin", post(routes::signin))
        .route(
            "/auth/revoke",
            post(routes::revoke).route_layer(middleware::from_fn_with_state(
                Gate::new(state.clone(), REVOKE_CREDENTIAL_LIMIT),
                gate::admit,
            )),
        )
        .route(
            "/symptom-check",
            post(routes::symptom_check).route_layer(middleware::from_fn_with_state(
                Gate::new(state.clone(), SYMPTOM_CHECK_LIMIT),
                gate::admit,
            )),
        )
        .route(
            "/symptom-history",
            get(routes::symptom_history).route_layer(middleware::from_fn_with_state(
                Gate::new(state.clone(), SYMPTOM_HISTORY_LIMIT),
                gate::admit,
            )),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tracing::instrument(skip_all)]
pub fn run(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<Serve<TcpListener, Router, Router>, std::io::Error> {
    let app = create_router(state);
    Ok(axum::serve(listener, app))
}
