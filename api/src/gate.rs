// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Authentication and admission in front of protected routes.
//!
//! The caller is resolved first; a token is only consumed for a verified
//! identity, so anonymous traffic can never drain someone else's bucket.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::admission::EndpointLimit;
use crate::application::AppState;
use crate::constants::{API_KEY_HEADER, USER_ID_HEADER};
use crate::errors::AppError;

/// The verified caller, available to handlers as an `Extension`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub id: Uuid,
    pub username: String,
}

/// Middleware state for one protected endpoint.
#[derive(Clone)]
pub struct Gate {
    state: Arc<AppState>,
    limit: EndpointLimit,
}

impl Gate {
    pub fn new(state: Arc<AppState>, limit: EndpointLimit) -> Self {
        Self { state, limit }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[tracing::instrument(skip_all, fields(endpoint = gate.limit.name))]
pub async fn admit(
    State(gate): State<Gate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (user_id, api_key) = match (
        header(request.headers(), USER_ID_HEADER),
        header(request.headers(), API_KEY_HEADER),
    ) {
        (Some(user_id), Some(api_key)) => {
            (user_id.to_string(), Zeroizing::new(api_key.to_string()))
        }
        _ => {
            tracing::debug!("[api] missing credential headers");
            return Err(AppError::Unauthenticated);
        }
    };

    let identity = gate.state.credentials.verify(&user_id, &api_key).await?;
    gate.state.admission.check(&gate.limit, identity.id).await?;

    request.extensions_mut().insert(AuthenticatedIdentity {
        id: identity.id,
        username: identity.username,
    });
    Ok(next.run(request).await)
}
