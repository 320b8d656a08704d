use axum::{
    extract::{ConnectInfo, FromRequestParts, RawPathParams, Request},
    http::{header::USER_AGENT, HeaderMap},
    response::Response,
};
use futures::future::BoxFuture;
use std::{
    net::SocketAddr,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use super::auth::AuthUser;
use super::response::AuditPayload;
use crate::audit::{AuditAction, AuditEntry, AuditRecorder, EntityType};

/// Wraps a mutating handler so its successful responses are recorded.
///
/// UPDATE and DELETE read the row named by the `:id` route parameter before the
/// handler runs. The record itself is written on a detached task.
#[derive(Clone)]
pub struct AuditLayer {
    recorder: AuditRecorder,
    action: AuditAction,
    entity: EntityType,
}

impl AuditLayer {
    pub fn new(recorder: AuditRecorder, action: AuditAction, entity: EntityType) -> Self {
        Self {
            recorder,
            action,
            entity,
        }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = Audited<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Audited {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Audited<S> {
    inner: S,
    layer: AuditLayer,
}

impl<S> Service<Request> for Audited<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let AuditLayer {
            recorder,
            action,
            entity,
        } = self.layer.clone();

        // The clone is not the instance poll_ready was called on; keep the ready one.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            let route_id = RawPathParams::from_request_parts(&mut parts, &())
                .await
                .ok()
                .and_then(|params| {
                    params
                        .iter()
                        .find(|(name, _)| *name == "id")
                        .and_then(|(_, value)| value.parse::<i32>().ok())
                });

            let user_id = parts.extensions.get::<AuthUser>().map(|user| user.id);
            let ip_address = client_ip(
                &parts.headers,
                parts.extensions.get::<ConnectInfo<SocketAddr>>(),
            );
            let user_agent = user_agent(&parts.headers);

            let old_data = match route_id {
                Some(id) if action.captures_prior_state() => recorder.capture_prior(entity, id).await,
                _ => None,
            };

            let response = inner.call(Request::from_parts(parts, body)).await?;

            if !response.status().is_success() {
                return Ok(response);
            }

            if let Some(AuditPayload(payload)) = response.extensions().get::<AuditPayload>() {
                let entity_id = payload
                    .get("id")
                    .and_then(|id| id.as_i64())
                    .and_then(|id| i32::try_from(id).ok())
                    .or(route_id);

                if let Some(entity_id) = entity_id {
                    let new_data = match action {
                        AuditAction::Delete => None,
                        _ => Some(payload.clone()),
                    };
                    let entry = AuditEntry::new(action, entity, entity_id)
                        .by(user_id)
                        .from_origin(ip_address, user_agent)
                        .with_data(old_data, new_data);
                    recorder.record_detached(entry);
                }
            }

            Ok(response)
        })
    }
}

/// First `X-Forwarded-For` entry, else the socket address, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, connect_info) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(ConnectInfo(addr))) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
