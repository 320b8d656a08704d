use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use super::auth::AuthUser;
use crate::auth::Role;
use crate::error::ApiError;

/// Role gate. Must sit inside the credential verifier.
#[derive(Clone, Debug)]
pub struct RoleGateLayer {
    allowed: Arc<[Role]>,
}

impl RoleGateLayer {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn admin_only() -> Self {
        Self::new([Role::Admin])
    }
}

impl<S> Layer<S> for RoleGateLayer {
    type Service = RoleGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RoleGate {
            inner,
            allowed: self.allowed.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoleGate<S> {
    inner: S,
    allowed: Arc<[Role]>,
}

/// Decide whether an identity may pass a gate configured with `allowed`
pub fn check_role(user: Option<&AuthUser>, allowed: &[Role]) -> Result<(), ApiError> {
    let user = user.ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
    if !allowed.contains(&user.role) {
        tracing::debug!("User {} ({}) denied, needs one of {:?}", user.username, user.role, allowed);
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    Ok(())
}

impl<S> Service<Request> for RoleGate<S>
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
        if let Err(e) = check_role(req.extensions().get::<AuthUser>(), &self.allowed) {
            return Box::pin(async move { Ok(e.into_response()) });
        }
        Box::pin(self.inner.call(req))
    }
}
