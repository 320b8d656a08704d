use axum::{
    handler::Handler,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::audit::{AuditAction, AuditRecorder, AuditStore, EntityType};
use crate::auth::{JwtError, JwtKeys};
use crate::config::AppConfig;
use crate::handlers::{self, clients, history, proposals, users};
use crate::middleware::{
    authenticate, detect_sql_injection, reject_injected_params, sanitize_input, security_logger,
    AuditLayer, RoleGateLayer,
};

/// Shared per-process state handed to every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub keys: Arc<JwtKeys>,
    pub audit: AuditRecorder,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        pool: PgPool,
        audit_store: Arc<dyn AuditStore>,
    ) -> Result<Self, JwtError> {
        let keys = JwtKeys::from_config(&config.security)?;
        let audit = AuditRecorder::new(audit_store, config.security.enable_audit_logging);
        Ok(Self {
            config: Arc::new(config),
            pool,
            keys: Arc::new(keys),
            audit,
        })
    }

    pub fn audit_layer(&self, action: AuditAction, entity: EntityType) -> AuditLayer {
        AuditLayer::new(self.audit.clone(), action, entity)
    }
}

/// Full application router with the request filters in front of it.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(user_routes(&state))
        .merge(client_routes(&state))
        .merge(proposal_routes(&state))
        .merge(history_routes(&state))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let routes = Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/validate", post(handlers::auth::validate))
        .merge(protected)
        .route_layer(middleware::from_fn(reject_injected_params))
        .fallback(handlers::not_found)
        .with_state(state.clone());

    with_request_filters(routes, &state)
}

/// Put the pre-routing stages in front of an already routed application.
///
/// `routes` becomes the fallback service of an empty router so the sanitizer can
/// rewrite the URI before routing happens.
pub fn with_request_filters(routes: Router, state: &AppState) -> Router {
    Router::new()
        .fallback_service(routes)
        .layer(middleware::from_fn(detect_sql_injection))
        .layer(middleware::from_fn_with_state(state.clone(), sanitize_input))
        .layer(middleware::from_fn(security_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.security.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use AuditAction::*;

    Router::new()
        .route(
            "/api/users",
            get(users::list).post(users::create.layer(state.audit_layer(Create, EntityType::User))),
        )
        .route(
            "/api/users/:id",
            get(users::show)
                .put(users::update.layer(state.audit_layer(Update, EntityType::User)))
                .delete(users::delete.layer(state.audit_layer(Delete, EntityType::User))),
        )
        .route_layer(RoleGateLayer::admin_only())
}

fn client_routes(state: &AppState) -> Router<AppState> {
    use AuditAction::*;

    Router::new()
        .route(
            "/api/clients",
            get(clients::list)
                .post(clients::create.layer(state.audit_layer(Create, EntityType::Client))),
        )
        .route(
            "/api/clients/:id",
            get(clients::show)
                .put(clients::update.layer(state.audit_layer(Update, EntityType::Client)))
                .delete(
                    clients::delete
                        .layer(state.audit_layer(Delete, EntityType::Client))
                        .layer(RoleGateLayer::admin_only()),
                ),
        )
        .route("/api/clients/cpf/:cpf", get(clients::by_cpf))
}

fn proposal_routes(state: &AppState) -> Router<AppState> {
    use AuditAction::*;

    Router::new()
        .route(
            "/api/proposals",
            get(proposals::list)
                .post(proposals::create.layer(state.audit_layer(Create, EntityType::Proposal))),
        )
        .route("/api/proposals/stats/overview", get(proposals::stats))
        .route("/api/proposals/client/:client_id", get(proposals::by_client))
        .route(
            "/api/proposals/:id",
            get(proposals::show)
                .put(proposals::update.layer(state.audit_layer(Update, EntityType::Proposal)))
                .delete(
                    proposals::delete
                        .layer(state.audit_layer(Delete, EntityType::Proposal))
                        .layer(RoleGateLayer::admin_only()),
                ),
        )
}

fn history_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/history/proposal/:proposal_id", get(history::proposal_history))
        .route("/api/history/interactions/:client_id", get(history::interactions))
        .route(
            "/api/history/interactions",
            post(history::create_interaction.layer(
                state.audit_layer(AuditAction::Create, EntityType::Interaction),
            )),
        )
        .route("/api/history/audit", get(history::audit_page))
        .route("/api/history/audit/:entity_type/:entity_id", get(history::audit_for_entity))
}
