use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;
use crate::users;

#[derive(OpenApi)]
#[openapi(
    paths(
        users::handlers::list_users,
        users::handlers::register,
        users::handlers::login,
        users::handlers::update_profile,
        users::handlers::update_role,
        users::handlers::delete_user,
    ),
    components(schemas(
        users::dto::RegisterRequest,
        users::dto::LoginRequest,
        users::dto::UpdateProfileRequest,
        users::dto::UpdateRoleRequest,
        users::dto::PublicUser,
        users::dto::UsersListResponse,
        users::dto::UserResponse,
        users::dto::LoginResponse,
        users::dto::RoleUser,
        users::dto::RoleResponse,
        users::dto::MessageResponse,
        users::repo::Role,
        crate::error::ErrorBody,
    )),
    tags((name = "users", description = "User CRUD and authentication"))
)]
pub struct ApiDoc;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "API is running" }))
        .nest("/users", users::router())
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
