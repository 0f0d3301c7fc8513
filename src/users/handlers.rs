use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ErrorBody},
    state::AppState,
};

use super::dto::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RoleResponse, RoleUser,
    UpdateProfileRequest, UpdateRoleRequest, UserResponse, UsersListResponse,
};
use super::password::{hash_password, verify_password};
use super::repo::{NewUser, ProfileChanges, Role, User};
use super::validate::{is_valid_email, is_valid_phone, normalize_email};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/:id", put(update_profile).delete(delete_user))
        .route("/:id/role", patch(update_role))
}

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        warn!(id = %raw, "malformed user id");
        ApiError::BadRequest("Invalid user id".into())
    })
}

/// Trimmed value, or `None` when the field was absent or blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses((status = 200, description = "All users, passwords excluded", body = UsersListResponse))
)]
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UsersListResponse>, ApiError> {
    let users = User::find_all(&state.db).await?;
    Ok(Json(UsersListResponse {
        success: true,
        users,
    }))
}

#[utoipa::path(
    post,
    path = "/users/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Missing or invalid fields, or email taken", body = ErrorBody)
    )
)]
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(payload) = payload?;

    let (Some(name), Some(email), Some(phone), Some(password)) = (
        non_blank(payload.name.as_deref()),
        non_blank(payload.email.as_deref()),
        non_blank(payload.phone.as_deref()),
        non_blank(payload.password.as_deref()),
    ) else {
        warn!("registration with missing fields");
        return Err(ApiError::BadRequest("All fields are required".into()));
    };

    let email = normalize_email(email);

    let mut problems = Vec::new();
    if !is_valid_email(&email) {
        problems.push("Please enter a valid email address".to_string());
    }
    if !is_valid_phone(phone) {
        problems.push("Please enter a valid phone number".to_string());
    }
    let role = match payload.role.as_deref() {
        None => Role::User,
        Some(raw) => match Role::parse(raw) {
            Some(role) => role,
            None => {
                problems.push("Role must be either 'user' or 'admin'".to_string());
                Role::User
            }
        },
    };
    if !problems.is_empty() {
        return Err(ApiError::Validation(problems));
    }

    // Friendly pre-check; the unique index still backstops it under
    // concurrent registrations.
    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::BadRequest("Email already registered".into()));
    }

    let password_hash = hash_password(password, state.config.bcrypt_cost)?;
    let user = User::insert(
        &state.db,
        &NewUser {
            name: name.to_string(),
            email,
            phone: phone.to_string(),
            password_hash,
            role,
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            success: true,
            message: "User registered successfully".into(),
            user: user.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials match", body = LoginResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 401, description = "Unknown email or wrong password", body = ErrorBody)
    )
)]
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload?;

    let (Some(email), Some(password)) = (
        non_blank(payload.email.as_deref()),
        non_blank(payload.password.as_deref()),
    ) else {
        warn!("login with missing fields");
        return Err(ApiError::BadRequest("Email and password are required".into()));
    };

    let email = normalize_email(email);

    // Unknown email and wrong password produce the identical response so a
    // caller cannot probe which accounts exist.
    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid email or password".into()));
        }
    };

    if !verify_password(password, &user.password_hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        role: user.role,
    }))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    request_body = UpdateProfileRequest,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Malformed id, invalid field, or email taken", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_user_id(&id)?;
    let Json(payload) = payload?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let mut changes = ProfileChanges::default();
    if let Some(name) = non_blank(payload.name.as_deref()) {
        changes.name = Some(name.to_string());
    }
    if let Some(phone) = non_blank(payload.phone.as_deref()) {
        if !is_valid_phone(phone) {
            return Err(ApiError::Validation(vec![
                "Please enter a valid phone number".to_string(),
            ]));
        }
        changes.phone = Some(phone.to_string());
    }
    if let Some(email) = non_blank(payload.email.as_deref()) {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ApiError::Validation(vec![
                "Please enter a valid email address".to_string(),
            ]));
        }
        if email != user.email && User::email_taken_by_other(&state.db, &email, id).await? {
            warn!(email = %email, "email already held by another user");
            return Err(ApiError::BadRequest("Email already registered".into()));
        }
        changes.email = Some(email);
    }
    if let Some(password) = non_blank(payload.password.as_deref()) {
        // Hash only here, where the password actually changes; untouched
        // saves keep the stored digest as is.
        changes.password_hash = Some(hash_password(password, state.config.bcrypt_cost)?);
    }

    let updated = User::update_profile(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %updated.id, "user profile updated");
    Ok(Json(UserResponse {
        success: true,
        message: "User updated successfully".into(),
        user: updated.into(),
    }))
}

#[utoipa::path(
    patch,
    path = "/users/{id}/role",
    tag = "users",
    request_body = UpdateRoleRequest,
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Role changed", body = RoleResponse),
        (status = 400, description = "Malformed id, invalid role, or role unchanged", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
#[instrument(skip(state, payload))]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<Json<RoleResponse>, ApiError> {
    let id = parse_user_id(&id)?;
    let Json(payload) = payload?;

    let role = payload
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| ApiError::BadRequest("Role must be either 'user' or 'admin'".into()))?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    // Assigning the role a user already holds is rejected rather than
    // treated as an idempotent success.
    if user.role == role {
        warn!(user_id = %user.id, role = %role, "role unchanged");
        return Err(ApiError::BadRequest(format!(
            "User already has role '{role}'"
        )));
    }

    let updated = User::update_role(&state.db, id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %updated.id, role = %updated.role, "user role updated");
    Ok(Json(RoleResponse {
        success: true,
        message: "User role updated successfully".into(),
        user: RoleUser {
            id: updated.id,
            role: updated.role,
        },
    }))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_user_id(&id)?;

    // Single DELETE .. RETURNING: no separate existence check to race.
    match User::delete_by_id(&state.db, id).await? {
        Some(deleted) => {
            info!(user_id = %deleted, "user deleted");
            Ok(Json(MessageResponse {
                success: true,
                message: "User deleted successfully".into(),
            }))
        }
        None => Err(ApiError::NotFound("User not found".into())),
    }
}


// End-to-end behavior against a real database; each test gets its own
// migrated schema from the sqlx test harness.
#[cfg(test)]
mod db_tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use sqlx::PgPool;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;

    fn app(pool: PgPool) -> Router {
        // Minimum bcrypt cost keeps the tests fast.
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 5000,
            database_url: String::new(),
            bcrypt_cost: 4,
        });
        Router::new()
            .nest("/users", user_routes())
            .with_state(AppState::from_parts(pool, config))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn register(app: &Router, name: &str, email: &str, phone: &str, password: &str) -> serde_json::Value {
        let (status, body) = send(
            app,
            json_request(
                "POST",
                "/users/register",
                json!({"name": name, "email": email, "phone": phone, "password": password}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    #[sqlx::test]
    async fn registration_normalizes_email_and_never_returns_a_password(pool: PgPool) {
        let app = app(pool);
        let body = register(&app, "A", "A@x.com", "9876543210", "p1").await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "a@x.com");
        assert!(body["user"]["id"].is_string());
        let keys: Vec<&String> = body["user"].as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|k| !k.contains("password")));
    }

    #[sqlx::test]
    async fn second_registration_with_same_email_conflicts(pool: PgPool) {
        let app = app(pool);
        register(&app, "A", "a@x.com", "9876543210", "p1").await;

        // Differs only in case; uniqueness is case-insensitive through
        // normalization.
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/users/register",
                json!({"name": "B", "email": "A@X.com", "phone": "9876543211", "password": "p2"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Email already registered");
    }

    #[sqlx::test]
    async fn login_round_trip_and_identical_failures(pool: PgPool) {
        let app = app(pool);
        register(&app, "A", "a@x.com", "9876543210", "p1").await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/users/login",
                json!({"email": "a@x.com", "password": "p1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["role"], "user");

        // Wrong password and unknown email must be byte-identical so a
        // caller cannot probe which accounts exist.
        let (wrong_status, wrong_body) = send(
            &app,
            json_request(
                "POST",
                "/users/login",
                json!({"email": "a@x.com", "password": "wrong"}),
            ),
        )
        .await;
        let (unknown_status, unknown_body) = send(
            &app,
            json_request(
                "POST",
                "/users/login",
                json!({"email": "nobody@x.com", "password": "p1"}),
            ),
        )
        .await;
        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_body, unknown_body);
        assert_eq!(wrong_body["message"], "Invalid email or password");
    }

    #[sqlx::test]
    async fn role_update_to_current_role_is_rejected_without_a_write(pool: PgPool) {
        let app = app(pool.clone());
        let body = register(&app, "A", "a@x.com", "9876543210", "p1").await;
        let id: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();

        let (status, body) = send(
            &app,
            json_request("PATCH", &format!("/users/{id}/role"), json!({"role": "user"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "User already has role 'user'");

        let stored = User::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::User);

        // An actual change still goes through.
        let (status, body) = send(
            &app,
            json_request("PATCH", &format!("/users/{id}/role"), json!({"role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");
        let stored = User::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
    }

    #[sqlx::test]
    async fn delete_twice_returns_200_then_404(pool: PgPool) {
        let app = app(pool);
        let body = register(&app, "A", "a@x.com", "9876543210", "p1").await;
        let id = body["user"]["id"].as_str().unwrap().to_string();

        let delete_request = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/users/{id}"))
                .body(Body::empty())
                .expect("request")
        };

        let (status, body) = send(&app, delete_request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "User deleted successfully");

        let (status, body) = send(&app, delete_request()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "User not found");
    }

    #[sqlx::test]
    async fn deleting_a_well_formed_but_unknown_id_is_404(pool: PgPool) {
        let app = app(pool);
        let (status, body) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/users/{}", Uuid::new_v4()))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }
}
