use crate::{
    api::error::{ApiError, ApiResult},
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, verify_token},
    },
    config::Config,
    model::user::UserProfile,
    models::{LoginReqDto, RegisterReq, TokenType},
    services::users::{IdentityError, NewUser},
    state::AppState,
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

/// User registration handler
#[instrument(name = "auth_register", skip(body, state, config), fields(email = %body.email))]
pub async fn register(
    body: web::Json<RegisterReq>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();

    let invite = match body.invite_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => {
            let claims = verify_token(token, &config.jwt_secret).map_err(|e| {
                warn!(error = %e, "Rejected admin invitation token");
                ApiError::Identity(IdentityError::InvalidInvitation)
            })?;
            if claims.token_type != TokenType::Invite {
                return Err(IdentityError::InvalidInvitation.into());
            }
            Some(claims)
        }
        None => None,
    };

    let user = state
        .users
        .register(
            NewUser {
                email: body.email,
                password: body.password,
                name: body.name,
                department: body.department,
            },
            invite.as_ref(),
        )
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": UserProfile::from(&user),
    })))
}

#[instrument(
    name = "auth_login",
    skip(state, config, body),
    fields(email = %body.email)
)]
pub async fn login(
    body: web::Json<LoginReqDto>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    if body.email.trim().is_empty() || body.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(IdentityError::Validation("Email or password required".to_string()).into());
    }

    let user = state.users.authenticate(&body.email, &body.password).await?;
    debug!(user_id = %user.id, "Password verified");

    let access_token = generate_access_token(
        &user.id,
        &user.email,
        user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        ApiError::Internal
    })?;

    if user.role.tracks_attendance() {
        state.sessions.start(&user.id).await;
    }

    info!("Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        user: UserProfile::from(&user),
    }))
}

/// Stops the attendance session. Succeeds even without a valid token.
pub async fn logout(auth: Option<AuthUser>, state: web::Data<AppState>) -> impl Responder {
    if let Some(auth) = auth {
        state.sessions.stop(&auth.user_id).await;
        info!(user_id = %auth.user_id, "Logged out");
    }
    HttpResponse::NoContent().finish()
}
