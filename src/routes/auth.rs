/// Authentication Routes
///
/// Public endpoints: signup, login and access-token refresh.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::session::SessionService;

pub const REFRESH_TOKEN_HEADER: &str = "RefreshToken";

/// Signup and login request body
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Response of a successful refresh
#[derive(Serialize)]
pub struct AccessTokenResponse {
    #[serde(rename = "accesstoken")]
    pub access_token: String,
}

/// POST /api/v1/auth/signup
///
/// Register a new user. Returns the identity record (never the password hash).
///
/// # Errors
/// - 400: Invalid email or password shorter than 8 characters
/// - 409: Email already registered
pub async fn signup(
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let identity = sessions.signup(&form.email, &form.password).await?;
    Ok(HttpResponse::Ok().json(identity))
}

/// POST /api/v1/auth/login
///
/// Returns `{accesstoken, refreshtoken}`.
///
/// # Errors
/// - 400: Invalid email or password shape
/// - 401: Unknown email, wrong password or disabled account (indistinguishable)
pub async fn login(
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let tokens = sessions.login(&form.email, &form.password).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// GET /api/v1/auth/token
///
/// Mint a new access token from the refresh token in the `RefreshToken` header.
///
/// # Errors
/// - 401: Missing, invalid, expired or stale refresh token, or disabled account
pub async fn refresh_access_token(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = req
        .headers()
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());

    let access_token = sessions.refresh(refresh_token).await?;
    Ok(HttpResponse::Ok().json(AccessTokenResponse { access_token }))
}
