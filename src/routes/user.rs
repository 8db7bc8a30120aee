/// Protected user routes
///
/// Every handler here sits behind `SessionMiddleware` and receives the
/// caller as an `AuthenticatedUser` request extension.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::session::SessionService;

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub password: Option<String>,
}

/// GET /api/v1/me
pub async fn check_session(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    HttpResponse::Ok().body(format!("user auth is valid for ID {}", user.user_id))
}

/// GET /api/v1/user
///
/// # Errors
/// - 401: The identity behind the token no longer exists
pub async fn get_user(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let identity = sessions.current_identity(&user).await?;
    Ok(HttpResponse::Ok().json(identity))
}

/// PATCH /api/v1/deactivate
///
/// # Errors
/// - 400: The account is already disabled
pub async fn deactivate(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    sessions.deactivate(&user).await?;
    Ok(HttpResponse::Ok().body("user has been disabled"))
}

/// PATCH /api/v1/changePassword
///
/// # Errors
/// - 400: Missing password or shorter than 8 characters
pub async fn change_password(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<ChangePasswordRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let password = form.password.as_deref().unwrap_or_default();
    sessions.change_password(&user, password).await?;
    Ok(HttpResponse::Ok().body("user password has been changed."))
}
