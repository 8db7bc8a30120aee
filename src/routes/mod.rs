mod auth;
mod health_check;
mod user;

pub use auth::{login, refresh_access_token, signup, REFRESH_TOKEN_HEADER};
pub use health_check::health_check;
pub use user::{change_password, check_session, deactivate, get_user};
