use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{PasswordHasher, RevocationCache, SessionValidator, TokenCodecs};
use crate::configuration::Settings;
use crate::error::AppError;
use crate::identity::{build_store, IdentityStore};
use crate::logger::LoggerMiddleware;
use crate::middleware::SessionMiddleware;
use crate::routes::{
    change_password, check_session, deactivate, get_user, health_check, login,
    refresh_access_token, signup,
};
use crate::session::SessionService;

/// A bound, not yet running server
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Build the store selected by configuration, then the application on top of it.
    pub async fn build(settings: &Settings) -> Result<Self, AppError> {
        let store = build_store(&settings.database).await?;
        Self::with_store(settings, store)
    }

    /// Wire codecs, revocation cache, session flows and routes around `store`.
    pub fn with_store(settings: &Settings, store: Arc<dyn IdentityStore>) -> Result<Self, AppError> {
        settings.validate()?;

        let address = format!("{}:{}", settings.application.host, settings.application.port);
        let listener = TcpListener::bind(&address)
            .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", address, e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .port();

        let codecs = Arc::new(TokenCodecs::from_settings(&settings.jwt)?);
        let revoked = Arc::new(RevocationCache::new());

        let sessions = SessionService::new(
            store,
            codecs.clone(),
            revoked.clone(),
            PasswordHasher::new(settings.password.hash_cost),
            settings.revocation.poison_window(),
        );
        let validator = SessionValidator::new(codecs, revoked);

        let server = run(listener, sessions, validator)
            .map_err(|e| AppError::Internal(format!("Failed to start server: {}", e)))?;
        tracing::info!(address = %address, port, "Server listening");

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    sessions: SessionService,
    validator: SessionValidator,
) -> Result<Server, std::io::Error> {
    let sessions = web::Data::new(sessions);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(sessions.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/auth")
                            .route("/signup", web::post().to(signup))
                            .route("/login", web::post().to(login))
                            .route("/token", web::get().to(refresh_access_token)),
                    )
                    // Protected routes (require a valid, unrevoked access token)
                    .service(
                        web::scope("")
                            .wrap(SessionMiddleware::new(validator.clone()))
                            .route("/me", web::get().to(check_session))
                            .route("/user", web::get().to(get_user))
                            .route("/deactivate", web::patch().to(deactivate))
                            .route("/changePassword", web::patch().to(change_password)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
