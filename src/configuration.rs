use std::time::Duration;

use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub revocation: RevocationSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

/// Which identity store backs the service
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings.
///
/// Access and refresh tokens are signed with separate secrets.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry: u64,   // seconds (e.g., 300 for 5 minutes)
    pub refresh_token_expiry: u64,  // seconds (e.g., 259200 for 3 days)
    pub issuer: String,
}

impl JwtSettings {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expiry)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expiry)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct RevocationSettings {
    /// Minimum time the access token used for deactivate/change-password stays poisoned.
    /// A token that lives longer stays poisoned until its own expiry.
    pub poison_window_seconds: u64,
}

impl Default for RevocationSettings {
    fn default() -> Self {
        Self {
            poison_window_seconds: 300,
        }
    }
}

impl RevocationSettings {
    pub fn poison_window(&self) -> Duration {
        Duration::from_secs(self.poison_window_seconds)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    /// bcrypt cost factor
    pub hash_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Settings {
    /// Reject configurations the service must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = &self.jwt;
        if jwt.access_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_token_secret".to_string()));
        }
        if jwt.refresh_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_token_secret".to_string()));
        }
        if jwt.access_token_secret == jwt.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh tokens must use different secrets".to_string(),
            ));
        }
        if jwt.access_token_expiry == 0 || jwt.refresh_token_expiry == 0 {
            return Err(ConfigError::InvalidValue(
                "token expiry must be greater than zero".to_string(),
            ));
        }
        if !(4..=31).contains(&self.password.hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password.hash_cost must be between 4 and 31, got {}",
                self.password.hash_cost
            )));
        }
        Ok(())
    }
}

/// Load settings from an optional `configuration` file, then `APP__*` environment variables.
///
/// e.g. `APP__JWT__ACCESS_TOKEN_SECRET=...` overrides `jwt.access_token_secret`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
