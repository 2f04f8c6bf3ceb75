use std::env;

use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_JWT_MAXAGE: i64 = 60 * 60 * 24 * 7;
const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

/// SMTP settings for outgoing mail.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from: String,
}

/// Application configuration, resolved once in `main` and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub client_url: String,
    pub allowed_origins: Vec<String>,
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;

        let jwt_maxage = match lookup("JWT_MAXAGE") {
            Some(value) => parse_number("JWT_MAXAGE", value)?,
            None => DEFAULT_JWT_MAXAGE,
        };
        let port = match lookup("PORT") {
            Some(value) => parse_number("PORT", value)?,
            None => DEFAULT_PORT,
        };

        let client_url = lookup("CLIENT_URL").unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string());
        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        // Mail stays disabled unless an SMTP server is configured.
        let mail = match lookup("SMTP_SERVER") {
            Some(smtp_server) => {
                let smtp_port = match lookup("SMTP_PORT") {
                    Some(value) => parse_number("SMTP_PORT", value)?,
                    None => DEFAULT_SMTP_PORT,
                };
                let smtp_username = required("SMTP_USERNAME")?;
                let smtp_password = required("SMTP_PASSWORD")?;
                let from = lookup("MAIL_FROM").unwrap_or_else(|| smtp_username.clone());
                Some(MailConfig {
                    smtp_server,
                    smtp_port,
                    smtp_username,
                    smtp_password,
                    from,
                })
            }
            None => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            port,
            client_url,
            allowed_origins,
            mail,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/blood"),
            ("JWT_SECRET_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.jwt_maxage, 604800);
        assert_eq!(config.client_url, "http://localhost:5173");
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:5173", "http://localhost:3000"]
        );
        assert!(config.mail.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET_KEY")));
    }

    #[test]
    fn rejects_bad_port() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET_KEY", "secret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "PORT", .. }));
    }

    #[test]
    fn reads_origins_and_mail() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET_KEY", "secret"),
            ("ALLOWED_ORIGINS", " https://a.example , ,https://b.example"),
            ("SMTP_SERVER", "smtp.example.com"),
            ("SMTP_USERNAME", "bot@example.com"),
            ("SMTP_PASSWORD", "pw"),
        ]))
        .unwrap();

        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        let mail = config.mail.unwrap();
        assert_eq!(mail.smtp_port, 587);
        assert_eq!(mail.from, "bot@example.com");
    }
}
