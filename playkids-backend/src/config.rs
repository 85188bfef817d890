use std::env;
use std::path::PathBuf;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const UPLOAD_DIR: &str = "PLAYKIDS_UPLOAD_DIR";
    pub const SESSION_TTL_HOURS: &str = "PLAYKIDS_SESSION_TTL_HOURS";
    // Bootstrap admin, only used while the users table is empty
    pub const ADMIN_EMAIL: &str = "PLAYKIDS_ADMIN_EMAIL";
    pub const ADMIN_PASSWORD: &str = "PLAYKIDS_ADMIN_PASSWORD";
    pub const CORS_ORIGIN: &str = "PLAYKIDS_CORS_ORIGIN";
    pub const FRONTEND_DIST: &str = "FRONTEND_DIST";
    pub const DISABLE_FRONTEND: &str = "DISABLE_FRONTEND";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/playkids.db";
    pub const UPLOAD_DIR: &str = "./uploads";
    pub const SESSION_TTL_HOURS: i64 = 24;
    /// One year
    pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub session_ttl_hours: i64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub cors_origin: Option<String>,
    /// Directory holding a prebuilt SPA bundle, if static serving is enabled
    pub frontend_dist: Option<PathBuf>,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Session lifetime in hours, limited to `1..=MAX_SESSION_TTL_HOURS`.
fn session_ttl_from(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return defaults::SESSION_TTL_HOURS;
    };
    match raw.trim().parse::<i64>() {
        Ok(hours) if (1..=defaults::MAX_SESSION_TTL_HOURS).contains(&hours) => hours,
        _ => {
            log::warn!(
                "Invalid {} value '{}' (allowed 1-{}), using {}",
                env_vars::SESSION_TTL_HOURS,
                raw,
                defaults::MAX_SESSION_TTL_HOURS,
                defaults::SESSION_TTL_HOURS
            );
            defaults::SESSION_TTL_HOURS
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = match env::var(env_vars::PORT) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("Invalid {} value '{}', using {}", env_vars::PORT, raw, defaults::PORT);
                defaults::PORT
            }),
            Err(_) => defaults::PORT,
        };

        let session_ttl_hours = session_ttl_from(env::var(env_vars::SESSION_TTL_HOURS).ok().as_deref());

        let frontend_dist = if env_flag(env_vars::DISABLE_FRONTEND) {
            log::info!("Frontend serving disabled via {} env var", env_vars::DISABLE_FRONTEND);
            None
        } else {
            non_empty_env(env_vars::FRONTEND_DIST).map(PathBuf::from)
        };

        Self {
            port,
            database_url: env::var(env_vars::DATABASE_URL)
                .unwrap_or_else(|_| defaults::DATABASE_URL.to_string()),
            upload_dir: PathBuf::from(
                env::var(env_vars::UPLOAD_DIR).unwrap_or_else(|_| defaults::UPLOAD_DIR.to_string()),
            ),
            session_ttl_hours,
            admin_email: non_empty_env(env_vars::ADMIN_EMAIL).map(|e| e.to_lowercase()),
            admin_password: non_empty_env(env_vars::ADMIN_PASSWORD),
            cors_origin: non_empty_env(env_vars::CORS_ORIGIN),
            frontend_dist,
        }
    }

    /// Directory where gallery images are written
    pub fn gallery_dir(&self) -> PathBuf {
        self.upload_dir.join("gallery")
    }
}

/// Create the upload directories if they don't exist yet.
pub fn initialize_storage(config: &Config) -> std::io::Result<()> {
    std::fs::create_dir_all(config.gallery_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl_limits() {
        assert_eq!(session_ttl_from(None), defaults::SESSION_TTL_HOURS);
        assert_eq!(session_ttl_from(Some("48")), 48);
        assert_eq!(session_ttl_from(Some("8760")), 8760);
        assert_eq!(session_ttl_from(Some("8761")), defaults::SESSION_TTL_HOURS);
        assert_eq!(session_ttl_from(Some("3000000000")), defaults::SESSION_TTL_HOURS);
        assert_eq!(session_ttl_from(Some("0")), defaults::SESSION_TTL_HOURS);
        assert_eq!(session_ttl_from(Some("soon")), defaults::SESSION_TTL_HOURS);
    }
}
