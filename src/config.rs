use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// When true, an approval that fails to win a seat stays pending and the
    /// caller gets CapacityExceeded. The default (false) reproduces the
    /// historical behavior: status flips to approved even when the course is
    /// full, with a warning in the log.
    pub strict_capacity_enforcement: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lms.db".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let strict_capacity_enforcement = env::var("STRICT_CAPACITY_ENFORCEMENT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            database_url,
            port,
            strict_capacity_enforcement,
        }
    }
}
