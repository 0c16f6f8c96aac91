use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://data.geopf.fr/api";

/// Connection settings, passed explicitly to [`crate::ApiClient::new`].
#[derive(Clone, Debug)]
pub struct Settings {
    /// Root of the Entrepôt API, without a trailing slash.
    pub base_url: String,
    /// Bearer token attached to every request when present.
    pub token: Option<String>,
    pub user_agent: String,
    /// Per-request deadline; an unreachable server fails instead of hanging.
    pub request_timeout: Duration,
    /// Tick of the status-poll loops.
    pub check_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            user_agent: format!("entrepot-client/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
            check_interval: Duration::from_millis(500),
        }
    }
}

impl Settings {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let settings = Settings::new("https://plateforme.example/api/");
        assert_eq!(settings.base_url, "https://plateforme.example/api");
    }
}
