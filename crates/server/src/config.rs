use std::path::PathBuf;

/// Default subject sent in VAPID claims when `VAPID_SUBJECT` is unset.
pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:hello@todu.app";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub base_url: String,
    pub jwt_secret: String,
    /// Requests without an `Authorization` header act as the dev user.
    pub dev_auth: bool,
    pub vapid_private_key: Option<String>,
    pub vapid_subject: String,
    pub web_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("invalid PORT {raw:?}, falling back to 3000");
                3000
            }),
            None => 3000,
        };

        Self {
            data_dir: var("CLARYDO_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            port,
            base_url: var("BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}")),
            jwt_secret: var("JWT_SECRET").unwrap_or_default(),
            dev_auth: var("CLARYDO_DEV_AUTH").is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1"),
            vapid_private_key: var("VAPID_PRIVATE_KEY"),
            vapid_subject: var("VAPID_SUBJECT").unwrap_or_else(|| DEFAULT_VAPID_SUBJECT.into()),
            web_dir: var("CLARYDO_WEB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("web/dist")),
        }
    }
}
