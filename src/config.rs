/// API key value that switches the Gemini client to offline demo output.
pub const DEMO_KEY: &str = "DEMO_KEY";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
const DEFAULT_IMAGE_FALLBACK_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub image_fallback_model: String,
    pub port: u16,
    pub session_ttl_minutes: i64,
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

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };
        Self {
            api_key: var("GEMINI_API_KEY", DEMO_KEY),
            api_base: var("GEMINI_API_BASE", DEFAULT_API_BASE).trim_end_matches('/').to_string(),
            text_model: var("GEMINI_TEXT_MODEL", DEFAULT_TEXT_MODEL),
            image_model: var("GEMINI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            image_fallback_model: var("GEMINI_IMAGE_FALLBACK_MODEL", DEFAULT_IMAGE_FALLBACK_MODEL),
            port: lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_PORT),
            session_ttl_minutes: lookup("SESSION_TTL_MINUTES")
                .and_then(|v| v.parse().ok())
                .filter(|minutes: &i64| *minutes > 0)
                .unwrap_or(DEFAULT_SESSION_TTL_MINUTES),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.api_key == DEMO_KEY
    }

    /// First characters of the key, safe to log.
    pub fn masked_key(&self) -> String {
        let visible: String = self.api_key.chars().take(6).collect();
        format!("{visible}***")
    }
}
