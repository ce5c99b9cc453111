use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub auth_service: AuthServiceSettings,
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthServiceSettings {
    /// Base URL of the auth service (e.g., http://localhost:3003/api/v1).
    pub url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh-token".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySettings {
    /// Base URL prefixed to every gateway endpoint.
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshSettings {
    /// Safety margin subtracted from a token's expiry when deciding
    /// staleness and scheduling the proactive refresh.
    #[serde(default = "default_lead_seconds")]
    pub lead_seconds: i64,
}

fn default_lead_seconds() -> i64 {
    60
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            lead_seconds: default_lead_seconds(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    dotenvy::dotenv().ok();

    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
