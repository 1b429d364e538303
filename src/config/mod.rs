use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Process configuration, loaded once at entry and passed by reference into
/// the adapters, orchestrator and gateway. No ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub whatsapp: WhatsAppConfig,
    pub telegram: TelegramConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    #[serde(default, rename = "accessToken")]
    pub access_token: String,
    #[serde(default, rename = "phoneNumberId")]
    pub phone_number_id: String,
    #[serde(default, rename = "displayPhoneNumber")]
    pub display_phone_number: String,
    #[serde(default, rename = "verifyToken")]
    pub verify_token: String,
    #[serde(default = "default_graph_api_version", rename = "graphApiVersion")]
    pub graph_api_version: String,
}

fn default_graph_api_version() -> String {
    "v20.0".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            phone_number_id: String::new(),
            display_phone_number: String::new(),
            verify_token: String::new(),
            graph_api_version: default_graph_api_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default, rename = "botId")]
    pub bot_id: String,
    #[serde(default = "default_bot_name", rename = "botName")]
    pub bot_name: String,
}

fn default_bot_name() -> String {
    "concierge".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            bot_id: String::new(),
            bot_name: default_bot_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_base_url", rename = "baseUrl")]
    pub base_url: String,
    #[serde(default = "default_backend_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:9090".to_string()
}

fn default_backend_timeout() -> u64 {
    120
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.whatsapp.enabled {
            anyhow::ensure!(
                !self.whatsapp.access_token.is_empty(),
                "whatsapp.accessToken is required when the channel is enabled"
            );
            anyhow::ensure!(
                !self.whatsapp.phone_number_id.is_empty(),
                "whatsapp.phoneNumberId is required when the channel is enabled"
            );
            anyhow::ensure!(
                !self.whatsapp.verify_token.is_empty(),
                "whatsapp.verifyToken is required when the channel is enabled"
            );
        }
        if self.telegram.enabled {
            anyhow::ensure!(
                !self.telegram.token.is_empty(),
                "telegram.token is required when the channel is enabled"
            );
            anyhow::ensure!(
                !self.telegram.bot_id.is_empty(),
                "telegram.botId is required when the channel is enabled"
            );
        }
        anyhow::ensure!(
            !self.backend.base_url.is_empty(),
            "backend.baseUrl must not be empty"
        );
        Ok(())
    }
}

/// Secrets are overridable from the environment so they never need to live
/// in the config file.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(token) = std::env::var("WHATSAPP_ACCESS_TOKEN") {
        config.whatsapp.access_token = token;
    }
    if let Ok(token) = std::env::var("WHATSAPP_VERIFY_TOKEN") {
        config.whatsapp.verify_token = token;
    }
    if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
        config.telegram.token = token;
    }
    if let Ok(url) = std::env::var("BACKEND_BASE_URL") {
        config.backend.base_url = url;
    }
}

/// Load configuration from `path` (default config when absent), apply env
/// overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let default_path = Path::new("config.json");
    let path = path.unwrap_or(default_path);

    let mut config = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config JSON from {}", path.display()))?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);
    config
        .validate()
        .context("configuration validation failed")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.whatsapp.graph_api_version, "v20.0");
    }

    #[test]
    fn camel_case_keys_deserialize() {
        let config: Config = serde_json::from_str(
            r#"{
                "whatsapp": {
                    "enabled": true,
                    "accessToken": "tok",
                    "phoneNumberId": "333333333333333",
                    "verifyToken": "verify"
                }
            }"#,
        )
        .unwrap();
        assert!(config.whatsapp.enabled);
        assert_eq!(config.whatsapp.phone_number_id, "333333333333333");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn enabled_channel_without_credentials_fails_validation() {
        let config: Config =
            serde_json::from_str(r#"{"telegram": {"enabled": true}}"#).unwrap();
        assert!(config.validate().is_err());
    }
}
