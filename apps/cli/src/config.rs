use std::{collections::HashMap, fs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            database_url: "sqlite://./data/client.db".into(),
        }
    }
}

/// Defaults, overridden by `client.toml`, overridden by environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        apply_file_config(&mut settings, &raw);
    }

    apply_env_config(
        &mut settings,
        std::env::var("CLIENT_SERVER_URL").ok(),
        std::env::var("CLIENT_DATABASE_URL").ok(),
    );

    settings
}

fn apply_env_config(
    settings: &mut Settings,
    server_url: Option<String>,
    database_url: Option<String>,
) {
    if let Some(v) = server_url {
        settings.server_url = v;
    }
    if let Some(v) = database_url {
        settings.database_url = v;
    }
}

fn apply_file_config(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("server_url") {
            settings.server_url = v.clone();
        }
        if let Some(v) = file_cfg.get("database_url") {
            settings.database_url = v.clone();
        }
    }
}

/// Accepts a plain file path or a sqlite url and returns a sqlite url.
pub fn normalize_database_url(raw: &str) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite:") {
        return raw.to_string();
    }
    format!("sqlite://{}", raw.replace('\\', "/"))
}
