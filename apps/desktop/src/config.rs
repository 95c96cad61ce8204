use std::{collections::HashMap, fs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8443".into(),
        }
    }
}

/// Defaults, then `todos.toml`, then environment. CLI flags override in main.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("todos.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_overrides(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("TODOS_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_replace_the_default_server_url() {
        let mut settings = Settings::default();
        let file_cfg = HashMap::from([(
            "server_url".to_string(),
            "https://todos.example".to_string(),
        )]);
        apply_file_overrides(&mut settings, &file_cfg);
        assert_eq!(settings.server_url, "https://todos.example");
    }

    #[test]
    fn unknown_file_keys_are_ignored() {
        let mut settings = Settings::default();
        let file_cfg = HashMap::from([("bind_addr".to_string(), "0.0.0.0:1".to_string())]);
        apply_file_overrides(&mut settings, &file_cfg);
        assert_eq!(settings, Settings::default());
    }
}
