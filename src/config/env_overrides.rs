use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("STRIDESYNC_API_URL")
            && !url.is_empty()
        {
            self.api.base_url = url;
        }

        if let Ok(ms) = std::env::var("STRIDESYNC_DEBOUNCE_MS")
            && let Ok(ms) = ms.parse::<u64>()
        {
            self.autosave.debounce_ms = ms;
        }

        if let Ok(path) = std::env::var("STRIDESYNC_STATE_PATH")
            && !path.is_empty()
        {
            self.storage.path = path;
        }

        if let Ok(level) = std::env::var("STRIDESYNC_LOG")
            && !level.is_empty()
        {
            self.log_level = level;
        }
    }
}
