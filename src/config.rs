use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_DATA_TTL_SECS, DEFAULT_PAGE_TTL_SECS};
use crate::error::GawResult;
use crate::grid::DataSourceConfig;
use crate::location::LocationMode;
use crate::logger::DebugMode;
use crate::transform::HtmlChanges;

/// Plugin options. Every field has a default, resolved once when the config
/// is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GawConfig {
    /// Origin content types that may be rewritten (substring match)
    pub content_type: Vec<String>,

    /// Request paths containing any of these are passed through
    pub ignore_routes: Vec<String>,

    /// Presence of this cookie disables rewriting for the visitor
    pub opt_out_cookie: String,

    /// Cookie whose value (`low`/`moderate`/`high`) forces a level
    pub manual_view_cookie: String,

    pub location_mode: LocationMode,
    pub html_changes: HtmlChanges,
    pub data_source: DataSourceConfig,
    pub kv_cache_data: bool,
    pub kv_cache_page: bool,
    pub data_ttl_secs: u64,
    pub page_ttl_secs: u64,
    pub debug: DebugMode,
}

impl Default for GawConfig {
    fn default() -> Self {
        Self {
            content_type: vec!["text/html".to_string()],
            ignore_routes: Vec::new(),
            opt_out_cookie: "gaw-user-opt-out".to_string(),
            manual_view_cookie: "gaw-manual-view".to_string(),
            location_mode: LocationMode::Country,
            html_changes: HtmlChanges::default(),
            data_source: DataSourceConfig::default(),
            kv_cache_data: false,
            kv_cache_page: false,
            data_ttl_secs: DEFAULT_DATA_TTL_SECS,
            page_ttl_secs: DEFAULT_PAGE_TTL_SECS,
            debug: DebugMode::None,
        }
    }
}

impl GawConfig {
    /// Parse the JSON held in the `GAW_CONFIG` Worker variable.
    pub fn from_json(raw: &str) -> GawResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.data_source.api_key = api_key.into();
        self
    }

    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        self.content_type
            .iter()
            .any(|accepted| !accepted.is_empty() && content_type.contains(&accepted.to_ascii_lowercase()))
    }

    pub fn ignored_route(&self, path: &str) -> Option<&str> {
        self.ignore_routes
            .iter()
            .find(|route| !route.is_empty() && path.contains(route.as_str()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        assert_eq!(GawConfig::from_json("{}").unwrap(), GawConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = GawConfig::from_json(
            r#"{
                "ignore_routes": ["/wp-admin", "/api/"],
                "location_mode": "latlon",
                "kv_cache_page": true,
                "debug": "full",
                "html_changes": {"high": {"strip_marked": true}},
                "data_source": {"name": "electricity maps", "endpoint": "https://grid.example/v1"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.location_mode, LocationMode::Latlon);
        assert!(config.kv_cache_page);
        assert!(!config.kv_cache_data);
        assert_eq!(config.debug, DebugMode::Full);
        assert_eq!(config.data_source.name, "electricity maps");
        assert!(config.html_changes.high.unwrap().strip_marked);
        assert_eq!(config.content_type, vec!["text/html".to_string()]);
        assert_eq!(config.page_ttl_secs, 86400);
    }

    #[test]
    fn test_malformed_config_is_error() {
        assert!(GawConfig::from_json(r#"{"location_mode": "city"}"#).is_err());
        assert!(GawConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_content_type_matching() {
        let config = GawConfig::default();
        assert!(config.accepts_content_type("text/html; charset=utf-8"));
        assert!(config.accepts_content_type("TEXT/HTML"));
        assert!(!config.accepts_content_type("application/json"));

        let none = GawConfig {
            content_type: Vec::new(),
            ..GawConfig::default()
        };
        assert!(!none.accepts_content_type("text/html"));
    }

    #[test]
    fn test_ignored_route() {
        let config = GawConfig {
            ignore_routes: vec!["/admin".to_string(), String::new()],
            ..GawConfig::default()
        };
        assert_eq!(config.ignored_route("/admin/login"), Some("/admin"));
        assert_eq!(config.ignored_route("/blog"), None);
    }
}
