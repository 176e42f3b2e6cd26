//! Server configuration.

use routelog_core::{ExportConfig, PagerConfig};

/// Configuration for the request handler.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Token required by admin routes. Admin routes are refused when unset.
    pub admin_token: Option<String>,
    /// Enumeration settings for user and snapshot listings.
    pub pager: PagerConfig,
    /// Settings for exports and backups.
    pub export: ExportConfig,
}

impl ServerConfig {
    /// Creates a configuration with admin routes disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables admin routes behind `token`.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Sets the enumeration settings.
    pub fn with_pager_config(mut self, pager: PagerConfig) -> Self {
        self.pager = pager;
        self
    }

    /// Sets the export settings.
    pub fn with_export_config(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert!(config.admin_token.is_none());
        assert_eq!(config.pager, PagerConfig::default());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new()
            .with_admin_token("s3cret")
            .with_pager_config(PagerConfig::new().with_page_size(10));

        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.pager.page_size, 10);
    }
}
