pub mod analysis;
pub mod domain;
pub mod ingest;
pub mod report;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_COUNTRY: &str = "kr";
    pub const DEFAULT_CHART: &str = "top-free";
    pub const DEFAULT_LIMIT: i32 = 25;
    pub const DEFAULT_THEMES_PATH: &str = "config/themes.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub themes_path: Option<String>,
        pub country: Option<String>,
        pub chart: Option<String>,
        pub rss_base_url: Option<String>,
        pub lookup_base_url: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                themes_path: std::env::var("THEMES_PATH").ok(),
                country: std::env::var("CHART_COUNTRY").ok(),
                chart: std::env::var("CHART_NAME").ok(),
                rss_base_url: std::env::var("APPSTORE_RSS_BASE_URL").ok(),
                lookup_base_url: std::env::var("ITUNES_LOOKUP_BASE_URL").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn country(&self) -> &str {
            self.country.as_deref().unwrap_or(DEFAULT_COUNTRY)
        }

        pub fn chart(&self) -> &str {
            self.chart.as_deref().unwrap_or(DEFAULT_CHART)
        }

        pub fn themes_path(&self) -> &str {
            self.themes_path.as_deref().unwrap_or(DEFAULT_THEMES_PATH)
        }
    }
}
