//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Base URL of the Plex Media Server (e.g. http://192.168.1.100:32400)
    pub plex_url: String,

    /// Plex authentication token
    pub plex_token: String,

    /// Default library sections to schedule from
    pub libraries: Vec<String>,

    /// Default content rating allow-set
    pub allowed_ratings: Vec<String>,

    /// Default playlist title prefix
    pub playlist_prefix: String,

    /// Default number of weeks per schedule year
    pub weeks_per_year: u32,

    /// Cron expression for scheduled regeneration; unset disables the job
    pub generate_cron: Option<String>,
}

/// Split a comma-separated env value into trimmed, non-empty tokens.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3002".to_string())
                .parse()
                .context("Invalid PORT")?,

            plex_url: env::var("PLEX_URL").context("PLEX_URL is required")?,

            plex_token: env::var("PLEX_TOKEN").context("PLEX_TOKEN is required")?,

            libraries: env::var("PLEX_LIBRARIES")
                .map(|v| split_list(&v))
                .unwrap_or_else(|_| vec!["TV Shows".to_string()]),

            allowed_ratings: env::var("ALLOWED_RATINGS")
                .map(|v| split_list(&v))
                .unwrap_or_else(|_| vec!["G".to_string(), "PG".to_string()]),

            playlist_prefix: env::var("PLAYLIST_PREFIX")
                .unwrap_or_else(|_| "Saturday Morning".to_string()),

            weeks_per_year: env::var("WEEKS_PER_YEAR")
                .unwrap_or_else(|_| "52".to_string())
                .parse()
                .context("Invalid WEEKS_PER_YEAR")?,

            generate_cron: env::var("GENERATE_CRON").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list("G, PG ,,TV-Y7 "),
            vec!["G".to_string(), "PG".to_string(), "TV-Y7".to_string()]
        );
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }
}
