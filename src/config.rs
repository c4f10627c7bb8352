//! Runtime configuration, read from the environment (and `.env` via dotenvy).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::section::SectionName;
use crate::payment::PaymentTimings;
use crate::store::WritePolicy;

const DEFAULT_BUCKET: &str = "portfolio";
const DEFAULT_LOCAL_ONLY: &str = "header,footer,contact,reviews,seo";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the hosted store. `None` runs against the in-memory gateway.
    pub url: Option<String>,
    pub api_key: String,
    pub bucket: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("GATEWAY_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            api_key: std::env::var("GATEWAY_KEY").unwrap_or_default(),
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub gateway: GatewayConfig,
    pub write_policy: WritePolicy,
    pub local_only_sections: Vec<SectionName>,
    pub payment: PaymentTimings,
    pub session_file: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let local_only = std::env::var("LOCAL_ONLY_SECTIONS")
            .unwrap_or_else(|_| DEFAULT_LOCAL_ONLY.to_string());

        Self {
            gateway: GatewayConfig::default(),
            write_policy: env_parse("WRITE_POLICY", WritePolicy::Reconcile),
            local_only_sections: parse_sections(&local_only),
            payment: PaymentTimings {
                processing: Duration::from_millis(env_parse("PAYMENT_PROCESSING_MS", 2000)),
                close: Duration::from_millis(env_parse("PAYMENT_CLOSE_MS", 2000)),
            },
            session_file: match std::env::var("SESSION_FILE") {
                Ok(path) if path.is_empty() => None,
                Ok(path) => Some(PathBuf::from(path)),
                Err(_) => Some(PathBuf::from("data/admin-sessions.json")),
            },
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT", 3001),
        }
    }
}

impl SiteConfig {
    /// Configuration for tests and offline runs: in-memory gateway, no session file.
    pub fn in_memory() -> Self {
        Self {
            gateway: GatewayConfig {
                url: None,
                api_key: String::new(),
                bucket: DEFAULT_BUCKET.to_string(),
            },
            write_policy: WritePolicy::Reconcile,
            local_only_sections: parse_sections(DEFAULT_LOCAL_ONLY),
            payment: PaymentTimings::default(),
            session_file: None,
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Parses a comma-separated section list, skipping unknown names.
pub fn parse_sections(raw: &str) -> Vec<SectionName> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(section) => Some(section),
            Err(_) => {
                tracing::warn!("Ignoring unknown section '{}' in LOCAL_ONLY_SECTIONS", s);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_skips_unknown_and_blank() {
        let sections = parse_sections("header, seo,,bogus");
        assert_eq!(sections, vec![SectionName::Header, SectionName::Seo]);
    }

    #[test]
    fn test_in_memory_config_has_no_gateway_url() {
        let config = SiteConfig::in_memory();
        assert!(config.gateway.url.is_none());
        assert!(config.session_file.is_none());
        assert_eq!(config.payment.processing, Duration::from_millis(2000));
        assert!(config.local_only_sections.contains(&SectionName::Footer));
        assert!(!config.local_only_sections.contains(&SectionName::Hero));
    }
}
