//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (hops, concurrency, page limits, deadlines)
//! - Check addresses and levels parse before anything starts
//! - Check the site definition for empty redirect targets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WaypointConfig → Result<(), Vec<ValidationError>>
//! - Pattern structure of the site tree is checked by compiling it (site.rs),
//!   not duplicated here

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{SiteDef, WaypointConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a config value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &WaypointConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.navigation.max_redirect_hops == 0 {
        errors.push(ValidationError::new("navigation.max_redirect_hops", "must be at least 1"));
    }

    let crawler = &config.crawler;
    if !crawler.root.starts_with('/') {
        errors.push(ValidationError::new("crawler.root", "must start with '/'"));
    }
    if crawler.concurrency == 0 {
        errors.push(ValidationError::new("crawler.concurrency", "must be at least 1"));
    }
    if crawler.max_pages == 0 {
        errors.push(ValidationError::new("crawler.max_pages", "must be at least 1"));
    }
    if crawler.page_timeout_secs == Some(0) {
        errors.push(ValidationError::new("crawler.page_timeout_secs", "must be greater than 0"));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if let Some(site) = &config.site {
        validate_site(site, "site", &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_site(def: &SiteDef, path: &str, errors: &mut Vec<ValidationError>) {
    match def {
        SiteDef::Redirect { to } if to.trim().is_empty() => {
            errors.push(ValidationError::new(format!("{path}.to"), "redirect target is empty"));
        }
        SiteDef::Switch { children, .. } => {
            for (template, child) in children {
                validate_site(child, &format!("{path}.children.\"{template}\""), errors);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&WaypointConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = WaypointConfig::default();
        config.navigation.max_redirect_hops = 0;
        config.crawler.concurrency = 0;
        config.crawler.root = "docs".into();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "navigation.max_redirect_hops",
                "crawler.root",
                "crawler.concurrency",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn test_nested_empty_redirect() {
        let mut children = BTreeMap::new();
        children.insert("/old".to_string(), SiteDef::Redirect { to: " ".into() });
        let config = WaypointConfig {
            site: Some(SiteDef::Switch {
                title: None,
                meta: BTreeMap::new(),
                data: None,
                content: None,
                params: Vec::new(),
                children,
            }),
            ..Default::default()
        };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "site.children.\"/old\".to");
    }
}
