use crate::application::CheckoutSettings;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{MobileProvider, TaxPolicy};
use std::str::FromStr;
use std::time::Duration;

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> DomainResult<T> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            DomainError::ConfigurationError(format!("{} has an invalid value: {}", key, raw))
        }),
        None => Ok(default),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// 从环境变量加载结账参数
pub fn checkout_settings_from_env() -> DomainResult<CheckoutSettings> {
    checkout_settings_from_lookup(|key| std::env::var(key).ok())
}

pub fn checkout_settings_from_lookup<F>(lookup: F) -> DomainResult<CheckoutSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = CheckoutSettings::default();

    let poll_interval = parse_or(
        &lookup,
        "USSD_POLL_INTERVAL_SECS",
        defaults.poll_interval.as_secs(),
    )?;
    let poll_timeout = parse_or(
        &lookup,
        "USSD_POLL_TIMEOUT_SECS",
        defaults.poll_timeout.as_secs(),
    )?;
    if poll_interval == 0 || poll_timeout < poll_interval {
        return Err(DomainError::ConfigurationError(
            "USSD poll interval must be positive and not exceed the poll timeout".to_string(),
        ));
    }

    let rate_bps = parse_or(&lookup, "TAX_RATE_BPS", defaults.tax_policy.rate_bps)?;
    if rate_bps > 10_000 {
        return Err(DomainError::ConfigurationError(format!(
            "TAX_RATE_BPS must be at most 10000, got {}",
            rate_bps
        )));
    }

    let provider = match lookup("MOBILE_PROVIDER") {
        Some(raw) => MobileProvider::parse(&raw).ok_or_else(|| {
            DomainError::ConfigurationError(format!("Unknown MOBILE_PROVIDER: {}", raw))
        })?,
        None => defaults.provider,
    };

    Ok(CheckoutSettings {
        poll_interval: Duration::from_secs(poll_interval),
        poll_timeout: Duration::from_secs(poll_timeout),
        tax_policy: TaxPolicy::new(
            parse_bool(&lookup, "TAX_ENABLED", defaults.tax_policy.enabled),
            rate_bps,
        ),
        provider,
        session_retention: Duration::from_secs(parse_or(
            &lookup,
            "SESSION_RETENTION_SECS",
            defaults.session_retention.as_secs(),
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = checkout_settings_from_lookup(|_| None).unwrap();
        assert_eq!(settings, CheckoutSettings::default());
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.poll_timeout, Duration::from_secs(300));
        assert_eq!(settings.tax_policy.rate_bps, 1600);
    }

    #[test]
    fn test_overrides() {
        let settings = checkout_settings_from_lookup(|key| match key {
            "TAX_ENABLED" => Some("false".to_string()),
            "TAX_RATE_BPS" => Some("1800".to_string()),
            "MOBILE_PROVIDER" => Some("mpesa".to_string()),
            "USSD_POLL_INTERVAL_SECS" => Some("3".to_string()),
            _ => None,
        })
        .unwrap();

        assert!(!settings.tax_policy.enabled);
        assert_eq!(settings.tax_policy.rate_bps, 1800);
        assert_eq!(settings.provider, MobileProvider::MPesa);
        assert_eq!(settings.poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_interval_longer_than_timeout_rejected() {
        let result = checkout_settings_from_lookup(|key| match key {
            "USSD_POLL_INTERVAL_SECS" => Some("600".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(DomainError::ConfigurationError(_))));
    }
}
