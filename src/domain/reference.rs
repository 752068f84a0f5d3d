use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::MobileProvider;

struct ReferenceRule {
    min_len: usize,
    max_len: usize,
    extra_chars: &'static [char],
    example: &'static str,
}

fn rule_for(provider: MobileProvider) -> ReferenceRule {
    match provider {
        MobileProvider::MPesa => ReferenceRule {
            min_len: 10,
            max_len: 10,
            extra_chars: &[],
            example: "QFT4H7K2LM",
        },
        MobileProvider::AirtelMoney | MobileProvider::TigoPesa => ReferenceRule {
            min_len: 8,
            max_len: 20,
            extra_chars: &['.'],
            example: "MP240915.1432.A12345",
        },
        MobileProvider::ZenoPay => ReferenceRule {
            min_len: 6,
            max_len: 40,
            extra_chars: &['-', '_'],
            example: "ZP-0938472615",
        },
    }
}

/// 校验手工录入的移动支付参考号，返回规范化后的值（去空白、大写）
pub fn validate_reference(reference: &str, provider: MobileProvider) -> DomainResult<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationError(
            "Please enter a reference number".to_string(),
        ));
    }

    let rule = rule_for(provider);
    let normalized = trimmed.to_ascii_uppercase();
    let len = normalized.chars().count();

    if len < rule.min_len || len > rule.max_len {
        let expected = if rule.min_len == rule.max_len {
            format!("{} characters", rule.min_len)
        } else {
            format!("{}-{} characters", rule.min_len, rule.max_len)
        };
        return Err(DomainError::ValidationError(format!(
            "{} reference must be {} (e.g. {})",
            provider, expected, rule.example
        )));
    }

    let valid_chars = normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || rule.extra_chars.contains(&c));
    if !valid_chars || !normalized.chars().any(|c| c.is_ascii_digit()) {
        return Err(DomainError::ValidationError(format!(
            "Invalid {} reference format (e.g. {})",
            provider, rule.example
        )));
    }

    Ok(normalized)
}

/// 输入框提示
pub fn reference_placeholder(provider: MobileProvider) -> &'static str {
    rule_for(provider).example
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_reference_rejected() {
        let err = validate_reference("   ", MobileProvider::ZenoPay).unwrap_err();
        assert_eq!(err.user_message(), "Please enter a reference number");
    }

    #[test]
    fn test_zenopay_reference_normalized() {
        let value = validate_reference("  zp-0938472615 ", MobileProvider::ZenoPay).unwrap();
        assert_eq!(value, "ZP-0938472615");
    }

    #[test]
    fn test_mpesa_requires_ten_characters() {
        assert!(validate_reference("QFT4H7K2LM", MobileProvider::MPesa).is_ok());
        assert!(validate_reference("QFT4H7K2L", MobileProvider::MPesa).is_err());
        assert!(validate_reference("QFT4H7-2LM", MobileProvider::MPesa).is_err());
    }

    #[test]
    fn test_reference_must_contain_digit() {
        assert!(validate_reference("ABCDEFGH", MobileProvider::ZenoPay).is_err());
    }

    #[test]
    fn test_disallowed_characters() {
        assert!(validate_reference("ZP 12345 67", MobileProvider::ZenoPay).is_err());
        assert!(validate_reference("MP2409.15A", MobileProvider::AirtelMoney).is_ok());
    }

    #[test]
    fn test_placeholder_passes_validation() {
        for provider in [
            MobileProvider::ZenoPay,
            MobileProvider::MPesa,
            MobileProvider::AirtelMoney,
            MobileProvider::TigoPesa,
        ] {
            assert!(validate_reference(reference_placeholder(provider), provider).is_ok());
        }
    }
}
