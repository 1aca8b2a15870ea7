use serde::Serialize;

/// Minimum password length accepted by the platform.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordRuleKey {
    Length,
    Uppercase,
    Lowercase,
    Number,
}

impl PasswordRuleKey {
    /// Checklist text shown next to the rule.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Length => "At least 6 characters",
            Self::Uppercase => "At least one uppercase letter (A-Z)",
            Self::Lowercase => "At least one lowercase letter (a-z)",
            Self::Number => "At least one number (0-9)",
        }
    }
}

/// One line of the password checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordRule {
    pub key: PasswordRuleKey,
    pub label: &'static str,
    pub valid: bool,
}

impl PasswordRule {
    fn new(key: PasswordRuleKey, valid: bool) -> Self {
        Self {
            key,
            label: key.label(),
            valid,
        }
    }
}

/// Evaluates every password rule, in checklist order.
#[must_use]
pub fn password_rules(password: &str) -> [PasswordRule; 4] {
    [
        PasswordRule::new(
            PasswordRuleKey::Length,
            password.chars().count() >= MIN_PASSWORD_LEN,
        ),
        PasswordRule::new(
            PasswordRuleKey::Uppercase,
            password.chars().any(|c| c.is_ascii_uppercase()),
        ),
        PasswordRule::new(
            PasswordRuleKey::Lowercase,
            password.chars().any(|c| c.is_ascii_lowercase()),
        ),
        PasswordRule::new(
            PasswordRuleKey::Number,
            password.chars().any(|c| c.is_ascii_digit()),
        ),
    ]
}

/// True when every rule in [`password_rules`] passes.
#[must_use]
pub fn is_password_valid(password: &str) -> bool {
    password_rules(password).iter().all(|rule| rule.valid)
}

/// The optional "Passwords match" checklist line. Empty inputs never match.
#[must_use]
pub fn passwords_match(password: &str, confirm: &str) -> bool {
    !password.is_empty() && !confirm.is_empty() && password == confirm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validity(password: &str) -> [bool; 4] {
        password_rules(password).map(|r| r.valid)
    }

    #[test]
    fn missing_uppercase() {
        assert_eq!(validity("abc123"), [true, false, true, true]);
        assert!(!is_password_valid("abc123"));
    }

    #[test]
    fn all_rules_pass() {
        assert_eq!(validity("Abc123"), [true, true, true, true]);
        assert!(is_password_valid("Abc123"));
    }

    #[test]
    fn too_short() {
        assert_eq!(validity("Ab1"), [false, true, true, true]);
        assert!(!is_password_valid("Ab1"));
        assert!(!is_password_valid(""));
    }

    #[test]
    fn non_ascii_letters_do_not_count() {
        assert_eq!(validity("ÀÉÎ123abc"), [true, false, true, true]);
    }

    #[test]
    fn rules_are_in_checklist_order() {
        let keys = password_rules("").map(|r| r.key);
        assert_eq!(
            keys,
            [
                PasswordRuleKey::Length,
                PasswordRuleKey::Uppercase,
                PasswordRuleKey::Lowercase,
                PasswordRuleKey::Number,
            ]
        );
        assert_eq!(password_rules("")[0].label, "At least 6 characters");
    }

    #[test]
    fn confirmation() {
        assert!(passwords_match("Abc123", "Abc123"));
        assert!(!passwords_match("Abc123", "abc123"));
        assert!(!passwords_match("", ""));
    }
}
