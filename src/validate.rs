use crate::error::ValidationError;
use crate::properties::is_blank;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Format rule for a property value entered in the properties panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyRule {
    /// Any non-blank text.
    Any,
    /// `X.Y` or `X.Y.Z` with decimal components.
    Version,
    /// Starts with a letter, then letters, digits, `_`, `-` or `.`.
    Identifier,
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("valid version regex"))
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*$").expect("valid identifier regex"))
}

impl PropertyRule {
    pub fn check(self, name: &str, value: &str) -> Result<(), ValidationError> {
        match self {
            PropertyRule::Any => Ok(()),
            PropertyRule::Version => {
                if version_re().is_match(value.trim()) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidVersion {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                }
            }
            PropertyRule::Identifier => {
                if identifier_re().is_match(value.trim()) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidIdentifier {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                }
            }
        }
    }
}

/// Checks panel input before it may touch the cache.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: IndexMap<String, PropertyRule>,
}

impl Validator {
    pub fn new(rules: IndexMap<String, PropertyRule>) -> Self {
        Self { rules }
    }

    pub fn rule_for(&self, name: &str) -> PropertyRule {
        self.rules.get(name).copied().unwrap_or(PropertyRule::Any)
    }

    /// Property names follow the identifier rule regardless of configuration.
    pub fn check_name(&self, name: &str) -> Result<(), ValidationError> {
        if is_blank(name) {
            return Err(ValidationError::EmptyName);
        }
        if !identifier_re().is_match(name) {
            return Err(ValidationError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// A blank value is always accepted: it clears the property.
    pub fn check(&self, name: &str, value: &str) -> Result<(), ValidationError> {
        self.check_name(name)?;
        if is_blank(value) {
            return Ok(());
        }
        self.rule_for(name).check(name, value)
    }
}
