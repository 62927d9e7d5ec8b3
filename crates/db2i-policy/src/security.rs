//! SQL security validation.

use db2i_core::config::tool::SecuritySpec;

use crate::error::PolicyError;
use crate::lexer;

/// Compiled security policy for one tool (or the server default).
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    /// Restrict statements to SELECT/WITH.
    pub read_only: bool,
    /// Maximum statement length in characters.
    pub max_query_length: usize,
    /// Uppercased forbidden keyword set: defaults plus tool additions.
    forbidden: Vec<String>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        SecurityPolicy::from_spec(&SecuritySpec::default())
    }
}

impl SecurityPolicy {
    /// Build the policy from a tool's (or the default) security spec.
    pub fn from_spec(spec: &SecuritySpec) -> Self {
        Self {
            read_only: spec.read_only,
            max_query_length: spec.max_query_length,
            forbidden: spec.all_forbidden_keywords(),
        }
    }

    /// Check a statement against the policy. Pure and deterministic; string
    /// literals and comments never trip the keyword check.
    pub fn validate_sql(&self, sql: &str) -> Result<(), PolicyError> {
        let length = sql.chars().count();
        if length > self.max_query_length {
            return Err(PolicyError::StatementTooLong {
                length,
                max: self.max_query_length,
            });
        }

        let masked = lexer::mask(sql);
        let tokens = lexer::keywords(&masked);

        for token in &tokens {
            if self.forbidden.iter().any(|k| k == token) {
                return Err(PolicyError::RestrictedKeyword {
                    keyword: token.clone(),
                });
            }
        }

        if self.read_only {
            match tokens.first().map(String::as_str) {
                Some("SELECT") | Some("WITH") => {}
                Some(other) => {
                    return Err(PolicyError::NotReadOnly {
                        found: other.to_string(),
                    })
                }
                None => {
                    return Err(PolicyError::NotReadOnly {
                        found: "<empty>".to_string(),
                    })
                }
            }
        }

        Ok(())
    }
}
