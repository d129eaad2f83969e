//! Placeholder substitution for stack names and template locations.
//!
//! Templates use `%(key)s` placeholders resolved against context values.
//! `%%` renders a literal `%`. Substitution happens eagerly at the point of
//! use; nothing is deferred.

use indexmap::IndexMap;

use crate::error::{ConfigError, Result};

/// Substitutes every `%(key)s` placeholder in `template` with `values[key]`.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed or names a missing key.
pub fn interpolate(template: &str, values: &IndexMap<String, String>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        output.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('%') {
            output.push('%');
            rest = tail;
            continue;
        }

        let Some(body) = after.strip_prefix('(') else {
            return Err(invalid(template, "'%' must be followed by '(key)s' or '%'"));
        };
        let Some(close) = body.find(')') else {
            return Err(invalid(template, "unterminated placeholder"));
        };

        let key = &body[..close];
        if key.is_empty() {
            return Err(invalid(template, "empty placeholder key"));
        }
        let Some(tail) = body[close + 1..].strip_prefix('s') else {
            return Err(invalid(template, "placeholder must end with ')s'"));
        };

        let value = values.get(key).ok_or_else(|| ConfigError::UnresolvedPlaceholder {
            key: key.to_string(),
            template: template.to_string(),
        })?;
        output.push_str(value);
        rest = tail;
    }

    output.push_str(rest);
    Ok(output)
}

/// Lists the placeholder keys a template refers to, in order of appearance.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed.
pub fn placeholders(template: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut probe = IndexMap::new();

    loop {
        match interpolate(template, &probe) {
            Ok(_) => return Ok(keys),
            Err(crate::error::StackfabError::Config(ConfigError::UnresolvedPlaceholder {
                key, ..
            })) => {
                probe.insert(key.clone(), String::new());
                keys.push(key);
            }
            Err(e) => return Err(e),
        }
    }
}

fn invalid(template: &str, message: &str) -> crate::error::StackfabError {
    ConfigError::InvalidTemplate {
        template: template.to_string(),
        message: message.to_string(),
    }
    .into()
}
