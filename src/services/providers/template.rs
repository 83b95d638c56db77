//! `{placeholder}` prompt templates and dot-path payload extraction.

use serde_json::Value;
use thiserror::Error;

use crate::domain::models::ExecutionVariables;

/// Prompt template rendering failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Placeholder without a value.
    #[error("unknown template variable '{0}'")]
    UnknownVariable(String),
    /// `{` never closed, at this byte offset.
    #[error("unclosed '{{' at byte {0}")]
    Unclosed(usize),
    /// `}` without a matching `{`, at this byte offset.
    #[error("unmatched '}}' at byte {0}")]
    Unmatched(usize),
}

/// Render `template`, substituting `{name}` with the matching variable.
///
/// `{{` and `}}` produce literal braces. String values are inserted as-is,
/// other JSON values in their compact JSON form.
pub fn render(template: &str, variables: &ExecutionVariables) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|(_, n)| *n) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(TemplateError::Unclosed(pos));
                }
                let key = name.trim();
                let value = variables
                    .get(key)
                    .ok_or_else(|| TemplateError::UnknownVariable(key.to_string()))?;
                out.push_str(&value_to_text(value));
            }
            '}' if chars.peek().map(|(_, n)| *n) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::Unmatched(pos)),
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Check template syntax without variables.
pub fn check_syntax(template: &str) -> Result<(), TemplateError> {
    let mut depth_open: Option<usize> = None;
    let mut chars = template.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        match (c, depth_open) {
            ('{', None) if chars.peek().map(|(_, n)| *n) == Some('{') => {
                chars.next();
            }
            ('{', None) => depth_open = Some(pos),
            ('}', Some(_)) => depth_open = None,
            ('}', None) if chars.peek().map(|(_, n)| *n) == Some('}') => {
                chars.next();
            }
            ('}', None) => return Err(TemplateError::Unmatched(pos)),
            _ => {}
        }
    }
    match depth_open {
        Some(pos) => Err(TemplateError::Unclosed(pos)),
        None => Ok(()),
    }
}

/// Strings verbatim, anything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Follow a dot-separated path; numeric segments index into arrays.
pub fn extract_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(payload, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> ExecutionVariables {
        ExecutionVariables::new()
            .with("user", json!("Ada"))
            .with("count", json!(3))
    }

    #[test]
    fn test_render_substitutes_and_escapes() {
        assert_eq!(render("Hello {user}", &vars()).unwrap(), "Hello Ada");
        assert_eq!(render("{count} new {{items}}", &vars()).unwrap(), "3 new {items}");
    }

    #[test]
    fn test_render_errors() {
        assert_eq!(
            render("Hi {nobody}", &vars()),
            Err(TemplateError::UnknownVariable("nobody".to_string()))
        );
        assert_eq!(render("Hi {user", &vars()), Err(TemplateError::Unclosed(3)));
        assert_eq!(render("Hi } there", &vars()), Err(TemplateError::Unmatched(3)));
    }

    #[test]
    fn test_check_syntax() {
        assert!(check_syntax("Hello {user} {{literal}}").is_ok());
        assert!(check_syntax("Hello {user").is_err());
        assert!(check_syntax("oops }").is_err());
    }

    #[test]
    fn test_extract_path_objects_and_arrays() {
        let payload = json!({"sender": {"name": "Ada"}, "items": [{"id": 7}]});
        assert_eq!(extract_path(&payload, "sender.name"), Some(&json!("Ada")));
        assert_eq!(extract_path(&payload, "items.0.id"), Some(&json!(7)));
        assert_eq!(extract_path(&payload, "items.3.id"), None);
        assert_eq!(extract_path(&payload, "sender.missing"), None);
    }
}
