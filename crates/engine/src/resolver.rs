//! Variable resolution between step outputs.
//!
//! Step inputs may reference prior outputs with `${step_id.dot.path}`
//! tokens. Resolution happens lazily against a blackboard snapshot
//! immediately before dispatch. A token whose step has not completed, or
//! whose path walks off the data, is left verbatim — and reported back
//! explicitly so callers can detect it rather than silently shipping
//! unresolved text downstream.

use regex::Regex;
use std::collections::HashMap;

/// Result of resolving a text template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    /// Text with every resolvable token substituted.
    pub text: String,
    /// Tokens left verbatim, in order of appearance.
    pub unresolved: Vec<String>,
}

/// Result of resolving a JSON value tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    /// Value with every resolvable token substituted.
    pub value: serde_json::Value,
    /// Tokens left verbatim, in order of appearance.
    pub unresolved: Vec<String>,
}

/// Substitutes `${step.path}` references with blackboard data.
pub struct VariableResolver {
    pattern: Regex,
}

impl Default for VariableResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableResolver {
    /// Create a resolver.
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"\$\{([A-Za-z0-9_][A-Za-z0-9_.\-]*)\}")
                .expect("step reference pattern is valid"),
        }
    }

    /// Resolve every token in a text template.
    ///
    /// Scalars render bare (`42`, `true`); compound values render as
    /// JSON. Unresolvable tokens stay verbatim and are listed in the
    /// result.
    pub fn resolve_text(
        &self,
        text: &str,
        blackboard: &HashMap<String, serde_json::Value>,
    ) -> ResolvedText {
        // Fast path for plain strings.
        if !text.contains("${") {
            return ResolvedText {
                text: text.to_string(),
                unresolved: Vec::new(),
            };
        }

        let mut unresolved = Vec::new();
        let replaced = self.pattern.replace_all(text, |caps: &regex::Captures<'_>| {
            let path = &caps[1];
            match lookup(path, blackboard) {
                Some(value) => render_scalar(&value),
                None => {
                    unresolved.push(caps[0].to_string());
                    caps[0].to_string()
                }
            }
        });

        ResolvedText {
            text: replaced.into_owned(),
            unresolved,
        }
    }

    /// Resolve tokens recursively through a JSON value.
    ///
    /// A string that is exactly one token resolves to the referenced
    /// value itself, preserving structure for downstream handlers;
    /// strings with embedded tokens resolve textually.
    pub fn resolve_value(
        &self,
        value: &serde_json::Value,
        blackboard: &HashMap<String, serde_json::Value>,
    ) -> ResolvedValue {
        let mut unresolved = Vec::new();
        let value = self.resolve_value_inner(value, blackboard, &mut unresolved);
        ResolvedValue { value, unresolved }
    }

    fn resolve_value_inner(
        &self,
        value: &serde_json::Value,
        blackboard: &HashMap<String, serde_json::Value>,
        unresolved: &mut Vec<String>,
    ) -> serde_json::Value {
        match value {
            serde_json::Value::String(s) => {
                if let Some(path) = self.whole_token(s) {
                    return match lookup(path, blackboard) {
                        Some(resolved) => resolved,
                        None => {
                            unresolved.push(s.clone());
                            value.clone()
                        }
                    };
                }
                let resolved = self.resolve_text(s, blackboard);
                unresolved.extend(resolved.unresolved);
                serde_json::Value::String(resolved.text)
            }
            serde_json::Value::Object(map) => {
                let mut result = serde_json::Map::new();
                for (k, v) in map {
                    result.insert(k.clone(), self.resolve_value_inner(v, blackboard, unresolved));
                }
                serde_json::Value::Object(result)
            }
            serde_json::Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_value_inner(v, blackboard, unresolved))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Return the path when the string is exactly one `${...}` token.
    fn whole_token<'a>(&self, s: &'a str) -> Option<&'a str> {
        let caps = self.pattern.captures(s)?;
        let whole = caps.get(0)?;
        if whole.start() == 0 && whole.end() == s.len() {
            Some(caps.get(1)?.as_str())
        } else {
            None
        }
    }
}

/// Walk a dot-separated path into the blackboard.
///
/// The first segment names a step; the rest walk into its output.
/// Numeric segments index arrays.
fn lookup(path: &str, blackboard: &HashMap<String, serde_json::Value>) -> Option<serde_json::Value> {
    let mut segments = path.split('.');
    let step_id = segments.next()?;
    let mut current = blackboard.get(step_id)?;

    for segment in segments {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }

    Some(current.clone())
}

/// Render a value for embedding in text: scalars bare, compounds as JSON.
fn render_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_blackboard() -> HashMap<String, serde_json::Value> {
        let mut blackboard = HashMap::new();
        blackboard.insert(
            "a".to_string(),
            serde_json::json!({"result": {"x": 42, "items": ["first", "second"]}}),
        );
        blackboard.insert("flag".to_string(), serde_json::json!(true));
        blackboard
    }

    #[test]
    fn test_resolve_nested_path_to_text() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let resolved = resolver.resolve_text("${a.result.x}", &blackboard);
        assert_eq!(resolved.text, "42");
        assert!(resolved.unresolved.is_empty());
    }

    #[test]
    fn test_unresolved_token_left_verbatim() {
        let resolver = VariableResolver::new();
        let blackboard = HashMap::new();

        let resolved = resolver.resolve_text("${a.result.x}", &blackboard);
        assert_eq!(resolved.text, "${a.result.x}");
        assert_eq!(resolved.unresolved, vec!["${a.result.x}"]);
    }

    #[test]
    fn test_missing_path_segment_is_unresolved() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let resolved = resolver.resolve_text("${a.result.missing}", &blackboard);
        assert_eq!(resolved.text, "${a.result.missing}");
        assert_eq!(resolved.unresolved.len(), 1);
    }

    #[test]
    fn test_embedded_tokens_in_text() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let resolved = resolver.resolve_text("x is ${a.result.x}, flag is ${flag}", &blackboard);
        assert_eq!(resolved.text, "x is 42, flag is true");
    }

    #[test]
    fn test_array_index_path() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let resolved = resolver.resolve_text("${a.result.items.1}", &blackboard);
        assert_eq!(resolved.text, "second");
    }

    #[test]
    fn test_plain_text_fast_path() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let resolved = resolver.resolve_text("no references here", &blackboard);
        assert_eq!(resolved.text, "no references here");
        assert!(resolved.unresolved.is_empty());
    }

    #[test]
    fn test_whole_token_preserves_structure() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let input = serde_json::json!({"research": "${a.result}"});
        let resolved = resolver.resolve_value(&input, &blackboard);
        assert_eq!(
            resolved.value["research"],
            serde_json::json!({"x": 42, "items": ["first", "second"]})
        );
        assert!(resolved.unresolved.is_empty());
    }

    #[test]
    fn test_resolve_value_collects_unresolved_recursively() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let input = serde_json::json!({
            "known": "${a.result.x}",
            "nested": {"pending": "${later.output}"},
            "list": ["${flag}", "${ghost}"],
        });

        let resolved = resolver.resolve_value(&input, &blackboard);
        assert_eq!(resolved.value["known"], serde_json::json!(42));
        assert_eq!(resolved.value["nested"]["pending"], "${later.output}");
        assert_eq!(resolved.value["list"][0], serde_json::json!(true));
        assert_eq!(resolved.value["list"][1], "${ghost}");
        assert_eq!(resolved.unresolved.len(), 2);
    }

    #[test]
    fn test_embedded_compound_renders_as_json() {
        let resolver = VariableResolver::new();
        let blackboard = make_blackboard();

        let resolved = resolver.resolve_text("items: ${a.result.items}", &blackboard);
        assert_eq!(resolved.text, r#"items: ["first","second"]"#);
    }
}
