//! JSON-path selection
//!
//! Paths are RFC 9535 expressions rooted at `$` (`@` is accepted as an alias
//! for the current document). A definite path selects at most one node and
//! yields that value; any path containing wildcards, descendant segments,
//! slices, unions or filters yields an array of every match.

use serde_json::Value;
use serde_json_path::JsonPath;
use thiserror::Error;

/// JSON-path failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid JSON path `{path}`: {message}")]
    Invalid { path: String, message: String },

    #[error("unknown key in JSON path `{0}`")]
    NoMatch(String),
}

/// A parsed JSON-path
#[derive(Debug, Clone)]
pub struct CompiledPath {
    source: String,
    path: JsonPath,
    definite: bool,
}

impl CompiledPath {
    pub fn parse(source: &str) -> Result<Self, PathError> {
        let normalized = match source.strip_prefix('@') {
            Some(rest) => format!("${rest}"),
            None => source.to_string(),
        };
        let path = JsonPath::parse(&normalized).map_err(|err| PathError::Invalid {
            path: source.to_string(),
            message: err.to_string(),
        })?;

        Ok(Self { source: source.to_string(), path, definite: is_definite(&normalized) })
    }

    pub fn select(&self, data: &Value) -> Result<Value, PathError> {
        let nodes = self.path.query(data);
        if self.definite {
            return nodes
                .first()
                .cloned()
                .ok_or_else(|| PathError::NoMatch(self.source.clone()));
        }
        Ok(Value::Array(nodes.all().into_iter().cloned().collect()))
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn is_definite(&self) -> bool {
        self.definite
    }
}

/// Parse and evaluate `path` against `data` in one go.
pub fn select(path: &str, data: &Value) -> Result<Value, PathError> {
    CompiledPath::parse(path)?.select(data)
}

fn is_definite(path: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0_usize;
    let mut previous = '\0';

    for c in path.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '*' => return false,
            '.' if previous == '.' => return false,
            '?' | ':' | ',' if depth > 0 => return false,
            _ => {}
        }
        previous = c;
    }
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "id": 7,
            "user": {"name": "ada"},
            "items": [{"v": 1}, {"v": 2}, {"v": 3}]
        })
    }

    #[test]
    fn definite_path_returns_single_value() {
        assert_eq!(select("$.user.name", &sample()), Ok(json!("ada")));
        assert_eq!(select("$.items[1].v", &sample()), Ok(json!(2)));
        assert_eq!(select("$['id']", &sample()), Ok(json!(7)));
    }

    #[test]
    fn definite_path_without_match_is_an_error() {
        assert_eq!(select("$.missing", &sample()), Err(PathError::NoMatch("$.missing".into())));
    }

    #[test]
    fn wildcard_and_descendant_paths_return_arrays() {
        assert_eq!(select("$.items[*].v", &sample()), Ok(json!([1, 2, 3])));
        assert_eq!(select("$..v", &sample()), Ok(json!([1, 2, 3])));
        assert_eq!(select("$.items[0:2].v", &sample()), Ok(json!([1, 2])));
        assert_eq!(select("$.nothing[*]", &sample()), Ok(json!([])));
    }

    #[test]
    fn filter_paths_return_arrays() {
        assert_eq!(select("$.items[?@.v > 1].v", &sample()), Ok(json!([2, 3])));
    }

    #[test]
    fn current_node_alias_is_accepted() {
        assert_eq!(select("@.id", &sample()), Ok(json!(7)));
    }

    #[test]
    fn malformed_path_is_invalid() {
        assert!(matches!(select("$.items[", &sample()), Err(PathError::Invalid { .. })));
    }

    #[test]
    fn quoted_wildcard_stays_definite() {
        let path = CompiledPath::parse("$['a*b']").expect("path parses");
        assert!(path.is_definite());
    }
}
