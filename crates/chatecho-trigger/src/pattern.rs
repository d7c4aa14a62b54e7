use std::collections::HashMap;
use std::fmt;

use chatecho_persist::DocumentPath;

use crate::error::{Result, TriggerError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// Document path pattern such as `chats/{userId}/messages/{messageId}`.
///
/// Each segment is either a literal that must match exactly or a `{name}`
/// capture that matches any single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for raw in pattern.split('/') {
            if raw.is_empty() {
                return Err(TriggerError::InvalidPattern(format!(
                    "empty segment in '{}'",
                    pattern
                )));
            }

            match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    if name.is_empty() || name.contains(['{', '}']) {
                        return Err(TriggerError::InvalidPattern(format!(
                            "bad capture '{}' in '{}'",
                            raw, pattern
                        )));
                    }
                    if names.contains(&name) {
                        return Err(TriggerError::InvalidPattern(format!(
                            "duplicate capture '{}' in '{}'",
                            name, pattern
                        )));
                    }
                    names.push(name);
                    segments.push(Segment::Capture(name.to_string()));
                }
                None if raw.contains(['{', '}']) => {
                    return Err(TriggerError::InvalidPattern(format!(
                        "unbalanced braces in '{}'",
                        raw
                    )));
                }
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        if segments.len() % 2 != 0 {
            return Err(TriggerError::InvalidPattern(format!(
                "'{}' does not name a document",
                pattern
            )));
        }

        Ok(Self { segments })
    }

    /// Captured parameters if `path` matches this pattern.
    pub fn matches(&self, path: &DocumentPath) -> Option<PathParams> {
        let parts = path.segments();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Capture(name) => {
                    params.insert(name.clone(), part.clone());
                }
            }
        }
        Some(PathParams(params))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => lit.clone(),
                Segment::Capture(name) => format!("{{{}}}", name),
            })
            .collect();
        f.write_str(&rendered.join("/"))
    }
}

/// Values captured from a matched path, keyed by capture name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get) but a missing capture is an error.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| TriggerError::MissingParam(name.to_string()))
    }
}
