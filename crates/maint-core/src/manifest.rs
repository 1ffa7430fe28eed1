//! The per-repository `dependencies.json` manifest.
//!
//! Shape: `{ "comment": "...", "<repo>": { "sha": "...", "branch": "..." }, ... }`.
//! Unknown keys and key order are preserved across a load/save cycle so the
//! committed diff only touches the entries we change.

use crate::error::{MaintError, Result};
use serde_json::{Map, Value};

const COMMENT_KEY: &str = "comment";

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyManifest {
    entries: Map<String, Value>,
}

impl DependencyManifest {
    pub fn parse(data: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(data)? {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(MaintError::InvalidManifest(format!(
                "expected an object, found {}",
                type_name(&other)
            ))),
        }
    }

    /// Repos pinned by this manifest, in file order, excluding the comment entry.
    pub fn repos(&self) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|k| k.as_str() != COMMENT_KEY)
            .map(String::as_str)
            .collect()
    }

    pub fn sha(&self, repo: &str) -> Option<&str> {
        self.entries.get(repo)?.get("sha")?.as_str()
    }

    /// Pin `repo` to `sha`, creating the entry when it is missing.
    pub fn set_sha(&mut self, repo: &str, sha: &str) {
        match self.entries.get_mut(repo) {
            Some(Value::Object(entry)) => {
                entry.insert("sha".to_string(), Value::String(sha.to_string()));
            }
            _ => {
                let mut entry = Map::new();
                entry.insert("sha".to_string(), Value::String(sha.to_string()));
                self.entries.insert(repo.to_string(), Value::Object(entry));
            }
        }
    }

    /// Pretty JSON with two-space indent and trailing newline.
    pub fn to_pretty_string(&self) -> Result<String> {
        let mut s = serde_json::to_string_pretty(&self.entries)?;
        s.push('\n');
        Ok(s)
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
