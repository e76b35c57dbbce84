//! Field-name normalization for payloads whose producers disagree on casing.
//!
//! The backend, imported question banks and older clients spell the same field
//! several ways (`correct_answer`, `correctAnswer`). [`FieldAliases`] rewrites
//! every variant onto one canonical key before typed deserialization.

use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FieldAliases {
    /// alias -> canonical
    aliases: HashMap<String, String>,
}

impl FieldAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map each of `aliases` onto `canonical`.
    pub fn alias(mut self, canonical: &str, aliases: &[&str]) -> Self {
        for alias in aliases {
            if *alias != canonical {
                self.aliases
                    .insert((*alias).to_string(), canonical.to_string());
            }
        }
        self
    }

    /// Aliases seen in exam and question payloads.
    pub fn jlpt_defaults() -> Self {
        Self::new()
            .alias("correctAnswer", &["correct_answer", "answer_key"])
            .alias("questionText", &["question_text", "question"])
            .alias("audioUrl", &["audio_url"])
            .alias("imageUrl", &["image_url"])
            .alias("timeLimit", &["time_limit", "duration_minutes"])
            .alias("userAnswer", &["user_answer", "selected_answer"])
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Rewrite keys recursively through objects and arrays.
    ///
    /// When both the canonical key and an alias are present, the canonical value wins.
    pub fn normalize(&self, value: Value) -> Value {
        if self.is_empty() {
            return value;
        }
        match value {
            Value::Object(map) => Value::Object(self.normalize_object(map)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.normalize(v)).collect())
            }
            other => other,
        }
    }

    fn normalize_object(&self, map: Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::with_capacity(map.len());
        let mut aliased = Vec::new();

        for (key, value) in map {
            let value = self.normalize(value);
            match self.aliases.get(&key) {
                Some(canonical) => aliased.push((canonical.clone(), value)),
                None => {
                    out.insert(key, value);
                }
            }
        }
        for (canonical, value) in aliased {
            out.entry(canonical).or_insert(value);
        }
        out
    }
}
