//! Structured audit events.
//!
//! Events are built as records (title, severity, key/value facts) and only
//! rendered to text by the sink that delivers them.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::foundation::Timestamp;

/// How loudly an audit event should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labelled line of an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFact {
    pub key: String,
    pub value: String,
}

/// A single best-effort audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub title: String,
    pub severity: Severity,
    pub facts: Vec<AuditFact>,
    pub occurred_at: Timestamp,
}

impl AuditEvent {
    pub fn new(title: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            severity,
            facts: Vec::new(),
            occurred_at: Timestamp::now(),
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(title, Severity::Info)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(title, Severity::Warning)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(title, Severity::Error)
    }

    pub fn with_fact(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.facts.push(AuditFact {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn fact(&self, key: &str) -> Option<&str> {
        self.facts
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    /// Plain-text rendering used by sinks without richer formatting.
    pub fn render_text(&self) -> String {
        let mut out = format!("[{}] {}", self.severity, self.title);
        for fact in &self.facts {
            out.push_str(&format!("\n{}: {}", fact.key, fact.value));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_keep_insertion_order() {
        let event = AuditEvent::info("Cooldown expired")
            .with_fact("subject", "42")
            .with_fact("kind", "org_leave");

        assert_eq!(event.facts.len(), 2);
        assert_eq!(event.facts[0].key, "subject");
        assert_eq!(event.fact("kind"), Some("org_leave"));
        assert_eq!(event.fact("missing"), None);
    }

    #[test]
    fn render_text_lists_facts() {
        let event = AuditEvent::warning("Drift repaired").with_fact("count", 3);
        assert_eq!(event.render_text(), "[warning] Drift repaired\ncount: 3");
    }

    #[test]
    fn severity_orders_by_loudness() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }
}
