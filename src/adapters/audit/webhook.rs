//! Webhook audit sink.
//!
//! Posts each event as a single embed to a Discord-compatible webhook. The
//! event is rendered here and nowhere else: title, colour by severity, one
//! field per fact.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

use crate::domain::audit::{AuditEvent, Severity};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::AuditSink;

/// Embed field values are truncated to this many characters.
const FIELD_VALUE_LIMIT: usize = 1024;
/// The platform rejects embeds with more fields than this.
const MAX_FIELDS: usize = 25;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    color: u32,
    timestamp: String,
    fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

pub struct WebhookAuditSink {
    client: Client,
    url: Secret<String>,
}

impl WebhookAuditSink {
    pub fn new(url: Secret<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DomainError::new(
                ErrorCode::AuditError,
                format!("Failed to create HTTP client: {}", e),
            )
        })?;
        Ok(Self { client, url })
    }

    fn payload(event: &AuditEvent) -> WebhookPayload {
        let fields = event
            .facts
            .iter()
            .take(MAX_FIELDS)
            .map(|fact| EmbedField {
                name: fact.key.clone(),
                value: truncate(&fact.value, FIELD_VALUE_LIMIT),
                inline: fact.value.len() <= 40,
            })
            .collect();

        WebhookPayload {
            embeds: vec![Embed {
                title: event.title.clone(),
                color: severity_color(event.severity),
                timestamp: event.occurred_at.to_string(),
                fields,
            }],
        }
    }
}

fn severity_color(severity: Severity) -> u32 {
    match severity {
        Severity::Info => 0x3498db,
        Severity::Warning => 0xf1c40f,
        Severity::Error => 0xe74c3c,
    }
}

fn truncate(value: &str, limit: usize) -> String {
    if value.is_empty() {
        // Empty field values are rejected by the platform.
        return "-".to_string();
    }
    match value.char_indices().nth(limit) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

#[async_trait]
impl AuditSink for WebhookAuditSink {
    async fn push(&self, event: AuditEvent) -> Result<(), DomainError> {
        let response = self
            .client
            .post(self.url.expose_secret())
            .json(&Self::payload(&event))
            .send()
            .await
            .map_err(|e| DomainError::new(ErrorCode::AuditError, format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::new(
                ErrorCode::AuditError,
                format!("webhook rejected event: {}", status),
            )
            .with_detail("title", event.title));
        }
        Ok(())
    }
}
