//! Discord REST adapter for the `RolePlatform` port.
//!
//! Talks to the guild member and role endpoints of the Discord HTTP API.
//! Role metadata and our own authority position are cached for a short
//! window; roster caching is the job of [`super::CachingRolePlatform`].
//!
//! # Configuration
//!
//! ```ignore
//! let config = DiscordConfig::new(guild_id, bot_token)
//!     .with_base_url("https://discord.com/api/v10")
//!     .with_timeout(Duration::from_secs(15));
//!
//! let platform = DiscordRolePlatform::new(config)?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::classify::{classify_response, classify_transport};
use crate::domain::foundation::{DomainError, ErrorCode, RoleId, SubjectId};
use crate::domain::roles::RoleAction;
use crate::ports::{PlatformError, RoleInfo, RolePlatform, RosterEntry};

/// Members per page when listing the roster (API maximum).
const PAGE_SIZE: usize = 1000;

/// Configuration for the Discord adapter.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub guild_id: String,
    bot_token: Secret<String>,
    /// Base URL including the API version.
    pub base_url: String,
    pub timeout: Duration,
    /// How long role metadata and our authority position stay cached.
    pub role_cache_ttl: Duration,
}

impl DiscordConfig {
    pub fn new(guild_id: impl Into<String>, bot_token: Secret<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            bot_token,
            base_url: "https://discord.com/api/v10".to_string(),
            timeout: Duration::from_secs(15),
            role_cache_ttl: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_role_cache_ttl(mut self, ttl: Duration) -> Self {
        self.role_cache_ttl = ttl;
        self
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token.expose_secret())
    }
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    user: Option<ApiUser>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRole {
    id: String,
    name: String,
    position: i64,
}

struct RoleCache {
    fetched_at: Instant,
    roles: HashMap<RoleId, RoleInfo>,
    authority: i64,
}

pub struct DiscordRolePlatform {
    config: DiscordConfig,
    client: Client,
    role_cache: Mutex<Option<RoleCache>>,
}

impl DiscordRolePlatform {
    pub fn new(config: DiscordConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("role-warden/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::PlatformError,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            config,
            client,
            role_cache: Mutex::new(None),
        })
    }

    fn guild_url(&self, path: &str) -> String {
        format!("{}/guilds/{}{}", self.config.base_url, self.config.guild_id, path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", self.config.authorization())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_response(status, &headers, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, PlatformError> {
        let response = self.send(self.request(Method::GET, url)).await?;
        response.json::<T>().await.map_err(|e| classify_transport(&e))
    }

    /// Role table plus our authority position, refreshed when stale.
    async fn role_table(&self) -> Result<tokio::sync::MappedMutexGuard<'_, RoleCache>, PlatformError> {
        let mut cache = self.role_cache.lock().await;
        let stale = cache
            .as_ref()
            .map_or(true, |c| c.fetched_at.elapsed() >= self.config.role_cache_ttl);

        if stale {
            let api_roles: Vec<ApiRole> = self.get_json(self.guild_url("/roles")).await?;
            let me: ApiUser = self
                .get_json(format!("{}/users/@me", self.config.base_url))
                .await?;
            let own: ApiMember = self
                .get_json(self.guild_url(&format!("/members/{}", me.id)))
                .await?;

            let mut roles = HashMap::with_capacity(api_roles.len());
            for api_role in api_roles {
                let Ok(id) = RoleId::new(api_role.id) else { continue };
                roles.insert(
                    id.clone(),
                    RoleInfo {
                        id,
                        name: api_role.name,
                        position: api_role.position,
                    },
                );
            }
            let authority = own
                .roles
                .iter()
                .filter_map(|r| RoleId::new(r.as_str()).ok())
                .filter_map(|r| roles.get(&r).map(|info| info.position))
                .max()
                .unwrap_or(0);

            tracing::debug!(roles = roles.len(), authority, "refreshed role table");
            *cache = Some(RoleCache {
                fetched_at: Instant::now(),
                roles,
                authority,
            });
        }

        tokio::sync::MutexGuard::try_map(cache, |c| c.as_mut())
            .map_err(|_| PlatformError::other("role table unavailable"))
    }

    fn to_entry(member: ApiMember) -> Option<RosterEntry> {
        let subject = SubjectId::new(member.user?.id).ok()?;
        let roles = member.roles.into_iter().filter_map(|r| RoleId::new(r).ok());
        Some(RosterEntry::new(subject, roles))
    }
}

#[async_trait]
impl RolePlatform for DiscordRolePlatform {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, PlatformError> {
        let mut roster = Vec::new();
        let mut after = "0".to_string();
        loop {
            let url = self.guild_url(&format!("/members?limit={}&after={}", PAGE_SIZE, after));
            let page: Vec<ApiMember> = self.get_json(url).await?;
            let page_len = page.len();

            for member in page {
                if let Some(entry) = Self::to_entry(member) {
                    after = entry.subject.as_str().to_string();
                    roster.push(entry);
                }
            }
            if page_len < PAGE_SIZE {
                break;
            }
        }
        tracing::debug!(members = roster.len(), "fetched roster");
        Ok(roster)
    }

    async fn fetch_member(&self, subject: &SubjectId) -> Result<Option<RosterEntry>, PlatformError> {
        let url = self.guild_url(&format!("/members/{}", subject));
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &headers, &body));
        }
        let member: ApiMember = response.json().await.map_err(|e| classify_transport(&e))?;
        Ok(Self::to_entry(member))
    }

    async fn fetch_role(&self, role: &RoleId) -> Result<Option<RoleInfo>, PlatformError> {
        Ok(self.role_table().await?.roles.get(role).cloned())
    }

    async fn authority_position(&self) -> Result<i64, PlatformError> {
        Ok(self.role_table().await?.authority)
    }

    async fn mutate_role(
        &self,
        subject: &SubjectId,
        role: &RoleId,
        action: RoleAction,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let method = match action {
            RoleAction::Add => Method::PUT,
            RoleAction::Remove => Method::DELETE,
        };
        let url = self.guild_url(&format!("/members/{}/roles/{}", subject, role));
        let mut request = self.request(method, url);
        if !reason.is_empty() {
            request = request.header("X-Audit-Log-Reason", encode_reason(reason));
        }
        self.send(request).await?;
        Ok(())
    }
}

/// Percent-encodes an audit reason for use as a header value.
fn encode_reason(reason: &str) -> String {
    let mut out = String::with_capacity(reason.len());
    for byte in reason.bytes().take(512) {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
