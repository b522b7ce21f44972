//! Organization definition and rank.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{OrgId, RoleId, ValidationError};

/// Category of a managed organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgKind {
    Clan,
    Guild,
    Alliance,
}

impl OrgKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgKind::Clan => "clan",
            OrgKind::Guild => "guild",
            OrgKind::Alliance => "alliance",
        }
    }
}

impl fmt::Display for OrgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clan" => Ok(OrgKind::Clan),
            "guild" => Ok(OrgKind::Guild),
            "alliance" => Ok(OrgKind::Alliance),
            other => Err(ValidationError::invalid_format(
                "org_kind",
                format!("unknown kind '{}'", other),
            )),
        }
    }
}

/// Position of a subject inside an organization.
///
/// Derived from which of the org's leadership roles the subject holds
/// externally; the base role alone yields `Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRank {
    Member,
    CoLeader,
    Leader,
}

impl OrgRank {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRank::Member => "member",
            OrgRank::CoLeader => "co_leader",
            OrgRank::Leader => "leader",
        }
    }
}

impl fmt::Display for OrgRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgRank {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(OrgRank::Member),
            "co_leader" => Ok(OrgRank::CoLeader),
            "leader" => Ok(OrgRank::Leader),
            other => Err(ValidationError::invalid_format(
                "org_rank",
                format!("unknown rank '{}'", other),
            )),
        }
    }
}

/// A managed organization and the external roles that represent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub id: OrgId,
    pub name: String,
    pub kind: OrgKind,
    /// Held by every member. Must be unique across orgs.
    pub base_role: RoleId,
    pub leader_role: Option<RoleId>,
    pub co_leader_role: Option<RoleId>,
    pub active: bool,
}

impl Org {
    /// Creates an active org with no leadership roles.
    pub fn new(name: impl Into<String>, kind: OrgKind, base_role: RoleId) -> Self {
        Self {
            id: OrgId::new(),
            name: name.into(),
            kind,
            base_role,
            leader_role: None,
            co_leader_role: None,
            active: true,
        }
    }

    pub fn with_leader_role(mut self, role: RoleId) -> Self {
        self.leader_role = Some(role);
        self
    }

    pub fn with_co_leader_role(mut self, role: RoleId) -> Self {
        self.co_leader_role = Some(role);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Leadership roles configured for this org.
    pub fn leadership_roles(&self) -> impl Iterator<Item = &RoleId> {
        self.leader_role.iter().chain(self.co_leader_role.iter())
    }

    /// Every external role that signals affiliation with this org.
    pub fn all_roles(&self) -> Vec<RoleId> {
        std::iter::once(&self.base_role)
            .chain(self.leadership_roles())
            .cloned()
            .collect()
    }
}
