use crate::entity::{merge_field, Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Owner,
    Admin,
    #[default]
    Agent,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: TeamRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamMemberPatch {
    pub name: Option<String>,
    pub role: Option<TeamRole>,
}

impl Entity for TeamMember {
    type Patch = TeamMemberPatch;
    const ENTITY_TYPE: &'static str = "TeamMember";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &TeamMemberPatch) -> bool {
        let name = merge_field(&mut self.name, &patch.name);
        let role = merge_field(&mut self.role, &patch.role);
        name || role
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    #[default]
    Pending,
    Accepted,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: TeamRole,
    #[serde(default)]
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitePatch {
    pub status: Option<InviteStatus>,
    pub role: Option<TeamRole>,
}

impl Entity for Invite {
    type Patch = InvitePatch;
    const ENTITY_TYPE: &'static str = "Invite";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &InvitePatch) -> bool {
        let status = merge_field(&mut self.status, &patch.status);
        let role = merge_field(&mut self.role, &patch.role);
        status || role
    }
}
