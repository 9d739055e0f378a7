//! Team store: workspace members and pending invites.

use crate::optimistic::OptimisticController;
use dealsync_core::api::TeamApi;
use dealsync_core::entity::EntityStore;
use dealsync_core::error::{Result, SyncError};
use dealsync_core::team::{Invite, InvitePatch, InviteStatus, TeamMember};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct TeamStore {
    members: RwLock<EntityStore<TeamMember>>,
    invites: RwLock<EntityStore<Invite>>,
    optimistic: OptimisticController,
    api: Arc<dyn TeamApi>,
}

impl TeamStore {
    pub fn new(api: Arc<dyn TeamApi>) -> Self {
        Self {
            members: RwLock::new(EntityStore::new()),
            invites: RwLock::new(EntityStore::new()),
            optimistic: OptimisticController::new(),
            api,
        }
    }

    pub async fn set_members(&self, members: Vec<TeamMember>) -> bool {
        self.members.write().await.set(members)
    }

    pub async fn set_invites(&self, invites: Vec<Invite>) -> bool {
        self.invites.write().await.set(invites)
    }

    pub async fn members(&self) -> Arc<Vec<TeamMember>> {
        self.members.read().await.list()
    }

    pub async fn invites(&self) -> Arc<Vec<Invite>> {
        self.invites.read().await.list()
    }

    pub async fn pending_invites(&self) -> Vec<Invite> {
        self.invites
            .read()
            .await
            .iter()
            .filter(|invite| invite.status == InviteStatus::Pending)
            .cloned()
            .collect()
    }

    /// Adds an invite created elsewhere. Idempotent.
    pub async fn add_invite(&self, invite: Invite) -> bool {
        self.invites.write().await.add(invite).is_inserted()
    }

    pub async fn remove_member(&self, member_id: &str) -> Result<()> {
        if !self.members.read().await.contains(member_id) {
            return Err(SyncError::not_found("TeamMember", member_id));
        }
        let api = self.api.clone();
        let owned_id = member_id.to_string();
        self.optimistic
            .mutate(
                &format!("member:{member_id}"),
                &self.members,
                |members| {
                    members.remove(member_id);
                },
                || async move { api.remove_member(&owned_id).await },
                |_, _| {},
            )
            .await
    }

    pub async fn revoke_invite(&self, invite_id: &str) -> Result<Invite> {
        if !self.invites.read().await.contains(invite_id) {
            return Err(SyncError::not_found("Invite", invite_id));
        }
        let api = self.api.clone();
        let owned_id = invite_id.to_string();
        self.optimistic
            .mutate(
                &format!("invite:{invite_id}"),
                &self.invites,
                |invites| {
                    invites.update(
                        invite_id,
                        &InvitePatch {
                            status: Some(InviteStatus::Revoked),
                            role: None,
                        },
                    );
                },
                || async move { api.revoke_invite(&owned_id).await },
                |invites, confirmed| {
                    invites.replace(invite_id, confirmed.clone());
                },
            )
            .await
    }
}
