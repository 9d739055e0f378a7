//! Team domain module: members of the brokerage workspace and pending invites.

mod model;

pub use model::{Invite, InvitePatch, InviteStatus, TeamMember, TeamMemberPatch, TeamRole};
