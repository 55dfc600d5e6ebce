//! Access-policy decisions, kept pure so they can be tested without a
//! database. Handlers and the store feed these with loaded state.

use crate::models::page::Moderated;
use crate::models::taxonomy::Status;
use crate::models::user::User;

/// Replaces user emails on entities served to unauthenticated viewers.
pub const EMAIL_MASK: &str = "email.hidden@undp.org";

/// Single-item read gate: staff may read anything; everyone else may read
/// approved entities, plus their own submissions when logged in. Visitors
/// are therefore limited to approved entities.
pub fn can_view<E: Moderated>(user: &User, entity: &E) -> bool {
    user.is_staff()
        || entity.status() == Status::Approved
        || (user.is_regular() && entity.created_by() == Some(user.email.as_str()))
}

/// The independent channels through which a non-staff user can hold edit
/// access to a signal. Resolved by the store, combined here.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditChannels {
    /// The user authored the signal.
    pub creator: bool,
    /// The user is on the signal's direct collaborator list.
    pub direct_collaborator: bool,
    /// A group the user belongs to grants editing for this signal.
    pub group_collaborator: bool,
}

/// Edit gate for signals: staff may always edit; otherwise any one granted
/// channel suffices. First true wins, but no channel can veto another.
pub fn can_edit_signal(user: &User, channels: EditChannels) -> bool {
    user.is_staff()
        || channels.creator
        || channels.direct_collaborator
        || channels.group_collaborator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signal::Signal;
    use crate::models::taxonomy::Role;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            role,
            ..User::visitor("viewer@undp.org")
        }
    }

    fn signal(status: Status) -> Signal {
        Signal {
            id: 1,
            created_at: Utc::now(),
            status,
            created_by: Some("a@undp.org".to_string()),
            created_for: None,
            modified_at: Utc::now(),
            modified_by: None,
            headline: None,
            description: None,
            attachment: None,
            steep_primary: None,
            steep_secondary: None,
            signature_primary: None,
            signature_secondary: None,
            sdgs: None,
            created_unit: None,
            url: None,
            relevance: None,
            keywords: None,
            location: None,
            score: None,
            connected_trends: None,
            favorite: false,
        }
    }

    #[test]
    fn visitor_reads_only_approved() {
        assert!(can_view(&user(Role::Visitor), &signal(Status::Approved)));
        assert!(!can_view(&user(Role::Visitor), &signal(Status::Draft)));
        assert!(!can_view(&user(Role::Visitor), &signal(Status::New)));
        assert!(!can_view(&user(Role::Visitor), &signal(Status::Archived)));
    }

    #[test]
    fn staff_read_any_status() {
        for role in [Role::Curator, Role::Admin] {
            assert!(can_view(&user(role), &signal(Status::Draft)));
        }
    }

    #[test]
    fn user_reads_approved_or_own() {
        // not the creator of the fixture signal
        assert!(!can_view(&user(Role::User), &signal(Status::Draft)));
        assert!(can_view(&user(Role::User), &signal(Status::Approved)));

        let owner = User {
            role: Role::User,
            ..User::visitor("a@undp.org")
        };
        assert!(can_view(&owner, &signal(Status::Draft)));
    }

    #[test]
    fn staff_edit_without_any_channel() {
        let none = EditChannels::default();
        assert!(can_edit_signal(&user(Role::Admin), none));
        assert!(can_edit_signal(&user(Role::Curator), none));
        assert!(!can_edit_signal(&user(Role::User), none));
    }

    #[test]
    fn any_single_channel_grants_edit() {
        let cases = [
            EditChannels {
                creator: true,
                ..EditChannels::default()
            },
            EditChannels {
                direct_collaborator: true,
                ..EditChannels::default()
            },
            EditChannels {
                group_collaborator: true,
                ..EditChannels::default()
            },
        ];
        for channels in cases {
            assert!(can_edit_signal(&user(Role::User), channels));
        }
    }

    #[test]
    fn revoking_other_channels_does_not_revoke_access() {
        // granted via group collaboration only; the creator and direct
        // channels being false must not matter
        let channels = EditChannels {
            creator: false,
            direct_collaborator: false,
            group_collaborator: true,
        };
        assert!(can_edit_signal(&user(Role::User), channels));
    }

    #[test]
    fn all_channels_revoked_denies() {
        assert!(!can_edit_signal(&user(Role::User), EditChannels::default()));
        assert!(!can_edit_signal(&user(Role::Visitor), EditChannels::default()));
    }
}
