use std::collections::HashSet;

use crate::{
    domain::ChatHandle,
    platform::{ChatKind, ChatMembership},
};

/// Chats the account already belongs to, built once per join session.
///
/// Holds lower-cased `@handle`s, or the numeric id for chats without a public
/// handle. Lookups only ever use the handle, so id entries never match a parsed
/// candidate.
#[derive(Clone, Debug, Default)]
pub struct MembershipSet {
    keys: HashSet<String>,
}

impl MembershipSet {
    pub fn from_memberships(memberships: &[ChatMembership]) -> Self {
        let keys = memberships
            .iter()
            .filter(|m| matches!(m.kind, ChatKind::Channel | ChatKind::Group))
            .map(|m| match m.handle.as_deref().map(str::trim) {
                Some(h) if !h.trim_start_matches('@').is_empty() => {
                    ChatHandle::from_username(h).key()
                }
                _ => m.id.to_string(),
            })
            .collect();
        Self { keys }
    }

    pub fn contains(&self, handle: &ChatHandle) -> bool {
        self.keys.contains(&handle.key())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: i64, handle: Option<&str>, kind: ChatKind) -> ChatMembership {
        ChatMembership {
            id,
            handle: handle.map(str::to_string),
            kind,
        }
    }

    #[test]
    fn matches_handles_case_insensitively() {
        let set = MembershipSet::from_memberships(&[chat(1, Some("Example"), ChatKind::Channel)]);
        assert!(set.contains(&ChatHandle::from_username("example")));
        assert!(set.contains(&ChatHandle::from_username("EXAMPLE")));
        assert!(!set.contains(&ChatHandle::from_username("other_chat")));
    }

    #[test]
    fn accepts_platform_handles_with_at_prefix() {
        let set = MembershipSet::from_memberships(&[chat(1, Some("@GroupOne"), ChatKind::Group)]);
        assert!(set.contains(&ChatHandle::from_username("groupone")));
    }

    #[test]
    fn private_chats_are_ignored() {
        let set = MembershipSet::from_memberships(&[chat(7, Some("someuser"), ChatKind::Private)]);
        assert!(set.is_empty());
        assert!(!set.contains(&ChatHandle::from_username("someuser")));
    }

    #[test]
    fn chats_without_handle_are_keyed_by_id() {
        let set = MembershipSet::from_memberships(&[
            chat(-100123, None, ChatKind::Channel),
            chat(-100456, Some(""), ChatKind::Group),
        ]);
        assert_eq!(set.len(), 2);
        assert!(set.keys.contains("-100123"));
        assert!(set.keys.contains("-100456"));
    }
}
