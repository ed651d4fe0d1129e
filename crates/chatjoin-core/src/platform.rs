use std::time::Duration;

use async_trait::async_trait;

use crate::{domain::ChatHandle, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Channel,
    Group,
    Private,
}

/// One chat the account currently belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMembership {
    pub id: i64,
    /// Public username, with or without a leading `@`.
    pub handle: Option<String>,
    pub kind: ChatKind,
}

/// Result of a single join attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    /// Invalid invite, private channel or unknown username.
    Unjoinable,
    RateLimited {
        wait: Duration,
    },
    Failed {
        description: String,
    },
}

/// Hexagonal port for the chat platform acting on behalf of the user account.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Live listing of chats the account is a member of.
    async fn list_memberships(&self) -> Result<Vec<ChatMembership>>;

    /// Join a public chat by handle. Never fails with `Err`; failures are classified.
    async fn join(&self, handle: &ChatHandle) -> JoinOutcome;
}
