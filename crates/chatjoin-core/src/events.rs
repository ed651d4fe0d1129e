//! Join session events and the reply sink they are reported to.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    domain::{ChatHandle, ChatId, SessionId},
    formatting::render_event_within,
    messaging::port::MessagingPort,
};

/// Everything a join session reports back to the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinEvent {
    Started {
        session: SessionId,
        total: usize,
        limit: u32,
        min_interval: Duration,
        max_interval: Duration,
    },
    Joined {
        handle: ChatHandle,
    },
    Progress {
        index: usize,
        total: usize,
        percent: u32,
    },
    Already {
        handle: ChatHandle,
    },
    NoPublicHandle {
        raw: String,
    },
    Failed {
        handle: ChatHandle,
        description: String,
    },
    FloodWait {
        handle: ChatHandle,
        wait: Duration,
    },
    LimitReached {
        limit: u32,
    },
    Done {
        joined: u32,
    },
    Stopped {
        joined: u32,
    },
    StopRequested,
    NotRunning,
    AlreadyRunning,
    FileNotFound {
        path: PathBuf,
    },
    MembershipUnavailable {
        description: String,
    },
    /// The session task died before reaching a normal end.
    Aborted {
        joined: u32,
        description: String,
    },
}

impl JoinEvent {
    /// Copy of the event with its free text (raw lines, error descriptions,
    /// paths) rewritten by `f`. Handles and counters are kept as is.
    pub fn map_free_text(&self, f: impl Fn(&str) -> String) -> JoinEvent {
        match self {
            JoinEvent::NoPublicHandle { raw } => JoinEvent::NoPublicHandle { raw: f(raw) },
            JoinEvent::Failed {
                handle,
                description,
            } => JoinEvent::Failed {
                handle: handle.clone(),
                description: f(description),
            },
            JoinEvent::FileNotFound { path } => JoinEvent::FileNotFound {
                path: PathBuf::from(f(&path.display().to_string())),
            },
            JoinEvent::MembershipUnavailable { description } => {
                JoinEvent::MembershipUnavailable {
                    description: f(description),
                }
            }
            JoinEvent::Aborted {
                joined,
                description,
            } => JoinEvent::Aborted {
                joined: *joined,
                description: f(description),
            },
            other => other.clone(),
        }
    }
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn report(&self, event: JoinEvent);
}

/// Sink that renders events as HTML and sends them to one chat.
pub struct MessengerSink {
    messenger: Arc<dyn MessagingPort>,
    chat_id: ChatId,
}

impl MessengerSink {
    pub fn new(messenger: Arc<dyn MessagingPort>, chat_id: ChatId) -> Self {
        Self { messenger, chat_id }
    }
}

#[async_trait]
impl ReplySink for MessengerSink {
    async fn report(&self, event: JoinEvent) {
        let limit = self.messenger.capabilities().max_message_len;
        let html = render_event_within(&event, limit);
        if let Err(e) = self.messenger.send_html(self.chat_id, &html).await {
            tracing::warn!(chat_id = self.chat_id.0, error = %e, "failed to deliver join report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        messaging::types::MessagingCapabilities,
        Result,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMessenger {
        sends: Mutex<Vec<(ChatId, String)>>,
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_message_len: 80,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.sends.lock().unwrap().push((chat_id, html.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    #[tokio::test]
    async fn messenger_sink_renders_and_sends_to_its_chat() {
        let messenger = Arc::new(FakeMessenger::default());
        let sink = MessengerSink::new(messenger.clone(), ChatId(42));

        sink.report(JoinEvent::NotRunning).await;

        let sends = messenger.sends.lock().unwrap().clone();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, ChatId(42));
        assert!(sends[0].1.contains("not running"));
    }

    #[tokio::test]
    async fn long_reports_are_truncated_to_messenger_limit() {
        let messenger = Arc::new(FakeMessenger::default());
        let sink = MessengerSink::new(messenger.clone(), ChatId(1));

        sink.report(JoinEvent::NoPublicHandle {
            raw: "x<y".repeat(100),
        })
        .await;

        let sends = messenger.sends.lock().unwrap().clone();
        assert_eq!(sends.len(), 1);
        assert!(sends[0].1.chars().count() <= 80);
        assert!(sends[0].1.ends_with("...</code>"));
    }
}
