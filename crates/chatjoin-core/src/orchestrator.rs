//! Join orchestrator: owns the single session slot shared by the start, stop and
//! status commands.
//!
//! At most one session is live. The spawned loop task clears the slot under the
//! same lock the stop command takes, and picks its terminal report there: a stop
//! that lands before completion yields `stopped`, one that lands after yields
//! `not_running`.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    command::JoinSettings,
    domain::SessionId,
    errors::Error,
    events::{JoinEvent, ReplySink},
    join_loop::{EndReason, JoinLoop, LoopEnd, SessionProgress},
    platform::ChatPlatform,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SessionId),
    AlreadyRunning,
    FileNotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Requested(SessionId),
    NotRunning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Running,
    Stopping,
}

#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub phase: SessionPhase,
    pub progress: SessionProgress,
    pub settings: JoinSettings,
    pub started_at: DateTime<Utc>,
}

struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
    progress: watch::Receiver<SessionProgress>,
    settings: JoinSettings,
    started_at: DateTime<Utc>,
}

enum SessionState {
    Idle,
    Running(ActiveSession),
    Stopping(ActiveSession),
}

impl SessionState {
    fn active(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Idle => None,
            SessionState::Running(s) | SessionState::Stopping(s) => Some(s),
        }
    }
}

#[derive(Clone)]
pub struct JoinOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    platform: Arc<dyn ChatPlatform>,
    chats_file: PathBuf,
    state: Mutex<SessionState>,
    next_id: AtomicU64,
}

impl JoinOrchestrator {
    pub fn new(platform: Arc<dyn ChatPlatform>, chats_file: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                platform,
                chats_file: chats_file.into(),
                state: Mutex::new(SessionState::Idle),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn chats_file(&self) -> &Path {
        &self.inner.chats_file
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.active().is_some()
    }

    /// Start a session in the background. Every outcome is also reported to `sink`.
    pub async fn start(&self, settings: JoinSettings, sink: Arc<dyn ReplySink>) -> StartOutcome {
        if self.is_running().await {
            sink.report(JoinEvent::AlreadyRunning).await;
            return StartOutcome::AlreadyRunning;
        }

        let lines = match read_candidates(&self.inner.chats_file).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "cannot read chats file");
                sink.report(JoinEvent::FileNotFound {
                    path: self.inner.chats_file.clone(),
                })
                .await;
                return StartOutcome::FileNotFound;
            }
        };

        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let (join_loop, progress) = JoinLoop::new(
            self.inner.platform.clone(),
            sink.clone(),
            settings,
            cancel.clone(),
        );

        {
            let mut st = self.inner.state.lock().await;
            if st.active().is_some() {
                drop(st);
                sink.report(JoinEvent::AlreadyRunning).await;
                return StartOutcome::AlreadyRunning;
            }
            *st = SessionState::Running(ActiveSession {
                id,
                cancel,
                progress: progress.clone(),
                settings,
                started_at: Utc::now(),
            });
        }

        info!(
            session = %id,
            total = lines.len(),
            limit = settings.limit,
            min_secs = settings.min_interval.as_secs(),
            max_secs = settings.max_interval.as_secs(),
            "join session started"
        );
        sink.report(JoinEvent::Started {
            session: id,
            total: lines.len(),
            limit: settings.limit,
            min_interval: settings.min_interval,
            max_interval: settings.max_interval,
        })
        .await;

        let orchestrator = self.clone();
        tokio::spawn(async move {
            let end = match tokio::spawn(join_loop.run(lines)).await {
                Ok(end) => end,
                Err(e) => {
                    error!(session = %id, error = %e, "join loop task failed");
                    LoopEnd {
                        reason: EndReason::Aborted,
                        joined: progress.borrow().joined,
                    }
                }
            };
            orchestrator.finish(id, end, sink).await;
        });

        StartOutcome::Started(id)
    }

    /// Signal cancellation to the live session, if any.
    pub async fn stop(&self, sink: &dyn ReplySink) -> StopOutcome {
        let outcome = {
            let mut st = self.inner.state.lock().await;
            match std::mem::replace(&mut *st, SessionState::Idle) {
                SessionState::Idle => StopOutcome::NotRunning,
                SessionState::Running(s) | SessionState::Stopping(s) => {
                    s.cancel.cancel();
                    let id = s.id;
                    *st = SessionState::Stopping(s);
                    StopOutcome::Requested(id)
                }
            }
        };

        match outcome {
            StopOutcome::Requested(id) => {
                info!(session = %id, "stop requested");
                sink.report(JoinEvent::StopRequested).await;
            }
            StopOutcome::NotRunning => sink.report(JoinEvent::NotRunning).await,
        }
        outcome
    }

    pub async fn status(&self) -> Option<SessionSnapshot> {
        let st = self.inner.state.lock().await;
        let phase = match &*st {
            SessionState::Idle => return None,
            SessionState::Running(_) => SessionPhase::Running,
            SessionState::Stopping(_) => SessionPhase::Stopping,
        };
        st.active().map(|s| SessionSnapshot {
            id: s.id,
            phase,
            progress: *s.progress.borrow(),
            settings: s.settings,
            started_at: s.started_at,
        })
    }

    async fn finish(&self, id: SessionId, end: LoopEnd, sink: Arc<dyn ReplySink>) {
        let stop_requested = {
            let mut st = self.inner.state.lock().await;
            match st.active() {
                Some(s) if s.id == id => {
                    let cancelled = s.cancel.is_cancelled();
                    *st = SessionState::Idle;
                    cancelled
                }
                _ => {
                    warn!(session = %id, "session slot already released");
                    false
                }
            }
        };

        info!(session = %id, reason = ?end.reason, joined = end.joined, "join session ended");
        match end.reason {
            EndReason::Failed => {}
            EndReason::Aborted => {
                sink.report(JoinEvent::Aborted {
                    joined: end.joined,
                    description: "join task ended unexpectedly".to_string(),
                })
                .await
            }
            EndReason::Cancelled => sink.report(JoinEvent::Stopped { joined: end.joined }).await,
            EndReason::Exhausted | EndReason::LimitReached if stop_requested => {
                sink.report(JoinEvent::Stopped { joined: end.joined }).await
            }
            EndReason::Exhausted | EndReason::LimitReached => {
                sink.report(JoinEvent::Done { joined: end.joined }).await
            }
        }
    }
}

/// Non-blank, trimmed lines of the candidates file.
pub async fn read_candidates(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::InputUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
