//! The sequential join loop of one session.
//!
//! Per candidate, in file order: cancellation check, limit check, parse,
//! membership pre-check, join attempt (with rate-limit retries on the same
//! candidate), then a randomized pacing delay after every settled attempt.
//! Parse rejections and pre-check hits are skipped without delay.

use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    command::JoinSettings,
    domain::ChatHandle,
    events::{JoinEvent, ReplySink},
    membership::MembershipSet,
    parser::parse_line,
    platform::{ChatPlatform, JoinOutcome},
};

/// Live counters of a running session, published for status queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionProgress {
    /// 1-based position of the candidate being processed (0 before the first).
    pub index: usize,
    pub total: usize,
    pub joined: u32,
    pub limit: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    Exhausted,
    LimitReached,
    Cancelled,
    /// The session could not start (membership listing failed); already reported.
    Failed,
    /// The loop task panicked or was torn down; nothing was reported yet.
    Aborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopEnd {
    pub reason: EndReason,
    pub joined: u32,
}

enum Attempt {
    Joined,
    Settled,
    Cancelled,
}

pub struct JoinLoop {
    platform: Arc<dyn ChatPlatform>,
    sink: Arc<dyn ReplySink>,
    settings: JoinSettings,
    cancel: CancellationToken,
    progress: watch::Sender<SessionProgress>,
}

impl JoinLoop {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        sink: Arc<dyn ReplySink>,
        settings: JoinSettings,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<SessionProgress>) {
        let (progress, rx) = watch::channel(SessionProgress {
            limit: settings.limit,
            ..SessionProgress::default()
        });
        (
            Self {
                platform,
                sink,
                settings,
                cancel,
                progress,
            },
            rx,
        )
    }

    pub async fn run(self, lines: Vec<String>) -> LoopEnd {
        let total = lines.len();
        self.progress.send_modify(|p| p.total = total);

        let memberships = match self.platform.list_memberships().await {
            Ok(m) => MembershipSet::from_memberships(&m),
            Err(e) => {
                error!(error = %e, "failed to list current memberships");
                self.sink
                    .report(JoinEvent::MembershipUnavailable {
                        description: e.to_string(),
                    })
                    .await;
                return self.end(EndReason::Failed, 0);
            }
        };
        debug!(known = memberships.len(), total, "membership set built");

        let mut joined = 0u32;
        for (i, line) in lines.iter().enumerate() {
            let index = i + 1;

            if self.cancel.is_cancelled() {
                return self.end(EndReason::Cancelled, joined);
            }
            if joined >= self.settings.limit {
                info!(limit = self.settings.limit, "join limit reached");
                self.sink
                    .report(JoinEvent::LimitReached {
                        limit: self.settings.limit,
                    })
                    .await;
                return self.end(EndReason::LimitReached, joined);
            }
            self.progress.send_modify(|p| p.index = index);

            let handle = match parse_line(line) {
                Ok(h) => h,
                Err(rejection) => {
                    debug!(line = %rejection.raw, kind = ?rejection.kind, "line rejected");
                    self.sink
                        .report(JoinEvent::NoPublicHandle { raw: rejection.raw })
                        .await;
                    continue;
                }
            };

            if memberships.contains(&handle) {
                self.sink.report(JoinEvent::Already { handle }).await;
                continue;
            }

            match self.attempt(&handle, line).await {
                Attempt::Joined => {
                    joined += 1;
                    self.progress.send_modify(|p| p.joined = joined);
                    info!(%handle, joined, "joined chat");
                    self.sink.report(JoinEvent::Joined { handle }).await;
                    self.sink
                        .report(JoinEvent::Progress {
                            index,
                            total,
                            percent: percent(index, total),
                        })
                        .await;
                }
                Attempt::Settled => {}
                Attempt::Cancelled => return self.end(EndReason::Cancelled, joined),
            }

            if !self.sleep_or_cancel(pacing_delay(&self.settings)).await {
                return self.end(EndReason::Cancelled, joined);
            }
        }

        self.end(EndReason::Exhausted, joined)
    }

    async fn attempt(&self, handle: &ChatHandle, raw: &str) -> Attempt {
        let mut retries = 0u32;
        loop {
            match self.platform.join(handle).await {
                JoinOutcome::Joined => return Attempt::Joined,
                JoinOutcome::AlreadyMember => {
                    self.sink
                        .report(JoinEvent::Already {
                            handle: handle.clone(),
                        })
                        .await;
                    return Attempt::Settled;
                }
                JoinOutcome::Unjoinable => {
                    self.sink
                        .report(JoinEvent::NoPublicHandle {
                            raw: raw.to_string(),
                        })
                        .await;
                    return Attempt::Settled;
                }
                JoinOutcome::RateLimited { wait } => {
                    if retries >= self.settings.max_flood_retries {
                        warn!(%handle, retries, "giving up after repeated rate limits");
                        self.sink
                            .report(JoinEvent::Failed {
                                handle: handle.clone(),
                                description: format!(
                                    "rate limit retries exhausted ({retries})"
                                ),
                            })
                            .await;
                        return Attempt::Settled;
                    }
                    retries += 1;
                    warn!(%handle, wait_secs = wait.as_secs(), retries, "rate limited");
                    self.sink
                        .report(JoinEvent::FloodWait {
                            handle: handle.clone(),
                            wait,
                        })
                        .await;
                    if !self.sleep_or_cancel(wait).await {
                        return Attempt::Cancelled;
                    }
                }
                JoinOutcome::Failed { description } => {
                    error!(%handle, error = %description, "join failed");
                    self.sink
                        .report(JoinEvent::Failed {
                            handle: handle.clone(),
                            description,
                        })
                        .await;
                    return Attempt::Settled;
                }
            }
        }
    }

    /// Returns `false` if cancellation interrupted the sleep.
    async fn sleep_or_cancel(&self, d: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(d) => true,
        }
    }

    fn end(&self, reason: EndReason, joined: u32) -> LoopEnd {
        LoopEnd { reason, joined }
    }
}

/// Uniform random delay in `[min_interval, max_interval]`.
pub fn pacing_delay(settings: &JoinSettings) -> Duration {
    let min = settings.min_interval.as_millis() as u64;
    let max = settings.max_interval.as_millis() as u64;
    if min >= max {
        return settings.min_interval;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

fn percent(index: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    (index * 100 / total) as u32
}
