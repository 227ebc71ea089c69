use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use loft_types::api::TrackingStatus;

use crate::api::TrackingApi;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const FALLBACK_AFTER: Duration = Duration::from_secs(7);

/// What the view shows for one sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayedStatus {
    /// No observation yet.
    Pending,
    /// The message is not out: failed, still a draft, or unknown.
    Unsent,
    /// Delivered but not known to be opened.
    Unread,
    /// Opened. `confirmed` is false when the local fallback inferred the
    /// open instead of the server reporting it.
    Read {
        opened_at: DateTime<Utc>,
        confirmed: bool,
    },
}

/// Observation state owned by one poll task: the one-way read latch and
/// the local fallback deadline. Nothing here is shared between messages.
struct PollState {
    read_latched: bool,
    fallback_deadline: Option<Instant>,
}

/// Polls the tracking endpoint for a single message and publishes the
/// displayed state on a watch channel.
///
/// The first query fires immediately, then one every five seconds until a
/// read is displayed. Once `Read` is published the loop ends for good:
/// the displayed state never downgrades and no further queries go out.
pub struct StatusPoller {
    rx: watch::Receiver<DisplayedStatus>,
    task: JoinHandle<()>,
}

impl StatusPoller {
    pub fn spawn<A: TrackingApi>(api: A, id: Uuid) -> StatusPoller {
        let (tx, rx) = watch::channel(DisplayedStatus::Pending);
        let task = tokio::spawn(poll_loop(api, id, tx));
        StatusPoller { rx, task }
    }

    /// The most recently published state.
    pub fn status(&self) -> DisplayedStatus {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayedStatus> {
        self.rx.clone()
    }

    /// Stops polling immediately. Dropping the poller does the same.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_loop<A: TrackingApi>(api: A, id: Uuid, tx: watch::Sender<DisplayedStatus>) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut state = PollState {
        read_latched: false,
        fallback_deadline: None,
    };

    while !state.read_latched {
        let displayed = tokio::select! {
            _ = interval.tick() => query(&api, id).await,
            _ = wait_until(state.fallback_deadline) => {
                debug!(%id, "no server confirmation in time, inferring read locally");
                DisplayedStatus::Read {
                    opened_at: Utc::now(),
                    confirmed: false,
                }
            }
        };

        match displayed {
            DisplayedStatus::Read { .. } => {
                state.read_latched = true;
            }
            DisplayedStatus::Unread => {
                // Armed on the first delivery sighting only; repeated
                // unread polls must not push the deadline out.
                if state.fallback_deadline.is_none() {
                    state.fallback_deadline = Some(Instant::now() + FALLBACK_AFTER);
                }
            }
            _ => {
                // Nothing delivered to infer a read from.
                state.fallback_deadline = None;
            }
        }

        if tx.send(displayed).is_err() {
            // Every receiver is gone; nobody is watching this message.
            break;
        }
    }
}

async fn query<A: TrackingApi>(api: &A, id: Uuid) -> DisplayedStatus {
    match api.status(id).await {
        Ok(status) => display_status(&status),
        Err(err) => {
            debug!(%id, error = %err, "status query failed");
            DisplayedStatus::Unread
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Server status to displayed status. The poller treats a `read` missing
/// its timestamp as a half-written record and keeps showing unread until
/// the server serves both fields.
fn display_status(status: &TrackingStatus) -> DisplayedStatus {
    match status.status.as_str() {
        "read" => match status.timestamp {
            Some(opened_at) => DisplayedStatus::Read {
                opened_at,
                confirmed: true,
            },
            None => DisplayedStatus::Unread,
        },
        "sent" => DisplayedStatus::Unread,
        _ => DisplayedStatus::Unsent,
    }
}
