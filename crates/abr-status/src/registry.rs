//! Status registry implementation.

use std::collections::HashMap;

use abr_models::{JobId, StatusUpdate};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{StatusError, StatusResult};

/// Default mailbox capacity per subscriber.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 5;

/// Counter of updates skipped because a subscriber mailbox was full.
pub const UPDATES_DROPPED_METRIC: &str = "abr_status_updates_dropped_total";

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Updates buffered per subscriber before new ones are dropped
    pub subscriber_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

/// A live subscription to one job's updates.
///
/// The receiver yields `None` once the registry closes the mailbox, either
/// through [`StatusRegistry::unsubscribe`] or [`StatusRegistry::remove`].
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub job_id: JobId,
    pub receiver: mpsc::Receiver<StatusUpdate>,
}

impl Subscription {
    /// Receive the next update.
    pub async fn recv(&mut self) -> Option<StatusUpdate> {
        self.receiver.recv().await
    }
}

#[derive(Default)]
struct Inner {
    statuses: HashMap<JobId, StatusUpdate>,
    subscribers: HashMap<JobId, HashMap<u64, mpsc::Sender<StatusUpdate>>>,
    cancellations: HashMap<JobId, CancellationToken>,
    next_subscription_id: u64,
}

impl Inner {
    fn is_present(&self, job_id: &JobId) -> bool {
        self.statuses.contains_key(job_id) || self.cancellations.contains_key(job_id)
    }
}

/// Shared job status registry.
///
/// All state sits behind a single lock that is never held across an
/// `.await` or a blocking send.
#[derive(Default)]
pub struct StatusRegistry {
    inner: RwLock<Inner>,
    config: RegistryConfig,
}

impl StatusRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to a job's updates.
    ///
    /// The last status, if any, is queued into the new mailbox before it is
    /// returned, so a late subscriber immediately learns the current state.
    pub fn subscribe(&self, job_id: &JobId) -> StatusResult<Subscription> {
        let mut inner = self.inner.write();

        if !inner.is_present(job_id) {
            return Err(StatusError::NotFound(job_id.clone()));
        }

        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity.max(1));
        if let Some(last) = inner.statuses.get(job_id) {
            // Fresh mailbox, cannot be full
            let _ = tx.try_send(last.clone());
        }

        inner.next_subscription_id += 1;
        let id = inner.next_subscription_id;
        inner
            .subscribers
            .entry(job_id.clone())
            .or_default()
            .insert(id, tx);

        debug!(job_id = %job_id, subscription_id = id, "Subscriber attached");

        Ok(Subscription {
            id,
            job_id: job_id.clone(),
            receiver: rx,
        })
    }

    /// Remove a subscription and close its mailbox. Unknown ids are ignored.
    pub fn unsubscribe(&self, job_id: &JobId, subscription_id: u64) {
        let removed = {
            let mut inner = self.inner.write();
            let Some(subs) = inner.subscribers.get_mut(job_id) else {
                return;
            };
            let removed = subs.remove(&subscription_id);
            if subs.is_empty() {
                inner.subscribers.remove(job_id);
            }
            removed
        };

        if removed.is_some() {
            debug!(job_id = %job_id, subscription_id, "Subscriber detached");
        }
    }

    /// Record a new status for a job and deliver it to every subscriber.
    ///
    /// Stamps the broadcast time under the write lock, replacing whatever the
    /// caller set; stamps never go backwards for a job even if the wall clock
    /// does. Full mailboxes are skipped and mailboxes whose receiver is gone
    /// are pruned.
    pub fn publish(&self, job_id: &JobId, mut update: StatusUpdate) {
        let mut dropped = 0u64;
        let mut pruned = 0usize;
        {
            let mut inner = self.inner.write();
            let previous = inner
                .statuses
                .get(job_id)
                .map(|s| s.timestamp)
                .unwrap_or(i64::MIN);
            update.timestamp = chrono::Utc::now().timestamp_millis().max(previous);
            inner.statuses.insert(job_id.clone(), update.clone());

            if let Some(subs) = inner.subscribers.get_mut(job_id) {
                subs.retain(|_, tx| match tx.try_send(update.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        true
                    }
                    Err(TrySendError::Closed(_)) => {
                        pruned += 1;
                        false
                    }
                });
                if subs.is_empty() {
                    inner.subscribers.remove(job_id);
                }
            }
        }

        trace!(job_id = %job_id, kind = %update.kind, "Status published");

        if dropped > 0 {
            debug!(job_id = %job_id, dropped, "Subscriber mailbox full, update dropped");
            metrics::counter!(UPDATES_DROPPED_METRIC).increment(dropped);
        }
        if pruned > 0 {
            debug!(job_id = %job_id, pruned, "Pruned closed subscribers");
        }
    }

    /// Attach a cancellation handle to a job, creating its entry if absent.
    pub fn bind_cancellation(&self, job_id: &JobId, token: CancellationToken) {
        self.inner
            .write()
            .cancellations
            .insert(job_id.clone(), token);
    }

    /// Request cancellation of a job.
    ///
    /// Only fires the job's token; status and subscribers are untouched.
    /// Repeated requests succeed without further effect.
    pub fn cancel(&self, job_id: &JobId) -> StatusResult<()> {
        let inner = self.inner.read();
        match inner.cancellations.get(job_id) {
            Some(token) => {
                if !token.is_cancelled() {
                    debug!(job_id = %job_id, "Cancellation requested");
                }
                token.cancel();
                Ok(())
            }
            None if inner.statuses.contains_key(job_id) => {
                Err(StatusError::NotCancellable(job_id.clone()))
            }
            None => Err(StatusError::NotFound(job_id.clone())),
        }
    }

    /// Forget a job: drop its status, close every subscriber mailbox and
    /// fire then release its cancellation handle.
    pub fn remove(&self, job_id: &JobId) {
        let (status, subscribers, token) = {
            let mut inner = self.inner.write();
            (
                inner.statuses.remove(job_id),
                inner.subscribers.remove(job_id),
                inner.cancellations.remove(job_id),
            )
        };

        if let Some(token) = &token {
            token.cancel();
        }

        let closed = subscribers.map(|subs| subs.len()).unwrap_or(0);
        if status.is_some() || token.is_some() || closed > 0 {
            debug!(job_id = %job_id, closed, "Job removed from registry");
        }
    }

    /// Last status published for a job.
    pub fn last_status(&self, job_id: &JobId) -> Option<StatusUpdate> {
        self.inner.read().statuses.get(job_id).cloned()
    }

    /// Whether the registry knows the job.
    pub fn is_active(&self, job_id: &JobId) -> bool {
        self.inner.read().is_present(job_id)
    }

    pub fn subscriber_count(&self, job_id: &JobId) -> usize {
        self.inner
            .read()
            .subscribers
            .get(job_id)
            .map_or(0, HashMap::len)
    }

    /// Ids of every job with a status entry.
    pub fn active_jobs(&self) -> Vec<JobId> {
        let mut jobs: Vec<JobId> = self.inner.read().statuses.keys().cloned().collect();
        jobs.sort();
        jobs
    }
}
