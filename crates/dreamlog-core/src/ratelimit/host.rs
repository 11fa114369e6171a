//! Actor runtime for rate limiter actors.
//!
//! Each identity gets one tokio task that owns its [`RateLimiterActor`] and a
//! bounded mailbox. The task handles one command at a time and waits on the
//! actor's armed alarm in the same `select!`, so a request and an alarm for the
//! same identity never run concurrently. Different identities run in parallel.
//!
//! An actor retires once its alarm finds nothing left to reclaim. Its
//! persisted alarm stays behind, and the next request for that identity
//! spawns a fresh actor.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::actor::RateLimiterActor;
use super::clock::Clock;
use super::request::{RateLimitDecision, RateLimitRequest};
use super::store::RateLimitStore;
use super::{RateLimitConfig, RateLimitError};
use crate::storage::Result as StorageResult;

/// Mailbox depth per identity
const MAILBOX_CAPACITY: usize = 64;

/// Attempts to reach a live actor before giving up
const MAX_DELIVERY_ATTEMPTS: usize = 3;

enum Command {
    Evaluate {
        request: RateLimitRequest,
        reply: oneshot::Sender<RateLimitDecision>,
    },
}

struct ActorSlot {
    mailbox: mpsc::Sender<Command>,
    task: JoinHandle<()>,
    generation: u64,
}

type SlotMap = Arc<Mutex<HashMap<String, ActorSlot>>>;

/// Hosts one actor per identity and routes calls to it
pub struct RateLimiterHost {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    slots: SlotMap,
    generations: AtomicU64,
}

impl RateLimiterHost {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            slots: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Evaluate a request on the actor owning `identity`
    pub async fn evaluate(
        &self,
        identity: &str,
        request: RateLimitRequest,
    ) -> Result<RateLimitDecision, RateLimitError> {
        request.validate()?;

        // A retiring actor drops queued replies without evaluating them, so
        // both a closed mailbox and a dropped reply mean "respawn and resend"
        for _ in 0..MAX_DELIVERY_ATTEMPTS {
            let mailbox = self.mailbox(identity, None).await;
            let (reply, answer) = oneshot::channel();

            if mailbox
                .send(Command::Evaluate { request, reply })
                .await
                .is_err()
            {
                self.evict(identity).await;
                continue;
            }

            match answer.await {
                Ok(decision) => return Ok(decision),
                Err(_) => self.evict(identity).await,
            }
        }

        Err(RateLimitError::ActorUnavailable(identity.to_string()))
    }

    /// Start actors for every alarm persisted before a restart.
    ///
    /// Returns the number of actors resumed.
    pub async fn resume_alarms(&self) -> StorageResult<usize> {
        let alarms = self.store.pending_alarms()?;
        let count = alarms.len();
        for (key, fire_at) in alarms {
            self.mailbox(&key, Some(fire_at)).await;
        }
        if count > 0 {
            info!(count, "Resumed rate limiter alarms");
        }
        Ok(count)
    }

    /// Number of identities with a live actor task
    pub async fn active_actors(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| !slot.task.is_finished())
            .count()
    }

    /// Stop every actor task. Persisted state and alarms are left in place.
    pub async fn shutdown(&self) {
        let slots: Vec<ActorSlot> = self.slots.lock().await.drain().map(|(_, s)| s).collect();
        for slot in slots {
            drop(slot.mailbox);
            if let Err(e) = slot.task.await {
                warn!(error = %e, "Rate limiter actor task ended abnormally");
            }
        }
    }

    async fn mailbox(&self, identity: &str, pending_alarm: Option<i64>) -> mpsc::Sender<Command> {
        let mut slots = self.slots.lock().await;

        if let Some(slot) = slots.get(identity) {
            if !slot.mailbox.is_closed() {
                return slot.mailbox.clone();
            }
        }

        let mut actor = RateLimiterActor::new(
            identity,
            self.store.clone(),
            self.clock.clone(),
            self.config,
        );
        if let Some(fire_at) = pending_alarm {
            actor = actor.with_pending_alarm(fire_at);
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let retirement = Retirement {
            slots: self.slots.clone(),
            identity: identity.to_string(),
            generation,
        };

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let task = tokio::spawn(run_actor(actor, rx, retirement));
        debug!(identity, "Spawned rate limiter actor");

        slots.insert(
            identity.to_string(),
            ActorSlot {
                mailbox: tx.clone(),
                task,
                generation,
            },
        );
        tx
    }

    async fn evict(&self, identity: &str) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(identity) {
            if slot.mailbox.is_closed() {
                slots.remove(identity);
            }
        }
    }
}

/// Removes a retired actor's slot, unless a newer actor already took it over
struct Retirement {
    slots: SlotMap,
    identity: String,
    generation: u64,
}

impl Retirement {
    async fn release(self) {
        let mut slots = self.slots.lock().await;
        if slots
            .get(&self.identity)
            .is_some_and(|slot| slot.generation == self.generation)
        {
            slots.remove(&self.identity);
        }
    }
}

/// Mailbox loop of one identity
async fn run_actor(
    mut actor: RateLimiterActor,
    mut rx: mpsc::Receiver<Command>,
    retirement: Retirement,
) {
    loop {
        let delay = actor
            .next_alarm()
            .map(|fire_at| Duration::from_millis((fire_at - actor.now_ms()).max(0) as u64));

        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Evaluate { request, reply }) => {
                    let decision = actor.evaluate(&request);
                    // Caller may have given up; the window is already updated
                    let _ = reply.send(decision);
                }
                None => break,
            },
            _ = wait_for_alarm(delay) => {
                if !actor.alarm() && rx.is_empty() {
                    // Commands that slipped in after the check are dropped
                    // unanswered; their callers resend to a fresh actor
                    rx.close();
                    while rx.try_recv().is_ok() {}
                    debug!(identity = actor.key(), "Rate limiter actor retired");
                    retirement.release().await;
                    return;
                }
            }
        }
    }
    debug!(identity = actor.key(), "Rate limiter actor stopped");
}

async fn wait_for_alarm(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}
