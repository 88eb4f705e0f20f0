//! Serialized device command execution.
//!
//! Every side effect the engine has on devices goes through one FIFO queue
//! drained by a single worker task. Grouping commands are order-dependent
//! (join before select-source, unjoin before parking a speaker) and two
//! overlapping commands on the same device can race, so nothing else may call
//! the [`DeviceCommandSink`] directly.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::devices::{DeviceCommand, DeviceCommandSink, SignalSource};
use crate::events::{ActionEvent, EventEmitter};
use crate::runtime::TaskSpawner;
use crate::utils::{now_millis, poll_until, PollOutcome};

/// Device-state predicate for [`Action::WaitUntil`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// Every listed device is alone in its group (or unknown).
    Ungrouped,
    /// `leader` reports all `members` in its group.
    GroupedUnder {
        leader: String,
        members: Vec<String>,
    },
    /// Every listed device has the named source selected.
    SourceSelected(String),
}

impl WaitCondition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ungrouped => "ungrouped",
            Self::GroupedUnder { .. } => "grouped",
            Self::SourceSelected(_) => "source_selected",
        }
    }

    /// Evaluates the condition against live state.
    pub fn holds(&self, devices: &[String], signals: &dyn SignalSource) -> bool {
        match self {
            Self::Ungrouped => devices.iter().all(|id| {
                signals
                    .device_state(id)
                    .map_or(true, |s| s.is_ungrouped())
            }),
            Self::GroupedUnder { leader, members } => {
                signals.device_state(leader).is_some_and(|s| {
                    members.iter().all(|m| s.group_members.contains(m))
                })
            }
            Self::SourceSelected(source) => devices.iter().all(|id| {
                signals
                    .device_state(id)
                    .is_some_and(|s| s.source_is(source))
            }),
        }
    }
}

/// One queued unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Command(DeviceCommand),
    /// Suspends the worker.
    Delay(Duration),
    /// Polls until `condition` holds or `timeout` elapses, then moves on either way.
    WaitUntil {
        devices: Vec<String>,
        condition: WaitCondition,
        timeout: Duration,
    },
}

impl From<DeviceCommand> for Action {
    fn from(command: DeviceCommand) -> Self {
        Action::Command(command)
    }
}

/// FIFO action queue with a single consumer.
pub struct ActionQueue {
    tx: mpsc::UnboundedSender<Action>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Action>>>,
    /// Actions enqueued but not yet finished.
    pending: watch::Sender<usize>,
    sink: Arc<dyn DeviceCommandSink>,
    signals: Arc<dyn SignalSource>,
    emitter: Arc<dyn EventEmitter>,
    poll_interval: Duration,
}

impl ActionQueue {
    pub fn new(
        sink: Arc<dyn DeviceCommandSink>,
        signals: Arc<dyn SignalSource>,
        emitter: Arc<dyn EventEmitter>,
        poll_interval: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            pending,
            sink,
            signals,
            emitter,
            poll_interval,
        }
    }

    /// Appends an action to the queue.
    pub fn enqueue(&self, action: impl Into<Action>) {
        let action = action.into();
        self.pending.send_modify(|n| *n += 1);
        if self.tx.send(action).is_err() {
            // Worker gone (shutdown); nothing will ever run this.
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            log::warn!("[ActionQueue] Worker stopped, dropping action");
        }
    }

    /// Appends several actions, preserving their order.
    pub fn enqueue_all(&self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.enqueue(action);
        }
    }

    /// Number of actions not yet finished (including the one running).
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolves once every action enqueued so far has finished.
    pub async fn wait_for_actions(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Spawns the worker. Only the first call has an effect.
    pub fn start_worker<S: TaskSpawner>(self: &Arc<Self>, spawner: &S, cancel: CancellationToken) {
        let Some(mut rx) = self.rx.lock().take() else {
            log::warn!("[ActionQueue] Worker already started");
            return;
        };
        let queue = Arc::clone(self);

        spawner.spawn(async move {
            log::debug!("[ActionQueue] Worker started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => {
                        let Some(action) = next else { break };
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = queue.execute(action) => {}
                        }
                        queue.pending.send_modify(|n| *n = n.saturating_sub(1));
                    }
                }
            }
            // Release anyone blocked in wait_for_actions.
            queue.pending.send_replace(0);
            log::debug!("[ActionQueue] Worker stopped");
        });
    }

    async fn execute(&self, action: Action) {
        match action {
            Action::Command(command) => {
                log::debug!("[ActionQueue] Executing {}", command);
                if let Err(e) = self.sink.execute(&command).await {
                    log::warn!("[ActionQueue] {} failed: {}", command, e);
                    self.emitter.emit_action(ActionEvent::Failed {
                        command: command.verb().to_string(),
                        targets: command.targets(),
                        error: e.to_string(),
                        timestamp: now_millis(),
                    });
                }
            }
            Action::Delay(duration) => {
                tokio::time::sleep(duration).await;
            }
            Action::WaitUntil {
                devices,
                condition,
                timeout,
            } => {
                let started = Instant::now();
                let signals = self.signals.as_ref();
                let outcome = poll_until(self.poll_interval, timeout, || {
                    condition.holds(&devices, signals)
                })
                .await;
                match outcome {
                    PollOutcome::Satisfied { attempts } => log::debug!(
                        "[ActionQueue] {} satisfied after {} check(s)",
                        condition.name(),
                        attempts
                    ),
                    PollOutcome::TimedOut { .. } => {
                        log::debug!(
                            "[ActionQueue] {} not reached within {:?}, continuing",
                            condition.name(),
                            timeout
                        );
                        self.emitter.emit_action(ActionEvent::TimedOut {
                            condition: condition.name().to_string(),
                            devices,
                            waited_ms: started.elapsed().as_millis() as u64,
                            timestamp: now_millis(),
                        });
                    }
                }
            }
        }
    }
}
