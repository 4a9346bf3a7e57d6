//! One lane per session key: at most one agent run at a time, with the
//! queue mode deciding what happens to messages that arrive meanwhile.
//!
//! All lane state sits behind a single `std::sync::Mutex` that is never held
//! across an `.await`. Runner calls happen after the guard is dropped.

use std::{
    collections::{HashMap, VecDeque},
    fmt::Write as _,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use {
    parley_agents::{AgentRunner, RunRequest, RunResult},
    parley_common::{DropPolicy, QueueMode},
    tokio::{sync::oneshot, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, gauge, histogram, labels, lanes as lane_metrics};

use crate::queue::QueueSettings;

const MERGED_HEADER: &str = "[Queued messages while agent was busy]";
const SUMMARY_LINE_MAX_CHARS: usize = 160;

/// How a submitted message was finally handled.
#[derive(Debug)]
pub enum LaneOutcome {
    /// The message ran (alone or as the last of a merged batch).
    Completed(RunResult),
    /// The runner returned an error.
    Failed(String),
    TimedOut(Duration),
    /// Injected into the run that was already streaming.
    Steered,
    /// Folded into another message's run; that message carries the reply.
    Merged,
    /// Discarded by the queue cap.
    Dropped,
    /// Replaced by a newer message before it could run.
    Superseded,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneStatus {
    Idle,
    Running,
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneSnapshot {
    pub status: LaneStatus,
    pub pending: usize,
}

type Waiter = oneshot::Sender<LaneOutcome>;

fn resolve(waiter: Waiter, outcome: LaneOutcome) {
    // The submitter may have gone away; nothing to tell it then.
    let _ = waiter.send(outcome);
}

struct Pending {
    request: RunRequest,
    waiter: Waiter,
}

struct Job {
    request: RunRequest,
    waiter: Waiter,
    /// Earlier batch members whose text is part of `request.prompt`.
    merged: Vec<Waiter>,
}

impl From<Pending> for Job {
    fn from(pending: Pending) -> Self {
        Self {
            request: pending.request,
            waiter: pending.waiter,
            merged: Vec::new(),
        }
    }
}

struct ActiveRun {
    session_id: String,
    cancel: CancellationToken,
}

/// Messages the cap condensed away, reported in the next prompt.
#[derive(Default)]
struct Overflow {
    dropped: usize,
    lines: Vec<String>,
}

impl Overflow {
    fn record(&mut self, prompt: &str) {
        self.dropped += 1;
        self.lines.push(summary_line(prompt));
    }

    fn prepend_to(&mut self, prompt: &mut String) {
        if self.dropped == 0 {
            return;
        }
        let mut notice = format!(
            "[Queue overflow] Dropped {} message(s) due to cap.\nSummary:",
            self.dropped
        );
        for line in self.lines.drain(..) {
            let _ = write!(notice, "\n- {line}");
        }
        self.dropped = 0;
        *prompt = format!("{notice}\n\n{prompt}");
    }
}

#[derive(Default)]
struct LaneState {
    active: Option<ActiveRun>,
    /// FIFO for followup and steer+backlog; latest-only for steer.
    backlog: VecDeque<Pending>,
    /// Collect-mode arrivals waiting for the debounce timer.
    batch: VecDeque<Pending>,
    batch_ready: bool,
    overflow: Overflow,
    debounce: Option<JoinHandle<()>>,
    generation: u64,
}

impl LaneState {
    fn is_idle(&self) -> bool {
        self.active.is_none()
            && self.backlog.is_empty()
            && self.batch.is_empty()
            && self.debounce.is_none()
    }

    fn pending(&self) -> usize {
        self.backlog.len() + self.batch.len()
    }

    /// Next job once the lane is free: backlog first, then an expired batch.
    fn take_next(&mut self) -> Option<Job> {
        if let Some(pending) = self.backlog.pop_front() {
            let mut job = Job::from(pending);
            self.overflow.prepend_to(&mut job.request.prompt);
            return Some(job);
        }
        if !self.batch_ready || self.batch.is_empty() {
            return None;
        }
        self.batch_ready = false;
        let mut items: Vec<Pending> = self.batch.drain(..).collect();
        let last = items.pop()?;
        let mut request = last.request;
        if !items.is_empty() {
            let mut texts: Vec<&str> = items.iter().map(|p| p.request.prompt.as_str()).collect();
            texts.push(&request.prompt);
            let merged = merge_prompts(&texts);
            request.prompt = merged;
        }
        self.overflow.prepend_to(&mut request.prompt);
        Some(Job {
            request,
            waiter: last.waiter,
            merged: items.into_iter().map(|p| p.waiter).collect(),
        })
    }

    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
        self.batch_ready = false;
    }

    /// Resolve everything still waiting with `outcome`.
    fn drain_pending(&mut self, outcome: fn() -> LaneOutcome) {
        self.cancel_debounce();
        for pending in self.backlog.drain(..).chain(self.batch.drain(..)) {
            resolve(pending.waiter, outcome());
        }
        self.overflow = Overflow::default();
    }
}

/// Enforce `settings.cap` on `queue` while adding `item`.
fn push_capped(
    queue: &mut VecDeque<Pending>,
    overflow: &mut Overflow,
    item: Pending,
    settings: &QueueSettings,
) {
    if queue.len() < settings.cap {
        queue.push_back(item);
        return;
    }

    #[cfg(feature = "metrics")]
    counter!(lane_metrics::DROPPED_TOTAL, labels::POLICY => settings.drop.as_str()).increment(1);

    debug!(cap = settings.cap, policy = %settings.drop, "queue cap reached");
    match settings.drop {
        DropPolicy::New => resolve(item.waiter, LaneOutcome::Dropped),
        DropPolicy::Old => {
            if let Some(oldest) = queue.pop_front() {
                resolve(oldest.waiter, LaneOutcome::Dropped);
            }
            queue.push_back(item);
        },
        DropPolicy::Summarize => {
            if let Some(oldest) = queue.pop_front() {
                overflow.record(&oldest.request.prompt);
                resolve(oldest.waiter, LaneOutcome::Merged);
            }
            queue.push_back(item);
        },
    }
}

fn merge_prompts(texts: &[&str]) -> String {
    let mut out = String::from(MERGED_HEADER);
    for (i, text) in texts.iter().enumerate() {
        let _ = write!(out, "\n\n---\nQueued #{}\n{}", i + 1, text.trim());
    }
    out
}

fn summary_line(prompt: &str) -> String {
    let line = prompt
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if line.chars().count() <= SUMMARY_LINE_MAX_CHARS {
        return line.to_string();
    }
    let mut short: String = line.chars().take(SUMMARY_LINE_MAX_CHARS - 1).collect();
    short.push('…');
    short
}

/// Work to do once the lane guard has been released.
enum Followup {
    None,
    Steer { session_id: String, pending: Pending },
}

pub struct LaneManager {
    runner: Arc<dyn AgentRunner>,
    lanes: Mutex<HashMap<String, LaneState>>,
}

impl LaneManager {
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self {
            runner,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LaneState>> {
        self.lanes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self, key: &str) -> LaneSnapshot {
        let lanes = self.lock();
        match lanes.get(key) {
            Some(lane) => LaneSnapshot {
                status: if lane.active.is_some() {
                    LaneStatus::Running
                } else if lane.pending() > 0 {
                    LaneStatus::Queued
                } else {
                    LaneStatus::Idle
                },
                pending: lane.pending(),
            },
            None => LaneSnapshot {
                status: LaneStatus::Idle,
                pending: 0,
            },
        }
    }

    /// Whether the runner reports a run for `session_id`, including runs
    /// started outside this manager.
    pub fn runner_active(&self, session_id: &str) -> bool {
        self.runner.is_active(session_id)
    }

    /// Number of lanes held in memory.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `request` on the lane for `key` and wait until it is resolved.
    pub async fn submit(
        self: &Arc<Self>,
        key: &str,
        request: RunRequest,
        settings: QueueSettings,
    ) -> LaneOutcome {
        let (waiter, rx) = oneshot::channel();
        let pending = Pending { request, waiter };

        let followup = {
            let mut lanes = self.lock();
            let lane = lanes.entry(key.to_string()).or_default();
            self.arrive(key, lane, pending, &settings)
        };
        self.publish_gauge();

        match followup {
            Followup::None => {},
            Followup::Steer {
                session_id,
                pending,
            } => {
                if self
                    .runner
                    .queue_message(&session_id, &pending.request.prompt)
                    .await
                {
                    #[cfg(feature = "metrics")]
                    counter!(lane_metrics::STEERED_TOTAL).increment(1);

                    debug!(session_key = key, session_id = %session_id, "steered message into active run");
                    return LaneOutcome::Steered;
                }
                debug!(session_key = key, "steer rejected, queueing");
                let mut lanes = self.lock();
                let lane = lanes.entry(key.to_string()).or_default();
                self.enqueue_unsteered(key, lane, pending, &settings);
            },
        }

        rx.await.unwrap_or(LaneOutcome::Aborted)
    }

    /// Apply the queue mode to a new arrival. Runs under the lane guard.
    fn arrive(
        self: &Arc<Self>,
        key: &str,
        lane: &mut LaneState,
        pending: Pending,
        settings: &QueueSettings,
    ) -> Followup {
        let Some(active) = lane.active.as_ref() else {
            if settings.mode == QueueMode::Collect && !lane.batch.is_empty() {
                self.collect(key, lane, pending, settings);
            } else {
                self.start(key, lane, Job::from(pending));
            }
            return Followup::None;
        };

        #[cfg(feature = "metrics")]
        counter!(lane_metrics::QUEUED_TOTAL, labels::MODE => settings.mode.as_str()).increment(1);

        match settings.mode {
            QueueMode::Steer | QueueMode::SteerBacklog
                if self.runner.is_streaming(&active.session_id) =>
            {
                Followup::Steer {
                    session_id: active.session_id.clone(),
                    pending,
                }
            },
            QueueMode::Steer | QueueMode::SteerBacklog | QueueMode::Followup => {
                self.enqueue_unsteered(key, lane, pending, settings);
                Followup::None
            },
            QueueMode::Collect => {
                self.collect(key, lane, pending, settings);
                Followup::None
            },
            QueueMode::Interrupt => {
                #[cfg(feature = "metrics")]
                counter!(lane_metrics::ABORTS_TOTAL).increment(1);

                info!(session_key = key, session_id = %active.session_id, "interrupting active run");
                // The drive task aborts the runner before it starts the replacement.
                active.cancel.cancel();
                lane.drain_pending(|| LaneOutcome::Superseded);
                lane.backlog.push_back(pending);
                Followup::None
            },
        }
    }

    fn enqueue_unsteered(
        self: &Arc<Self>,
        key: &str,
        lane: &mut LaneState,
        pending: Pending,
        settings: &QueueSettings,
    ) {
        if lane.active.is_none() {
            self.start(key, lane, Job::from(pending));
            return;
        }
        if settings.mode == QueueMode::Steer {
            for older in lane.backlog.drain(..) {
                resolve(older.waiter, LaneOutcome::Superseded);
            }
            lane.backlog.push_back(pending);
        } else {
            push_capped(&mut lane.backlog, &mut lane.overflow, pending, settings);
        }
        debug!(session_key = key, mode = %settings.mode, pending = lane.pending(), "queued message");
    }

    /// Add to the collect batch and restart the debounce timer.
    fn collect(
        self: &Arc<Self>,
        key: &str,
        lane: &mut LaneState,
        pending: Pending,
        settings: &QueueSettings,
    ) {
        push_capped(&mut lane.batch, &mut lane.overflow, pending, settings);
        lane.cancel_debounce();
        lane.generation += 1;

        let generation = lane.generation;
        let delay = settings.debounce();
        let manager = Arc::clone(self);
        let key = key.to_string();
        lane.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.debounce_elapsed(&key, generation);
        }));
    }

    fn debounce_elapsed(self: &Arc<Self>, key: &str, generation: u64) {
        let mut lanes = self.lock();
        let Some(lane) = lanes.get_mut(key) else {
            return;
        };
        if lane.generation != generation {
            return;
        }
        lane.debounce = None;
        lane.batch_ready = true;
        debug!(session_key = key, batch = lane.batch.len(), "debounce elapsed");
        if lane.active.is_none()
            && let Some(job) = lane.take_next()
        {
            self.start(key, lane, job);
        }
    }

    /// Mark the lane running and spawn the task that drives it.
    fn start(self: &Arc<Self>, key: &str, lane: &mut LaneState, job: Job) {
        let cancel = CancellationToken::new();
        lane.active = Some(ActiveRun {
            session_id: job.request.session_id.clone(),
            cancel: cancel.clone(),
        });
        let manager = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move { manager.drive(key, job, cancel).await });
    }

    /// Run jobs back to back until the lane has nothing ready.
    async fn drive(self: Arc<Self>, key: String, job: Job, cancel: CancellationToken) {
        let mut next = Some((job, cancel));
        while let Some((job, cancel)) = next.take() {
            let outcome = self.run_job(&key, &job.request, &cancel).await;
            for waiter in job.merged {
                resolve(waiter, LaneOutcome::Merged);
            }
            resolve(job.waiter, outcome);

            let mut lanes = self.lock();
            let Some(lane) = lanes.get_mut(&key) else {
                break;
            };
            lane.active = None;
            if let Some(job) = lane.take_next() {
                let cancel = CancellationToken::new();
                lane.active = Some(ActiveRun {
                    session_id: job.request.session_id.clone(),
                    cancel: cancel.clone(),
                });
                next = Some((job, cancel));
            } else if lane.is_idle() {
                lanes.remove(&key);
            }
        }
        self.publish_gauge();
    }

    async fn run_job(
        &self,
        key: &str,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> LaneOutcome {
        #[cfg(feature = "metrics")]
        counter!(lane_metrics::RUNS_TOTAL).increment(1);

        let started = Instant::now();
        let limit = request.timeout;
        let run = self.runner.run(request.clone());
        let bounded = async move {
            match limit {
                Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| limit),
                None => Ok(run.await),
            }
        };

        info!(session_key = key, session_id = %request.session_id, model = %request.model, "agent run started");
        let result = tokio::select! {
            () = cancel.cancelled() => None,
            result = bounded => Some(result),
        };

        #[cfg(feature = "metrics")]
        histogram!(lane_metrics::RUN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            None => {
                let runner_aborted = self.runner.abort(&request.session_id).await;
                info!(session_key = key, elapsed_ms, runner_aborted, "agent run cancelled");
                LaneOutcome::Aborted
            },
            Some(Ok(Ok(result))) if result.meta.aborted => {
                info!(session_key = key, elapsed_ms, "agent run reported abort");
                LaneOutcome::Aborted
            },
            Some(Ok(Ok(result))) => {
                info!(session_key = key, elapsed_ms, payloads = result.payloads.len(), "agent run finished");
                LaneOutcome::Completed(result)
            },
            Some(Ok(Err(e))) => {
                warn!(session_key = key, elapsed_ms, error = %e, "agent run failed");
                LaneOutcome::Failed(e.to_string())
            },
            Some(Err(limit)) => {
                #[cfg(feature = "metrics")]
                counter!(lane_metrics::RUN_TIMEOUTS_TOTAL).increment(1);

                warn!(session_key = key, timeout_secs = limit.as_secs(), "agent run timed out");
                self.runner.abort(&request.session_id).await;
                LaneOutcome::TimedOut(limit)
            },
        }
    }

    /// Stop whatever the lane for `key` is doing. Pending messages resolve as
    /// [`LaneOutcome::Aborted`].
    ///
    /// An active run is cancelled and its drive task aborts the runner. With
    /// nothing running, the runner is still asked to abort `session_id` when
    /// one is known. Returns whether anything was stopped.
    pub async fn abort(&self, key: &str, session_id: Option<&str>) -> bool {
        let (running, drained) = {
            let mut lanes = self.lock();
            let mut drained = 0;
            let running = lanes.get_mut(key).and_then(|lane| {
                drained = lane.pending();
                lane.drain_pending(|| LaneOutcome::Aborted);
                lane.active.as_ref().map(|active| {
                    active.cancel.cancel();
                    active.session_id.clone()
                })
            });
            if lanes.get(key).is_some_and(LaneState::is_idle) {
                lanes.remove(key);
            }
            (running, drained)
        };

        #[cfg(feature = "metrics")]
        counter!(lane_metrics::ABORTS_TOTAL).increment(1);

        self.publish_gauge();
        if let Some(running) = running {
            info!(session_key = key, session_id = %running, "abort requested for active run");
            return true;
        }
        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            debug!(session_key = key, drained, "abort requested with no session to stop");
            return drained > 0;
        };
        let runner_aborted = self.runner.abort(session_id).await;
        info!(session_key = key, session_id, drained, runner_aborted, "abort requested for idle lane");
        runner_aborted || drained > 0
    }

    fn publish_gauge(&self) {
        #[cfg(feature = "metrics")]
        gauge!(lane_metrics::ACTIVE).set(self.len() as f64);
    }
}
