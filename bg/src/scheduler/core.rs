//! Scheduler implementation
//!
//! A single task owns the item store and the rate window. Commands from
//! handles and outcomes from runner tasks arrive over one channel, and the
//! periodic admission cycle runs inside the same task, so every
//! read-modify-write of scheduler state is serialized without locks.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::{GenerationRequest, WorkItemId, WorkState, WorkStatus};

use super::config::{ConfigurationError, SchedulerConfig};
use super::handle::SchedulerHandle;
use super::messages::{SchedulerCommand, SchedulerError};
use super::queue::{QueueState, SchedulerEvent, SchedulerStats};
use super::runner::{self, Executor};
use super::store::WorkItemStore;
use super::window::RateWindow;

/// Capacity of the event broadcast channel
const EVENT_BUFFER: usize = 1024;

/// Result of one admission cycle
#[derive(Debug, Default)]
struct CycleOutcome {
    /// Items moved Queued -> Running, in admission order
    admitted: Vec<(WorkItemId, GenerationRequest)>,
    /// Nothing queued or running and nothing admitted
    idle: bool,
}

/// State owned by the scheduler task
struct SchedulerState {
    store: WorkItemStore,
    window: RateWindow,
    max_concurrent: usize,
    /// Present while the admission cycle is active
    ticker: Option<Interval>,
    stats: SchedulerStats,
}

impl SchedulerState {
    fn new(config: &SchedulerConfig) -> Self {
        Self {
            store: WorkItemStore::new(),
            window: RateWindow::new(config.rate_limit, config.window()),
            max_concurrent: config.max_concurrent,
            ticker: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Admit as many queued items as capacity and the rate window allow
    fn run_cycle(&mut self, now: Instant) -> CycleOutcome {
        self.stats.cycles += 1;

        let running = self.store.count(WorkStatus::Running);
        let free_slots = self.max_concurrent.saturating_sub(running);
        let rate_budget = self.window.available(now);
        let slots_to_fill = free_slots.min(rate_budget);
        debug!(
            running,
            free_slots, rate_budget, slots_to_fill, "SchedulerState::run_cycle: computed slots"
        );

        let mut admitted = Vec::new();
        if slots_to_fill > 0 {
            // Earliest-submitted first
            let candidates: Vec<WorkItemId> = self
                .store
                .list_by_status(WorkStatus::Queued)
                .take(slots_to_fill)
                .map(|item| item.id)
                .collect();

            for id in candidates {
                if self.store.transition(&id, &[WorkStatus::Queued], WorkState::Running)
                    && let Some(item) = self.store.get(&id)
                {
                    admitted.push((id, item.request.clone()));
                }
            }

            self.window.record(admitted.len(), now);
            self.stats.total_admitted += admitted.len() as u64;
            let running_now = self.store.count(WorkStatus::Running);
            self.stats.peak_running = self.stats.peak_running.max(running_now);
        }

        let idle = admitted.is_empty()
            && self.store.count(WorkStatus::Queued) == 0
            && self.store.count(WorkStatus::Running) == 0;

        CycleOutcome { admitted, idle }
    }

    fn queue_state(&mut self, now: Instant) -> QueueState {
        QueueState {
            queued: self.store.count(WorkStatus::Queued),
            running: self.store.count(WorkStatus::Running),
            succeeded: self.store.count(WorkStatus::Succeeded),
            failed: self.store.count(WorkStatus::Failed),
            max_concurrent: self.max_concurrent,
            admissions_in_window: self.window.in_window(now),
            rate_limited_for: self.window.retry_after(now),
            cycle_active: self.ticker.is_some(),
            stats: self.stats.clone(),
        }
    }
}

/// Wait for the next admission tick, or forever while the cycle is stopped
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// The Scheduler admits queued work under concurrency and rate limits
///
/// The task runs until `shutdown()`, or until every handle is dropped and
/// the runners still in flight have reported back.
pub struct Scheduler {
    config: SchedulerConfig,
    executor: Arc<dyn Executor>,
    /// Handed to runners; does not keep the command channel open
    tx: mpsc::WeakSender<SchedulerCommand>,
    rx: mpsc::Receiver<SchedulerCommand>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler and the handle that drives it
    pub fn new(
        config: SchedulerConfig,
        executor: Arc<dyn Executor>,
    ) -> Result<(Self, SchedulerHandle), ConfigurationError> {
        debug!(?config, "Scheduler::new: called");
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let scheduler = Self {
            config,
            executor,
            tx: tx.downgrade(),
            rx,
            events,
        };
        Ok((scheduler, SchedulerHandle::new(tx)))
    }

    /// Create a scheduler and spawn its task
    pub fn spawn(
        config: SchedulerConfig,
        executor: Arc<dyn Executor>,
    ) -> Result<(SchedulerHandle, JoinHandle<()>), ConfigurationError> {
        let (scheduler, handle) = Self::new(config, executor)?;
        let task = tokio::spawn(scheduler.run());
        Ok((handle, task))
    }

    /// Run the scheduler task until shutdown
    pub async fn run(mut self) {
        let mut state = SchedulerState::new(&self.config);
        info!(
            max_concurrent = self.config.max_concurrent,
            rate_limit = self.config.rate_limit,
            window_ms = self.config.window_ms,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else {
                        info!("Scheduler: all handles dropped");
                        break;
                    };
                    if !self.handle_command(cmd, &mut state) {
                        break;
                    }
                }
                _ = next_tick(&mut state.ticker) => {
                    self.admit(&mut state);
                }
            }
        }

        info!(
            total_admitted = state.stats.total_admitted,
            "Scheduler stopped"
        );
    }

    /// Returns false when the task should stop
    fn handle_command(&self, cmd: SchedulerCommand, state: &mut SchedulerState) -> bool {
        match cmd {
            SchedulerCommand::Enqueue { request, reply } => {
                let id = self.enqueue(request, state);
                let _ = reply.send(id);
                self.start_cycle(state);
            }

            SchedulerCommand::EnqueueBatch { requests, reply } => {
                debug!(count = requests.len(), "Scheduler: enqueue batch");
                let ids = requests.into_iter().map(|r| self.enqueue(r, state)).collect();
                let _ = reply.send(ids);
                self.start_cycle(state);
            }

            SchedulerCommand::Retry { id, reply } => {
                let result = if state.store.get(&id).is_none() {
                    Err(SchedulerError::NotFound(id))
                } else if state.store.transition(&id, &[WorkStatus::Failed], WorkState::Queued) {
                    info!(%id, "Retrying failed item");
                    state.stats.total_retried += 1;
                    self.emit(SchedulerEvent::Retried { id });
                    Ok(true)
                } else {
                    debug!(%id, "Scheduler: retry ignored, item not failed");
                    Ok(false)
                };
                let _ = reply.send(result);
                self.start_cycle(state);
            }

            SchedulerCommand::ListAll { reply } => {
                let _ = reply.send(state.store.list_all().to_vec());
            }

            SchedulerCommand::ListByStatus { status, reply } => {
                let _ = reply.send(state.store.list_by_status(status).cloned().collect());
            }

            SchedulerCommand::Get { id, reply } => {
                let _ = reply.send(state.store.get(&id).cloned());
            }

            SchedulerCommand::SetMaxConcurrent { max_concurrent, reply } => {
                let running = state.store.count(WorkStatus::Running);
                let result: Result<(), SchedulerError> = if max_concurrent < 1 {
                    Err(ConfigurationError::MaxConcurrent(max_concurrent).into())
                } else if running > 0 {
                    warn!(running, max_concurrent, "Rejected capacity change while items are running");
                    Err(SchedulerError::CapacityLocked { running })
                } else {
                    info!(from = state.max_concurrent, to = max_concurrent, "Capacity changed");
                    state.max_concurrent = max_concurrent;
                    Ok(())
                };
                let _ = reply.send(result);
            }

            SchedulerCommand::GetState { reply } => {
                let _ = reply.send(state.queue_state(Instant::now()));
            }

            SchedulerCommand::Subscribe { reply } => {
                let _ = reply.send(self.events.subscribe());
            }

            SchedulerCommand::Settled { id, outcome } => {
                let (to, event) = match outcome {
                    Ok(artifact) => {
                        info!(%id, uri = %artifact.uri, "Item succeeded");
                        (WorkState::Succeeded { artifact }, SchedulerEvent::Succeeded { id })
                    }
                    Err(e) => {
                        warn!(%id, error = %e, "Item failed");
                        let error = e.message;
                        (
                            WorkState::Failed { error: error.clone() },
                            SchedulerEvent::Failed { id, error },
                        )
                    }
                };
                let succeeded = matches!(to, WorkState::Succeeded { .. });
                if state.store.transition(&id, &[WorkStatus::Running], to) {
                    if succeeded {
                        state.stats.total_succeeded += 1;
                    } else {
                        state.stats.total_failed += 1;
                    }
                    self.emit(event);
                } else {
                    warn!(%id, "Settlement for an item that is not running, ignoring");
                }
            }

            SchedulerCommand::Shutdown => {
                info!("Scheduler shutting down");
                return false;
            }
        }
        true
    }

    fn enqueue(&self, request: GenerationRequest, state: &mut SchedulerState) -> WorkItemId {
        let id = state.store.enqueue(request);
        state.stats.total_enqueued += 1;
        debug!(%id, "Scheduler: enqueued");
        self.emit(SchedulerEvent::Enqueued { id });
        id
    }

    /// Start the admission cycle if work is queued and it is not running
    fn start_cycle(&self, state: &mut SchedulerState) {
        if state.ticker.is_some() || state.store.count(WorkStatus::Queued) == 0 {
            return;
        }
        let period = self.config.poll_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        state.ticker = Some(interval);
        info!(poll_interval_ms = self.config.poll_interval_ms, "Admission cycle started");
        self.emit(SchedulerEvent::CycleStarted);
    }

    /// Run one admission cycle and hand admitted items to runners
    fn admit(&self, state: &mut SchedulerState) {
        // No handles and no runners left: the channel is closing
        let Some(tx) = self.tx.upgrade() else {
            debug!("Scheduler::admit: command channel closed, skipping cycle");
            return;
        };
        let outcome = state.run_cycle(Instant::now());

        for (id, request) in outcome.admitted {
            info!(%id, model = %request.model, "Admitted item");
            self.emit(SchedulerEvent::Admitted { id });
            runner::spawn(self.executor.clone(), id, request, tx.clone());
        }

        if outcome.idle {
            state.ticker = None;
            info!("Admission cycle stopped, queue is idle");
            self.emit(SchedulerEvent::CycleStopped);
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::runner::mock::ManualExecutor;
    use std::time::Duration;

    fn state_with(config: SchedulerConfig, prompts: &[&str]) -> (SchedulerState, Vec<WorkItemId>) {
        let mut state = SchedulerState::new(&config);
        let ids = prompts
            .iter()
            .map(|p| state.store.enqueue(GenerationRequest::new(*p)))
            .collect();
        (state, ids)
    }

    fn admitted_ids(outcome: &CycleOutcome) -> Vec<WorkItemId> {
        outcome.admitted.iter().map(|(id, _)| *id).collect()
    }

    #[test]
    fn test_cycle_bound_by_concurrency() {
        let config = SchedulerConfig {
            max_concurrent: 2,
            rate_limit: 100,
            ..Default::default()
        };
        let (mut state, ids) = state_with(config, &["a", "b", "c", "d", "e"]);
        let now = Instant::now();

        let outcome = state.run_cycle(now);
        assert_eq!(admitted_ids(&outcome), vec![ids[0], ids[1]]);
        assert!(!outcome.idle);
        assert_eq!(state.store.count(WorkStatus::Running), 2);
        assert_eq!(state.store.count(WorkStatus::Queued), 3);

        // Full: a second cycle admits nothing
        let outcome = state.run_cycle(now);
        assert!(outcome.admitted.is_empty());
        assert!(!outcome.idle);
    }

    #[test]
    fn test_cycle_bound_by_rate_window() {
        let config = SchedulerConfig {
            max_concurrent: 10,
            rate_limit: 2,
            window_ms: 60_000,
            ..Default::default()
        };
        let (mut state, ids) = state_with(config, &["a", "b", "c", "d", "e"]);
        let start = Instant::now();

        let outcome = state.run_cycle(start);
        assert_eq!(admitted_ids(&outcome), vec![ids[0], ids[1]]);

        // Settle both; the window still blocks
        for id in &ids[..2] {
            state.store.transition(
                id,
                &[WorkStatus::Running],
                WorkState::Failed {
                    error: "x".to_string(),
                },
            );
        }
        let outcome = state.run_cycle(start + Duration::from_secs(30));
        assert!(outcome.admitted.is_empty());

        // Once the window has passed, two more go
        let outcome = state.run_cycle(start + Duration::from_secs(60));
        assert_eq!(admitted_ids(&outcome), vec![ids[2], ids[3]]);
    }

    #[test]
    fn test_cycle_goes_idle_when_all_terminal() {
        let (mut state, ids) = state_with(SchedulerConfig::default(), &["a"]);
        let now = Instant::now();

        state.run_cycle(now);
        state.store.transition(
            &ids[0],
            &[WorkStatus::Running],
            WorkState::Succeeded {
                artifact: crate::domain::Artifact::new("uri"),
            },
        );

        let outcome = state.run_cycle(now);
        assert!(outcome.admitted.is_empty());
        assert!(outcome.idle);
        assert_eq!(state.window.in_window(now), 1);
    }

    #[test]
    fn test_cycle_not_idle_while_running() {
        let (mut state, _) = state_with(SchedulerConfig::default(), &["a"]);
        let now = Instant::now();
        state.run_cycle(now);

        let outcome = state.run_cycle(now);
        assert!(outcome.admitted.is_empty());
        assert!(!outcome.idle);
    }

    #[test]
    fn test_records_match_admissions() {
        let config = SchedulerConfig {
            max_concurrent: 3,
            rate_limit: 10,
            ..Default::default()
        };
        let (mut state, _) = state_with(config, &["a", "b"]);
        let now = Instant::now();

        let outcome = state.run_cycle(now);
        assert_eq!(outcome.admitted.len(), 2);
        assert_eq!(state.window.in_window(now), 2);
        assert_eq!(state.stats.total_admitted, 2);
        assert_eq!(state.stats.peak_running, 2);
    }

    #[test]
    fn test_queue_state_reports_rate_limit() {
        let config = SchedulerConfig {
            rate_limit: 1,
            ..Default::default()
        };
        let (mut state, _) = state_with(config, &["a", "b"]);
        let now = Instant::now();
        state.run_cycle(now);

        let snapshot = state.queue_state(now + Duration::from_secs(10));
        assert_eq!(snapshot.running, 1);
        assert_eq!(snapshot.queued, 1);
        assert_eq!(snapshot.admissions_in_window, 1);
        assert_eq!(snapshot.rate_limited_for, Some(Duration::from_secs(50)));
        assert!(!snapshot.cycle_active);
    }

    // Actor-level scenarios on a paused clock. The first cycle fires one
    // poll interval (1s) after work is enqueued.

    fn requests(prompts: &[&str]) -> Vec<GenerationRequest> {
        prompts.iter().map(|p| GenerationRequest::new(*p)).collect()
    }

    async fn statuses(handle: &SchedulerHandle) -> Vec<WorkStatus> {
        handle.list_all().await.unwrap().iter().map(|i| i.status()).collect()
    }

    /// Sleep just past the next cycle
    async fn next_cycle() {
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }

    /// Let runner tasks report back without reaching the next cycle
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn first_cycle() {
        tokio::time::sleep(Duration::from_millis(1001)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bound_admission_then_refill() {
        use WorkStatus::*;
        let executor = ManualExecutor::new();
        let config = SchedulerConfig {
            max_concurrent: 2,
            rate_limit: 100,
            ..Default::default()
        };
        let (handle, _task) = Scheduler::spawn(config, executor.clone()).unwrap();

        handle.enqueue_batch(requests(&["A", "B", "C", "D", "E"])).await.unwrap();
        assert_eq!(statuses(&handle).await, vec![Queued; 5]);

        first_cycle().await;
        assert_eq!(statuses(&handle).await, vec![Running, Running, Queued, Queued, Queued]);
        assert_eq!(executor.started(), vec!["A", "B"]);

        assert!(executor.succeed("A"));
        next_cycle().await;
        assert_eq!(
            statuses(&handle).await,
            vec![Succeeded, Running, Running, Queued, Queued]
        );
        assert_eq!(executor.started(), vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_bound_admission_waits_for_window() {
        use WorkStatus::*;
        let executor = ManualExecutor::new();
        let config = SchedulerConfig {
            max_concurrent: 10,
            rate_limit: 2,
            window_ms: 60_000,
            ..Default::default()
        };
        let (handle, _task) = Scheduler::spawn(config, executor.clone()).unwrap();

        handle.enqueue_batch(requests(&["A", "B", "C", "D", "E"])).await.unwrap();
        first_cycle().await;
        assert_eq!(statuses(&handle).await, vec![Running, Running, Queued, Queued, Queued]);

        assert_eq!(executor.succeed_all(), 2);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            statuses(&handle).await,
            vec![Succeeded, Succeeded, Queued, Queued, Queued]
        );
        let state = handle.state().await.unwrap();
        assert_eq!(state.admissions_in_window, 2);
        assert!(state.rate_limited_for.is_some());

        // Admissions at t=1s age out at t=61s
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            statuses(&handle).await,
            vec![Succeeded, Succeeded, Running, Running, Queued]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_then_retry_readmits() {
        let executor = ManualExecutor::new();
        let config = SchedulerConfig {
            max_concurrent: 1,
            ..Default::default()
        };
        let (handle, _task) = Scheduler::spawn(config, executor.clone()).unwrap();

        let id = handle.enqueue(GenerationRequest::new("A")).await.unwrap();
        first_cycle().await;

        // Running items cannot be retried
        assert!(!handle.retry(id).await.unwrap());

        assert!(executor.fail("A", "quota exceeded"));
        settle().await;
        let item = handle.get(id).await.unwrap().unwrap();
        assert_eq!(item.status(), WorkStatus::Failed);
        assert_eq!(item.error(), Some("quota exceeded"));
        assert!(item.result().is_none());

        assert!(handle.retry(id).await.unwrap());
        let item = handle.get(id).await.unwrap().unwrap();
        assert_eq!(item.status(), WorkStatus::Queued);
        assert!(item.error().is_none());
        assert!(item.result().is_none());

        // Second retry is a no-op against a queued item
        assert!(!handle.retry(id).await.unwrap());

        next_cycle().await;
        let item = handle.get(id).await.unwrap().unwrap();
        assert_eq!(item.status(), WorkStatus::Running);
        assert_eq!(item.attempts, 2);

        assert!(executor.succeed("A"));
        settle().await;
        let item = handle.get(id).await.unwrap().unwrap();
        assert_eq!(item.status(), WorkStatus::Succeeded);
        assert!(item.error().is_none());
        assert!(!handle.retry(id).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_unknown_item() {
        let (handle, _task) = Scheduler::spawn(SchedulerConfig::default(), ManualExecutor::new()).unwrap();
        let result = handle.retry(WorkItemId::new()).await;
        assert!(matches!(result, Err(SchedulerError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_stops_when_all_terminal() {
        let executor = ManualExecutor::new();
        let (handle, _task) = Scheduler::spawn(SchedulerConfig::default(), executor.clone()).unwrap();
        let mut events = handle.subscribe().await.unwrap();

        handle.enqueue_batch(requests(&["A", "B"])).await.unwrap();
        assert!(handle.state().await.unwrap().cycle_active);

        first_cycle().await;
        assert!(executor.succeed("A"));
        assert!(executor.fail("B", "nope"));
        next_cycle().await;

        let state = handle.state().await.unwrap();
        assert!(!state.cycle_active);
        assert_eq!(state.succeeded, 1);
        assert_eq!(state.failed, 1);
        let cycles = state.stats.cycles;

        // No further scheduling side effects
        tokio::time::sleep(Duration::from_secs(10)).await;
        let later = handle.state().await.unwrap();
        assert_eq!(later.stats.cycles, cycles);
        assert_eq!(later.stats.total_admitted, 2);
        assert_eq!(later.admissions_in_window, 2);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.first(), Some(&SchedulerEvent::Enqueued { id: id_at(&handle, 0).await }));
        assert!(seen.contains(&SchedulerEvent::CycleStarted));
        assert_eq!(seen.last(), Some(&SchedulerEvent::CycleStopped));
    }

    async fn id_at(handle: &SchedulerHandle, index: usize) -> WorkItemId {
        handle.list_all().await.unwrap()[index].id
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_restarts_on_new_work() {
        let executor = ManualExecutor::new();
        let (handle, _task) = Scheduler::spawn(SchedulerConfig::default(), executor.clone()).unwrap();

        handle.enqueue(GenerationRequest::new("A")).await.unwrap();
        first_cycle().await;
        executor.succeed("A");
        next_cycle().await;
        assert!(!handle.state().await.unwrap().cycle_active);

        handle.enqueue(GenerationRequest::new("B")).await.unwrap();
        assert!(handle.state().await.unwrap().cycle_active);
        first_cycle().await;
        assert_eq!(executor.started(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limits_hold_at_every_observation() {
        let executor = ManualExecutor::new();
        let config = SchedulerConfig {
            max_concurrent: 3,
            rate_limit: 4,
            window_ms: 5_000,
            ..Default::default()
        };
        let (handle, _task) = Scheduler::spawn(config, executor.clone()).unwrap();
        let prompts: Vec<String> = (0..12).map(|i| format!("item-{}", i)).collect();
        let batch = prompts.iter().map(GenerationRequest::new).collect();
        handle.enqueue_batch(batch).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        for round in 0..40 {
            next_cycle().await;
            let state = handle.state().await.unwrap();
            assert!(state.running <= 3, "round {}: {} running", round, state.running);
            assert!(
                state.admissions_in_window <= 4,
                "round {}: {} admissions in window",
                round,
                state.admissions_in_window
            );
            if round % 2 == 1 {
                executor.succeed_all();
            }
        }

        let state = handle.wait_idle().await.unwrap();
        assert_eq!(state.succeeded, 12);
        // Insertion order is admission order
        assert_eq!(executor.started(), prompts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_change_only_when_nothing_running() {
        let executor = ManualExecutor::new();
        let (handle, _task) = Scheduler::spawn(SchedulerConfig::default(), executor.clone()).unwrap();

        assert!(matches!(
            handle.set_max_concurrent(0).await,
            Err(SchedulerError::Configuration(ConfigurationError::MaxConcurrent(0)))
        ));

        handle.enqueue(GenerationRequest::new("A")).await.unwrap();
        first_cycle().await;
        assert!(matches!(
            handle.set_max_concurrent(8).await,
            Err(SchedulerError::CapacityLocked { running: 1 })
        ));

        executor.succeed("A");
        settle().await;
        handle.set_max_concurrent(8).await.unwrap();
        assert_eq!(handle.state().await.unwrap().max_concurrent, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_never_enters_store() {
        let (handle, _task) = Scheduler::spawn(SchedulerConfig::default(), ManualExecutor::new()).unwrap();

        let result = handle.enqueue(GenerationRequest::new("  ")).await;
        assert!(matches!(result, Err(SchedulerError::Validation(_))));

        let result = handle.enqueue_batch(requests(&["fine", ""])).await;
        assert!(matches!(result, Err(SchedulerError::Validation(_))));

        let state = handle.state().await.unwrap();
        assert_eq!(state.total(), 0);
        assert!(!state.cycle_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let (handle, task) = Scheduler::spawn(SchedulerConfig::default(), ManualExecutor::new()).unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.state().await, Err(SchedulerError::ChannelClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_ends_when_handles_dropped() {
        let (handle, task) = Scheduler::spawn(SchedulerConfig::default(), ManualExecutor::new()).unwrap();
        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("task ends without shutdown")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_outlives_handles_until_runners_report() {
        let executor = ManualExecutor::new();
        let (handle, task) = Scheduler::spawn(SchedulerConfig::default(), executor.clone()).unwrap();
        handle.enqueue(GenerationRequest::new("A")).await.unwrap();
        first_cycle().await;
        assert_eq!(executor.started(), vec!["A"]);

        drop(handle);
        next_cycle().await;
        assert!(!task.is_finished());

        assert!(executor.succeed("A"));
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("task ends once the runner reports")
            .unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SchedulerConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(Scheduler::new(config, ManualExecutor::new()).is_err());
    }
}
