//! Periodic scheduler for one simulation
//!
//! A run moves the world and its subscribers onto a dedicated worker thread,
//! which is then the only writer of simulation state. Control commands reach
//! it over a channel; in real-time mode the wait on that channel doubles as
//! the tick timer. Stopping joins the worker and hands the world back, so the
//! last state can still be inspected.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendError, Sender, TryRecvError};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::subscriber::{SnapshotSubscriber, SubscriberList};
use crate::backend::BackendError;
use crate::simulation::{
    ConfigError, PerformanceMetrics, RunRequest, SimWorld, SimulationConfig, SimulationId,
    TrafficSnapshot,
};

const CONTROL_BUFFER: usize = 32;

/// Lifecycle of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Error,
}

impl RunStatus {
    /// Whether a worker is attached to the simulation
    pub fn is_active(self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused)
    }
}

/// Externally visible progress of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    pub simulation_id: SimulationId,
    pub status: RunStatus,
    /// Ticks completed in the current run
    pub current_time_step: u64,
    pub total_time_steps: u64,
    /// Percentage of the current run completed
    pub progress: f64,
    pub current_state: Option<TrafficSnapshot>,
    pub message: Option<String>,
}

enum Control {
    Stop,
    Pause,
    Resume,
    Subscribe(Box<dyn SnapshotSubscriber>),
}

/// State written by the worker once per tick
struct Published {
    status: RunStatus,
    steps_done: u64,
    total_steps: u64,
    latest: Option<TrafficSnapshot>,
    metrics: PerformanceMetrics,
    message: Option<String>,
}

type Shared = Arc<Mutex<Published>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Published> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Worker {
    control: Sender<Control>,
    handle: JoinHandle<(SimWorld, SubscriberList)>,
}

/// Drives one `SimWorld` on its own thread
pub struct SimulationRunner {
    id: SimulationId,
    config: Arc<SimulationConfig>,
    shared: Shared,
    idle: Option<(SimWorld, SubscriberList)>,
    worker: Option<Worker>,
}

impl SimulationRunner {
    /// Validate `config` and build an idle simulation
    pub fn new(id: SimulationId, config: SimulationConfig) -> Result<Self, ConfigError> {
        let world = SimWorld::new(config)?;
        let shared = Arc::new(Mutex::new(Published {
            status: RunStatus::Idle,
            steps_done: 0,
            total_steps: 0,
            latest: Some(world.snapshot()),
            metrics: world.metrics(),
            message: None,
        }));

        Ok(Self {
            id,
            config: world.shared_config(),
            shared,
            idle: Some((world, SubscriberList::new())),
            worker: None,
        })
    }

    pub fn id(&self) -> SimulationId {
        self.id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Begin ticking; continues from the current state
    pub fn start(&mut self, request: RunRequest) -> Result<(), BackendError> {
        self.reap();
        if self.worker.is_some() {
            return Err(BackendError::InvalidState(format!(
                "{} is already running",
                self.id
            )));
        }
        request.validate()?;

        let (world, subscribers) = self.idle.take().ok_or_else(|| {
            BackendError::Worker(format!("{} lost its state in an earlier failure", self.id))
        })?;

        {
            let mut published = lock(&self.shared);
            published.status = RunStatus::Running;
            published.steps_done = 0;
            published.total_steps = request.total_steps();
            published.message = None;
        }

        let (control_tx, control_rx) = bounded(CONTROL_BUFFER);
        let shared = Arc::clone(&self.shared);
        let id = self.id;
        let handle = thread::Builder::new()
            .name(id.to_string())
            .spawn(move || run_loop(id, world, subscribers, request, control_rx, shared))
            .map_err(|err| {
                let mut published = lock(&self.shared);
                published.status = RunStatus::Error;
                published.message = Some(format!("failed to spawn worker: {err}"));
                BackendError::Worker(err.to_string())
            })?;

        info!(
            "Started {} ({} ticks of {}ms, {})",
            self.id,
            request.total_steps(),
            request.time_step_millis,
            if request.real_time { "real-time" } else { "fast" }
        );

        self.worker = Some(Worker {
            control: control_tx,
            handle,
        });
        Ok(())
    }

    /// Cancel the timer and keep the last state
    pub fn stop(&mut self) -> Result<(), BackendError> {
        if let Some(worker) = self.worker.take() {
            // A send error means the worker already finished on its own.
            let _ = worker.control.send(Control::Stop);
            self.join(worker)?;
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), BackendError> {
        self.command(Control::Pause, RunStatus::Running, RunStatus::Paused)
    }

    pub fn resume(&mut self) -> Result<(), BackendError> {
        self.command(Control::Resume, RunStatus::Paused, RunStatus::Running)
    }

    fn command(
        &mut self,
        control: Control,
        from: RunStatus,
        to: RunStatus,
    ) -> Result<(), BackendError> {
        self.reap();
        let worker = self.worker.as_ref().ok_or_else(|| {
            BackendError::InvalidState(format!("{} is not running", self.id))
        })?;
        if worker.control.send(control).is_err() {
            return Err(BackendError::InvalidState(format!(
                "{} finished before the command arrived",
                self.id
            )));
        }
        let mut published = lock(&self.shared);
        if published.status == from {
            published.status = to;
        }
        Ok(())
    }

    /// Attach a subscriber, now or at the next tick if running
    pub fn subscribe(&mut self, subscriber: Box<dyn SnapshotSubscriber>) {
        self.reap();
        let rejected = match &self.worker {
            Some(worker) => match worker.control.send(Control::Subscribe(subscriber)) {
                Ok(()) => return,
                Err(SendError(control)) => control,
            },
            None => Control::Subscribe(subscriber),
        };
        // A rejected send means the worker dropped its receiver and is exiting.
        if let Some(worker) = self.worker.take() {
            if let Err(err) = self.join(worker) {
                warn!("{}", err);
            }
        }
        if let (Control::Subscribe(subscriber), Some((_, subscribers))) =
            (rejected, self.idle.as_mut())
        {
            subscribers.add(subscriber);
        }
    }

    /// Block until the current run ends on its own
    pub fn wait(&mut self) -> Result<RunStatus, BackendError> {
        if let Some(worker) = self.worker.take() {
            self.join(worker)?;
        }
        Ok(lock(&self.shared).status)
    }

    pub fn status(&mut self) -> SimulationStatus {
        self.reap();
        let published = lock(&self.shared);
        let progress = if published.total_steps > 0 {
            published.steps_done as f64 / published.total_steps as f64 * 100.0
        } else {
            0.0
        };
        SimulationStatus {
            simulation_id: self.id,
            status: published.status,
            current_time_step: published.steps_done,
            total_time_steps: published.total_steps,
            progress,
            current_state: published.latest.clone(),
            message: published.message.clone(),
        }
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        lock(&self.shared).metrics
    }

    pub fn latest_snapshot(&self) -> Option<TrafficSnapshot> {
        lock(&self.shared).latest.clone()
    }

    /// The world, when no worker holds it
    pub fn world(&self) -> Option<&SimWorld> {
        self.idle.as_ref().map(|(world, _)| world)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Collect a worker that finished by itself
    fn reap(&mut self) {
        let finished = self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.handle.is_finished());
        if finished {
            if let Some(worker) = self.worker.take() {
                if let Err(err) = self.join(worker) {
                    warn!("{}", err);
                }
            }
        }
    }

    fn join(&mut self, worker: Worker) -> Result<(), BackendError> {
        match worker.handle.join() {
            Ok(state) => {
                self.idle = Some(state);
                Ok(())
            }
            Err(_) => {
                let mut published = lock(&self.shared);
                published.status = RunStatus::Error;
                published.message = Some("simulation worker panicked".to_string());
                Err(BackendError::Worker(format!("{} worker panicked", self.id)))
            }
        }
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("{}", err);
        }
    }
}

fn set_status(shared: &Shared, status: RunStatus) {
    lock(shared).status = status;
}

fn run_loop(
    id: SimulationId,
    mut world: SimWorld,
    mut subscribers: SubscriberList,
    request: RunRequest,
    control: Receiver<Control>,
    shared: Shared,
) -> (SimWorld, SubscriberList) {
    let total_steps = request.total_steps();
    let step = Duration::from_millis(request.time_step_millis);
    let step_seconds = request.step_seconds();
    let start_time = world.time();

    let mut deadline = Instant::now() + step;
    let mut paused = false;
    let mut stopped = false;
    let mut done: u64 = 0;

    while done < total_steps {
        let command = if paused {
            match control.recv() {
                Ok(command) => Some(command),
                Err(_) => {
                    stopped = true;
                    break;
                }
            }
        } else if request.real_time {
            match control.recv_deadline(deadline) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    stopped = true;
                    break;
                }
            }
        } else {
            match control.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    stopped = true;
                    break;
                }
            }
        };

        if let Some(command) = command {
            match command {
                Control::Stop => {
                    stopped = true;
                    break;
                }
                Control::Pause => {
                    paused = true;
                    set_status(&shared, RunStatus::Paused);
                    debug!("{} paused at step {}", id, done);
                }
                Control::Resume => {
                    if paused {
                        paused = false;
                        deadline = Instant::now() + step;
                        set_status(&shared, RunStatus::Running);
                        debug!("{} resumed at step {}", id, done);
                    }
                }
                Control::Subscribe(subscriber) => subscribers.add(subscriber),
            }
            continue;
        }

        done += 1;
        let now = start_time + done as f64 * step_seconds;
        let snapshot = world.tick(now);

        {
            let mut published = lock(&shared);
            published.steps_done = done;
            published.latest = Some(snapshot.clone());
            published.metrics = world.metrics();
        }
        subscribers.broadcast(&snapshot);

        if request.real_time {
            deadline += step;
            let current = Instant::now();
            if deadline < current {
                trace!("{} scheduler overrun at step {}", id, done);
                deadline = current;
            }
        }
    }

    let mut published = lock(&shared);
    if stopped {
        published.status = RunStatus::Idle;
        published.message = Some(format!("stopped after {done} of {total_steps} steps"));
        info!("Stopped {} after {} of {} steps", id, done, total_steps);
    } else {
        published.status = RunStatus::Completed;
        published.message = Some(format!("completed {total_steps} steps"));
        info!("Completed {} ({} steps)", id, total_steps);
    }
    drop(published);

    (world, subscribers)
}
