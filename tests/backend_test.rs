//! Local, remote and failover backends

use serde_json::json;
use signal_sim::backend::{
    select_backend, BackendConfig, BackendError, BackendKind, FailoverBackend,
    LocalSimulationBackend, ReconnectPolicy, RemoteBackend, RemoteRequest, RemoteResponse,
    RemoteTransport, SimulationBackend,
};
use signal_sim::runtime::{RunStatus, SimulationStatus, SnapshotSubscriber};
use signal_sim::simulation::{
    PerformanceMetrics, RunRequest, Scenario, SimulationConfig, SimulationId, TrafficSnapshot,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn seeded_config() -> SimulationConfig {
    SimulationConfig::from_scenario(Scenario::Balanced).with_seed(17)
}

fn fast_request() -> RunRequest {
    RunRequest::new(5, 100, false)
}

fn quick_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts,
        interval: Duration::from_millis(1),
    }
}

/// Scripted remote service shared with the test through `Arc`s
#[derive(Clone, Default)]
struct FakeTransport {
    requests: Arc<Mutex<Vec<RemoteRequest>>>,
    down: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    connect_attempts: Arc<AtomicUsize>,
    /// Connection attempts that fail before one succeeds
    failing_connects: usize,
}

impl FakeTransport {
    fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl RemoteTransport for FakeTransport {
    fn connect(&mut self) -> Result<(), BackendError> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.down.load(Ordering::SeqCst) || attempt <= self.failing_connects {
            return Err(BackendError::Connection("connection refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn call(&mut self, request: RemoteRequest) -> Result<RemoteResponse, BackendError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection reset".to_string()));
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(match request {
            RemoteRequest::Create { .. } => RemoteResponse::Created { id: SimulationId(7) },
            RemoteRequest::Status { id } => RemoteResponse::Status {
                status: SimulationStatus {
                    simulation_id: id,
                    status: RunStatus::Running,
                    current_time_step: 3,
                    total_time_steps: 50,
                    progress: 6.0,
                    current_state: None,
                    message: None,
                },
            },
            RemoteRequest::Metrics { .. } => RemoteResponse::Metrics {
                metrics: PerformanceMetrics::default(),
            },
            _ => RemoteResponse::Ack,
        })
    }

    fn subscribe(
        &mut self,
        _id: SimulationId,
        _subscriber: Box<dyn SnapshotSubscriber>,
    ) -> Result<(), BackendError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection reset".to_string()));
        }
        Ok(())
    }
}

#[test]
fn test_local_backend_lifecycle() {
    let mut backend = LocalSimulationBackend::new();
    let first = backend.create_simulation(seeded_config()).unwrap();
    let second = backend.create_simulation(seeded_config()).unwrap();
    assert_eq!(first, SimulationId(1));
    assert_eq!(second, SimulationId(2));
    assert_eq!(backend.ids(), vec![first, second]);

    assert_eq!(backend.status(first).unwrap().status, RunStatus::Idle);
    backend.start(first, fast_request()).unwrap();
    let status = backend.wait(first).unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(backend.metrics(first).unwrap().total_time_steps, 50);

    // The second simulation is independent of the first
    assert_eq!(backend.metrics(second).unwrap().total_time_steps, 0);

    backend.delete_simulation(first).unwrap();
    assert_eq!(backend.status(first), Err(BackendError::NotFound(first)));
    assert_eq!(backend.ids(), vec![second]);
}

#[test]
fn test_local_backend_rejects_invalid_config() {
    let mut backend = LocalSimulationBackend::new();
    let mut config = seeded_config();
    config.max_green_time = 500.0;
    assert!(matches!(
        backend.create_simulation(config),
        Err(BackendError::Config(_))
    ));
    assert!(backend.ids().is_empty());
}

#[test]
fn test_local_backend_unknown_id() {
    let mut backend = LocalSimulationBackend::new();
    let id = SimulationId(42);
    assert_eq!(backend.start(id, fast_request()), Err(BackendError::NotFound(id)));
    assert_eq!(backend.pause(id), Err(BackendError::NotFound(id)));
    assert_eq!(backend.delete_simulation(id), Err(BackendError::NotFound(id)));
}

#[test]
fn test_remote_backend_forwards_requests() {
    let transport = FakeTransport::default();
    let mut backend = RemoteBackend::new(Box::new(transport.clone()), quick_policy(3));

    let id = backend.create_simulation(seeded_config()).unwrap();
    assert_eq!(id, SimulationId(7));
    backend.start(id, fast_request()).unwrap();
    assert_eq!(backend.status(id).unwrap().current_time_step, 3);
    assert_eq!(backend.metrics(id).unwrap(), PerformanceMetrics::default());
    backend.stop(id).unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);
    assert!(matches!(requests[0], RemoteRequest::Create { .. }));
    assert_eq!(
        requests[1],
        RemoteRequest::Start {
            id,
            request: fast_request()
        }
    );
    assert_eq!(requests[4], RemoteRequest::Stop { id });
}

#[test]
fn test_remote_backend_validates_before_sending() {
    let transport = FakeTransport::default();
    let mut backend = RemoteBackend::new(Box::new(transport.clone()), quick_policy(3));

    let mut config = seeded_config();
    config.min_green_time = 1.0;
    assert!(matches!(
        backend.create_simulation(config),
        Err(BackendError::Config(_))
    ));
    assert!(backend.start(SimulationId(7), RunRequest::new(10, 20, true)).is_err());
    assert!(transport.requests().is_empty());
}

#[test]
fn test_remote_backend_reconnects() {
    let transport = FakeTransport {
        failing_connects: 2,
        ..FakeTransport::default()
    };
    let mut backend = RemoteBackend::new(Box::new(transport.clone()), quick_policy(5));

    backend.pause(SimulationId(7)).unwrap();
    assert_eq!(transport.connect_attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn test_remote_backend_gives_up_after_max_attempts() {
    let transport = FakeTransport::default();
    transport.go_down();
    let mut backend = RemoteBackend::new(Box::new(transport.clone()), quick_policy(4));

    let err = backend.status(SimulationId(7)).unwrap_err();
    assert!(err.is_connection());
    assert!(err.to_string().contains("max reconnection attempts"));
    assert_eq!(transport.connect_attempts.load(Ordering::SeqCst), 4);
}

#[test]
fn test_failover_recreates_simulation_locally() {
    let transport = FakeTransport::default();
    let remote = RemoteBackend::new(Box::new(transport.clone()), quick_policy(2));
    let mut backend = FailoverBackend::new(remote);

    let id = backend.create_simulation(seeded_config()).unwrap();
    assert_eq!(id, SimulationId(7));
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    backend
        .subscribe(
            id,
            Box::new(move |_: &TrafficSnapshot| -> anyhow::Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();
    assert!(!backend.is_degraded());
    assert_eq!(backend.name(), "remote");

    transport.go_down();
    backend.start(id, fast_request()).unwrap();
    assert!(backend.is_degraded());
    assert_eq!(backend.name(), "local (fallback)");

    let status = backend.fallback().wait(id).unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(delivered.load(Ordering::SeqCst), 50);

    // New simulations do not reuse the adopted id
    let next = backend.create_simulation(seeded_config()).unwrap();
    assert_eq!(next, SimulationId(8));
}

#[test]
fn test_failover_passes_through_remote_errors() {
    let transport = FakeTransport::default();
    let remote = RemoteBackend::new(Box::new(transport), quick_policy(2));
    let mut backend = FailoverBackend::new(remote);

    let mut config = seeded_config();
    config.yellow_time = 0.0;
    assert!(matches!(
        backend.create_simulation(config),
        Err(BackendError::Config(_))
    ));
    assert!(!backend.is_degraded());
}

#[test]
fn test_select_backend() {
    let local = select_backend(&BackendConfig::default(), None);
    assert_eq!(local.name(), "local");

    let config = BackendConfig {
        kind: BackendKind::Remote,
        ..BackendConfig::default()
    };
    assert_eq!(select_backend(&config, None).name(), "local");
    let remote = select_backend(&config, Some(Box::new(FakeTransport::default())));
    assert_eq!(remote.name(), "remote");
}

#[test]
fn test_remote_request_json() {
    let stop = serde_json::to_value(RemoteRequest::Stop { id: SimulationId(3) }).unwrap();
    assert_eq!(stop, json!({ "op": "stop", "id": 3 }));

    let start = serde_json::to_value(RemoteRequest::Start {
        id: SimulationId(3),
        request: RunRequest::new(60, 500, true),
    })
    .unwrap();
    assert_eq!(start["op"], "start");
    assert_eq!(
        start["request"],
        json!({ "durationSeconds": 60, "timeStepMillis": 500, "realTime": true })
    );

    let ack: RemoteResponse = serde_json::from_value(json!({ "kind": "ack" })).unwrap();
    assert_eq!(ack, RemoteResponse::Ack);
}
