use crate::config::VpnConfig;
use crate::state::VpnState;
use crate::vpn::{CommandReconnector, Reconnector, VpnError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Shared network identity with a background rotation task
///
/// The rotation task is the only writer of `Ready` and `Terminated`;
/// [`VpnRotator::trip`] is the only way into `Rotating`.
pub struct VpnRotator {
    state: Arc<watch::Sender<VpnState>>,
    signal: Option<mpsc::UnboundedSender<()>>,
    trips: AtomicU32,
    task: Option<JoinHandle<()>>,
}

impl VpnRotator {
    /// A rotator that never rotates and is always ready
    pub fn disabled() -> Self {
        let (state, _) = watch::channel(VpnState::Ready);
        Self {
            state: Arc::new(state),
            signal: None,
            trips: AtomicU32::new(0),
            task: None,
        }
    }

    /// Builds the rotator described by `config`
    ///
    /// Must be called from within a tokio runtime when VPN rotation is enabled.
    pub fn from_config(config: &VpnConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        Self::spawn(Arc::new(CommandReconnector::from_config(config)), config)
    }

    /// Starts the rotation task on the current runtime
    pub fn spawn(reconnector: Arc<dyn Reconnector>, config: &VpnConfig) -> Self {
        let (state, _) = watch::channel(VpnState::Ready);
        let state = Arc::new(state);
        let (signal, requests) = mpsc::unbounded_channel();
        let timeout = Duration::from_secs(config.timeout_secs);

        let task = RotationTask {
            state: Arc::clone(&state),
            reconnector,
            servers: config.servers.clone(),
            next_server: 0,
            remaining: config.max_rotations,
            timeout,
        };

        tracing::info!(
            "VPN rotation enabled with {} rotations available",
            config.max_rotations
        );

        Self {
            state,
            signal: Some(signal),
            trips: AtomicU32::new(0),
            task: Some(tokio::spawn(task.run(requests))),
        }
    }

    pub fn state(&self) -> VpnState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == VpnState::Terminated
    }

    /// Number of trips received, including those that started no rotation
    pub fn trips(&self) -> u32 {
        self.trips.load(Ordering::Relaxed)
    }

    /// Requests a rotation
    ///
    /// Returns true if this call moved the rotator from `Ready` to `Rotating`.
    /// Trips while rotating or terminated are counted and otherwise ignored.
    pub fn trip(&self) -> bool {
        self.trips.fetch_add(1, Ordering::Relaxed);

        let Some(signal) = &self.signal else {
            tracing::debug!("VPN disabled, ignoring trip");
            return false;
        };

        let started = self.state.send_if_modified(|state| {
            if *state == VpnState::Ready {
                *state = VpnState::Rotating;
                true
            } else {
                false
            }
        });

        if started {
            tracing::info!("VPN tripped, rotating egress");
            if signal.send(()).is_err() {
                tracing::error!("VPN rotation task is gone");
                self.state.send_replace(VpnState::Terminated);
            }
        }

        started
    }

    /// Waits for a rotation in progress to settle
    ///
    /// Returns true once ready and false once terminated. Every reconnect
    /// attempt is bounded by the configured timeout and consumes budget, so a
    /// rotation always settles.
    pub async fn wait(&self) -> bool {
        let mut receiver = self.state.subscribe();
        let settled = match receiver.wait_for(|state| *state != VpnState::Rotating).await {
            Ok(state) => *state == VpnState::Ready,
            Err(_) => {
                tracing::error!("VPN rotation task is gone");
                false
            }
        };
        settled
    }

    /// Stops the rotation task, waiting for a rotation in progress
    pub async fn shutdown(mut self) {
        self.signal = None;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("VPN rotation task ended abnormally: {}", e);
            }
        }
    }
}

struct RotationTask {
    state: Arc<watch::Sender<VpnState>>,
    reconnector: Arc<dyn Reconnector>,
    servers: Vec<String>,
    next_server: usize,
    remaining: u32,
    timeout: Duration,
}

impl RotationTask {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<()>) {
        while requests.recv().await.is_some() {
            let next = self.rotate().await;
            self.state.send_replace(next);

            if next == VpnState::Terminated {
                break;
            }
        }
    }

    async fn rotate(&mut self) -> VpnState {
        while self.remaining > 0 {
            self.remaining -= 1;

            let server = self.pick_server();
            match tokio::time::timeout(self.timeout, self.reconnect(server.as_deref())).await {
                Ok(Ok(())) => {
                    tracing::info!(
                        "VPN reconnected{} ({} rotations left)",
                        server
                            .as_deref()
                            .map(|s| format!(" to {}", s))
                            .unwrap_or_default(),
                        self.remaining
                    );
                    return VpnState::Ready;
                }
                Ok(Err(e)) => tracing::warn!("VPN reconnect failed: {}", e),
                Err(_) => tracing::warn!("{}", VpnError::Timeout(self.timeout)),
            }
        }

        tracing::error!("VPN rotation budget exhausted");
        VpnState::Terminated
    }

    async fn reconnect(&self, server: Option<&str>) -> Result<(), VpnError> {
        if let Err(e) = self.reconnector.disconnect().await {
            tracing::debug!("VPN disconnect failed, connecting anyway: {}", e);
        }
        self.reconnector.connect(server).await
    }

    fn pick_server(&mut self) -> Option<String> {
        if self.servers.is_empty() {
            return None;
        }

        let server = self.servers[self.next_server % self.servers.len()].clone();
        self.next_server += 1;
        Some(server)
    }
}

impl Drop for RotationTask {
    fn drop(&mut self) {
        // a task that dies mid-rotation must not leave waiters hanging
        self.state.send_if_modified(|state| {
            if *state == VpnState::Rotating {
                *state = VpnState::Terminated;
                true
            } else {
                false
            }
        });
    }
}
