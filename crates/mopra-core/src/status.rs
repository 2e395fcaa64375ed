//! The status badge: the single indicator of what the client is doing.

use std::time::Duration;

use tokio::task::JoinHandle;

/// How long a transient success status stays up before reverting to Ready
pub const STATUS_RESET_DELAY: Duration = Duration::from_secs(2);

/// Color family of a status, independent of any rendering toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Danger,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Processing,
    Error,
    Stopping,
    Stopped,
    StopFailed,
    Optimizing,
    Optimized,
    OptimizationFailed,
    LoadingModel,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Ready => "Ready",
            Status::Processing => "Processing",
            Status::Error => "Error",
            Status::Stopping => "Stopping...",
            Status::Stopped => "Stopped",
            Status::StopFailed => "Stop Failed",
            Status::Optimizing => "Optimizing RAM...",
            Status::Optimized => "RAM Optimized",
            Status::OptimizationFailed => "Optimization Failed",
            Status::LoadingModel => "Loading Model...",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Status::Ready | Status::Optimized => Tone::Success,
            Status::Processing | Status::Stopping | Status::Optimizing | Status::LoadingModel => {
                Tone::Warning
            }
            Status::Error | Status::StopFailed | Status::OptimizationFailed => Tone::Danger,
            Status::Stopped => Tone::Secondary,
        }
    }
}

/// Current status plus at most one scheduled revert to Ready.
///
/// Every transition bumps `generation` and aborts the pending revert, so a
/// revert only ever lands on the status that scheduled it.
#[derive(Debug)]
pub struct StatusBadge {
    status: Status,
    generation: u64,
    reset: Option<JoinHandle<()>>,
}

impl Default for StatusBadge {
    fn default() -> Self {
        Self {
            status: Status::Ready,
            generation: 0,
            reset: None,
        }
    }
}

impl StatusBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending_reset(&self) -> bool {
        self.reset.is_some()
    }

    pub fn set(&mut self, status: Status) {
        if let Some(handle) = self.reset.take() {
            handle.abort();
        }
        self.generation += 1;
        self.status = status;
    }

    /// Set `status` and schedule `notify(generation)` after `after`.
    ///
    /// The owner feeds that generation back through [`StatusBadge::apply_reset`]
    /// on its own thread. Must be called from within a tokio runtime.
    pub fn set_with_reset<F>(&mut self, status: Status, after: Duration, notify: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.set(status);
        let generation = self.generation;
        self.reset = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            notify(generation);
        }));
    }

    /// Revert to Ready if nothing has changed since the reset was scheduled.
    /// Returns whether the revert was applied.
    pub fn apply_reset(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.reset = None;
        self.set(Status::Ready);
        true
    }
}

impl Drop for StatusBadge {
    fn drop(&mut self) {
        if let Some(handle) = self.reset.take() {
            handle.abort();
        }
    }
}
