use parking_lot::Mutex;

use crate::error::LifecycleError;

/// The four shapes a stage can take in a linear pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Producer,
    Transform,
    FanOut,
    Consumer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Detached,
    Ready,
    Running,
    Stopping,
    Stopped,
}

pub(crate) struct StateCell {
    state: Mutex<StageState>,
    name: String,
}

impl StateCell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(StageState::Detached),
            name: name.into(),
        }
    }

    pub fn get(&self) -> StageState {
        *self.state.lock()
    }

    pub fn started(&self) -> bool {
        matches!(self.get(), StageState::Running)
    }

    /// Called once a queue attaches. Idempotent across Detached and Ready
    /// so attaching an input then an output (in either order) both land in
    /// `Ready`, but rejects attaching once a stage has started.
    pub fn mark_ready(&self) -> Result<(), LifecycleError> {
        let mut guard = self.state.lock();
        match *guard {
            StageState::Detached | StageState::Ready => {
                *guard = StageState::Ready;
                Ok(())
            }
            StageState::Running => Err(LifecycleError::AlreadyStarted(self.name.clone())),
            StageState::Stopping | StageState::Stopped => Err(LifecycleError::AlreadyStopped(self.name.clone())),
        }
    }

    /// `Ok(true)` if this call should actually spawn worker loops (the
    /// first transition into `Running`); `Ok(false)` if the stage is
    /// already running and this is a harmless repeat call.
    pub fn begin_start(&self) -> Result<bool, LifecycleError> {
        let mut guard = self.state.lock();
        match *guard {
            StageState::Ready => {
                *guard = StageState::Running;
                Ok(true)
            }
            StageState::Running => Ok(false),
            StageState::Detached => Err(LifecycleError::NotReady(self.name.clone())),
            StageState::Stopping | StageState::Stopped => Err(LifecycleError::AlreadyStopped(self.name.clone())),
        }
    }

    /// `true` if this call should actually cancel and join worker
    /// handles.
    pub fn begin_stop(&self) -> bool {
        let mut guard = self.state.lock();
        match *guard {
            StageState::Running => {
                *guard = StageState::Stopping;
                true
            }
            StageState::Detached | StageState::Ready => {
                *guard = StageState::Stopped;
                false
            }
            StageState::Stopping | StageState::Stopped => false,
        }
    }

    pub fn finish_stop(&self) {
        *self.state.lock() = StageState::Stopped;
    }
}
