//! Application state for the API server

use crate::{Config, TaskTracker};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; both fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    /// The task engine
    pub tracker: Arc<TaskTracker>,

    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(tracker: Arc<TaskTracker>, config: Arc<Config>) -> Self {
        Self { tracker, config }
    }
}
