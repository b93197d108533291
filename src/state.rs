//! Shared handler state

use std::sync::Arc;

use crate::device::DeviceSynchronizer;
use crate::dispatch::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub device: Arc<DeviceSynchronizer>,
}
