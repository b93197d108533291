//! TV integration module
//!
//! - `client`: Device capability (connect, pair, inputs)
//! - `webos`: webOS SSAP implementation of the client
//! - `pairing`: Persisted pairing credential
//! - `profile`: Monitor profile switcher
//! - `sync`: Session owner and switch state machine

pub mod client;
pub mod pairing;
pub mod profile;
pub mod sync;
pub mod webos;

pub use pairing::PairingStore;
pub use profile::MonitorSwitcher;
pub use sync::{DeviceSynchronizer, SyncError, SyncSettings};
pub use webos::{WebOsClient, WebOsOptions};
