pub mod controller;

use serde::{Deserialize, Serialize};

pub use controller::{LifecycleFlushController, LifecycleSender};

/// Ways the reader view can stop being visible or alive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleSignal {
    /// The window or tab went to the background.
    Hidden,
    /// Back in the foreground. Informational only.
    Visible,
    /// The host is about to exit.
    Unloading,
    /// The owning view is being torn down.
    Deactivated,
}
