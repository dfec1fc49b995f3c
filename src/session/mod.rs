pub mod controller;
pub mod identity;

pub use controller::{DeactivationReport, ReaderSession};
pub use identity::generate_session_id;
