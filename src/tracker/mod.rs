pub mod controller;
pub mod state;

pub use controller::PositionTracker;
pub use state::{FlushOutcome, PositionState};
