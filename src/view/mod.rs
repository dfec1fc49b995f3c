pub mod state;

pub use state::{clamp_page, ViewState};
