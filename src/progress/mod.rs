pub mod marker;
pub mod store;

pub use marker::{AwaitingMarker, MarkerDir};
pub use store::{ProgressState, ProgressStore};
