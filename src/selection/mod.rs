pub mod controller;
pub mod state;

pub use controller::{SelectionController, SelectionUpdate};
pub use state::{Selection, SelectionChange};
