pub mod display;
pub mod loop_controller;
pub mod player;
pub mod session;
pub mod simulated;
pub mod timer;

#[cfg(test)]
mod session_test;

pub use display::*;
pub use loop_controller::*;
pub use player::*;
pub use session::*;
pub use simulated::*;
pub use timer::*;
