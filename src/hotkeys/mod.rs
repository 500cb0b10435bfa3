pub mod events;
pub mod trigger;


pub use events::*;
pub use trigger::*;
