pub mod config;
pub mod cue;
pub mod cue_watcher;
pub mod error;
pub mod marker;
pub mod matcher;
pub mod recorder;
pub mod store;


pub use config::*;
pub use cue::*;
pub use cue_watcher::*;
pub use error::*;
pub use marker::*;
pub use matcher::*;
pub use recorder::*;
pub use store::*;
