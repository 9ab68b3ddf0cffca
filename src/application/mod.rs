//! Application layer: form instances, the concrete forms and terminal state.
//!
//! This module coordinates between the domain state machines and the
//! presentation layer, and moves remote calls off the event loop.

pub mod flow;
pub mod forms;
pub mod jobs;
pub mod state;

pub use flow::*;
pub use forms::*;
pub use jobs::*;
pub use state::*;
