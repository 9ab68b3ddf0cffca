pub mod models;
pub mod errors;
pub mod fields;
pub mod branch;
pub mod clock;
pub mod contract;
pub mod otp;
pub mod progress;
pub mod sequencer;
pub mod submission;

pub use models::*;
pub use errors::*;
pub use fields::*;
pub use branch::*;
pub use clock::*;
pub use contract::*;
pub use otp::*;
pub use progress::*;
pub use sequencer::*;
pub use submission::*;
