//! Reward accounting engine for staking farm pools
//! No I/O, no clock access: every operation receives `now` explicitly

pub mod error;
pub mod state;
pub mod math;
pub mod schedule;
pub mod vesting;
pub mod ledger;
pub mod account;
pub mod events;
pub mod replay;
pub mod command;
pub mod pool;
pub mod helpers;

// Re-export commonly used types
pub use error::*;
pub use state::*;
pub use schedule::*;
pub use vesting::*;
pub use events::*;
pub use command::*;
pub use pool::*;
