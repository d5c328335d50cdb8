//! # converge-events
//!
//! Blocking waits over the remote event log.
//!
//! [`PollCondition`] is the single poll loop every waiter composes;
//! [`EventWaiter`] uses it with an [`EventLedger`] to wait for the next new
//! event of an entity and then for that event to reach a terminal status.

pub mod ledger;
pub mod poll;
pub mod waiter;

pub use ledger::EventLedger;
pub use poll::PollCondition;
pub use waiter::{EventWaiter, TerminalOutcome, WaitIntervals};
