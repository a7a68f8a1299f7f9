//! ABOUTME: Built-in `Operation` implementations (§4.2): delegate, action, conditional, for-each,
//! ABOUTME: delay, logging, plus the parallel fan-out composite from §4.5.

pub mod action;
pub mod conditional;
pub mod delay;
pub mod delegate;
pub mod foreach;
pub mod logging;
pub mod parallel;
mod support;

pub use action::ActionOperation;
pub use conditional::ConditionalOperation;
pub use delay::DelayOperation;
pub use delegate::DelegateOperation;
pub use foreach::{ForEachMode, ForEachOperation};
pub use logging::LoggingOperation;
pub use parallel::{ParallelInputMode, ParallelOperation};
