//! Core types for the Commodore drive emulation.
//!
//! Time is counted in ticks of the 16 MHz drive crystal. Nothing runs on
//! its own: periodic work is armed on a [`Scheduler`] and dispatched by the
//! machine that owns it.

mod bus;
mod clock;
mod observable;
mod port;
mod scheduler;
mod ticks;

pub use bus::Bus;
pub use clock::MasterClock;
pub use observable::{Observable, Value};
pub use port::ParallelPort;
pub use scheduler::{CancelToken, Scheduler};
pub use ticks::Ticks;
