//! Virtual machine for quest script bytecode.
//!
//! The VM runs cooperative threads round-robin. A thread only gives up the
//! VM at `sync` or when it terminates, and [`VirtualMachine::execute`] returns
//! once every thread has yielded, all threads are gone, an interceptor pauses
//! execution, or the VM halts.

mod config;
mod dispatch;
mod error;
mod interceptor;
mod io;
mod machine;
mod random;
mod registers;
mod thread;

pub use config::*;
pub use error::*;
pub use interceptor::*;
pub use io::*;
pub use machine::*;
pub use random::*;
pub use registers::*;
pub use thread::*;
