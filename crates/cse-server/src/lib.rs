//! CXL 2.0 switch emulator server.
//!
//! The pieces compose front to back: [`transport`] moves MCTP-framed
//! messages between a TCP socket and the in-process queues, [`dispatch`]
//! pulls requests off the inbound queue and routes them by message family,
//! and [`handlers`] / [`emapi`] implement one function per opcode against
//! the shared [`cse_switch::CxlSwitch`] model. [`config`] builds the initial
//! model from a YAML document.

pub mod config;
pub mod dispatch;
pub mod emapi;
pub mod handlers;
pub mod transport;

pub use dispatch::Dispatcher;
pub use transport::{CompletionAction, RequestAction, ResponseAction, TransportQueues};
