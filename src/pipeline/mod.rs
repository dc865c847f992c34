//! The send and receive pipelines: the fixed sequence of steps every [`crate::message::Message`]
//! passes through on its way to or from the wire.

mod receive;
mod send;

pub use receive::{NullReceiver, Receiver, ReceivePipeline};
pub use send::SendPipeline;
