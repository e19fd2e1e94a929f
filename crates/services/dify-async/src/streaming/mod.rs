//! Streaming support for `/chat-messages`.
//!
//! Data flows one way: raw bytes are framed into lines by [`FrameBuffer`],
//! lines are classified by [`decode`], events are folded by
//! [`TurnAccumulator`], and [`StreamSession`] drives the loop for one turn.

/// Turn accumulator
pub mod accumulator;
/// Event decoder
pub mod decode;
/// Incremental event stream
pub mod events;
/// Line framing
pub mod frame;
/// Per-turn session state machine
pub mod session;

pub use accumulator::TurnAccumulator;
pub use decode::{Decoded, SkipReason, StreamEvent, decode};
pub use events::{EventStream, event_stream, event_stream_from_response};
pub use frame::FrameBuffer;
pub use session::{SessionState, StreamSession};
