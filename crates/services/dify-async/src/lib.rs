#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]

//! # `dify-async`
//!
//! Async client for the Dify chat API. Answers arrive as a chunked,
//! `data:`-framed event stream; this crate reassembles the frames, decodes the
//! events, and folds them into one [`ChatResult`] per turn.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dify_async::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new();
//!
//! let first = client.chat("Tổng chi tiêu tháng này?", "42", None).await?;
//! let follow_up = client
//!     .chat("Còn tháng trước?", "42", Some(first.conversation_id.as_str()))
//!     .await?;
//! println!("{}", follow_up.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Authentication
//!
//! Requests carry `Authorization: Bearer <DIFY_API_KEY>`.
//! See [`DifyConfig`] for configuration options.
//!
//! ## Cancellation
//!
//! [`ChatMessages::create_with_cancel`](resources::ChatMessages::create_with_cancel)
//! takes a [`CancellationToken`](tokio_util::sync::CancellationToken); a
//! per-turn deadline can be set with [`DifyConfig::with_turn_timeout`].

/// HTTP client implementation
pub mod client;
/// Configuration types for the client
pub mod config;
/// Multi-turn conversation helper
pub mod conversation;
/// Error types
pub mod error;
/// API resource implementations
pub mod resources;
/// Retry logic utilities
pub mod retry;
/// Line framing, event decoding, and per-turn sessions
pub mod streaming;
/// Test support utilities (for use in tests)
#[doc(hidden)]
pub mod test_support;
/// Request and response types
pub mod types;

pub use crate::client::Client;
pub use crate::config::DifyConfig;
pub use crate::conversation::Conversation;
pub use crate::error::{ApiErrorObject, CancelReason, DifyError, StreamErrorEvent};
pub use crate::types::{ChatRequest, ChatResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::streaming::{StreamEvent, TurnAccumulator};
    pub use crate::types::*;
    pub use crate::{Client, Conversation, DifyConfig, DifyError};
}
