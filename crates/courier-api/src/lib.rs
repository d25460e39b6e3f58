//! Request handlers for users, messages and gateway connections.
//!
//! Every handler takes an [`ApiRequest`] (or a [`ConnectionEvent`]) and
//! returns exactly one [`ApiResponse`] envelope. Handlers never call each
//! other; they share only the process-wide [`AppState`].
//!
//! [`ConnectionEvent`]: courier_types::events::ConnectionEvent

pub mod connections;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod request;
pub mod response;
pub mod state;
pub mod users;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ErrorCode, HandlerError, Rejection};
pub use request::ApiRequest;
pub use response::ApiResponse;
pub use state::{AppState, AppStateInner, PushAddressing, Tables};
