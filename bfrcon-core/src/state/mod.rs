pub mod connection;
mod dispatch;

pub use connection::ConnectionPhase;
pub use dispatch::{DispatchState, ReplySender, Resolved, TrackedRequest};
