//! Session state for pagewright.
//!
//! A [`Session`] holds one generation conversation and is changed only
//! through a reset-fenced [`SessionWriter`]; the [`SessionStore`] keeps
//! every live session and optionally persists snapshots as JSON.

pub mod session;
pub mod store;

pub use session::{Session, SessionSnapshot, SessionWriter, StreamGuard};
pub use store::SessionStore;
