//! Types stored in the browser session.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
