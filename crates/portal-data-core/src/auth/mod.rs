//! Session state consulted by the data layer.
//!
//! The server's `/api/me` payload tells us who is signed in and what they may
//! see. Only permission checks live here; the cache and dispatcher never look
//! at the session.

pub mod session;

pub use session::{SessionData, ADMIN_ACCESS};
