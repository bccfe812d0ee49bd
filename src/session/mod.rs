//! Per-identity conversation sessions.
//!
//! Each identity (a student name, or `系統` for system-level requests) owns
//! exactly one [`Session`] holding its transcript. Sessions are created lazily
//! and live until cleared or evicted.
//!
//! # Example
//!
//! ```rust
//! use tutor_agent::session::{SessionStore, TurnRole};
//!
//! let store = SessionStore::new();
//! let handle = store.get_or_create("張小明", || "system prompt".to_string());
//! let mut session = handle.try_lock().unwrap();
//! session.commit_exchange("我的作業?", "你有兩份作業。");
//! assert_eq!(session.count(TurnRole::User), 1);
//! ```

mod thread;

pub use thread::{Session, SessionHandle, SessionStore, Turn, TurnRole};
