//! Duplicate call suppression.
//!
//! When many callers ask for work identified by the same key at the same
//! time, one of them (the leader) runs it and the rest (followers) wait and
//! receive a clone of the leader's result, value or error. Nothing is kept
//! once the leader lands: the next call for that key runs the work again.
//!
//! ```
//! use singleflight::Group;
//!
//! let group: Group<String> = Group::new();
//! let (value, fresh) = group.work_ex("user:42", || Ok(String::from("bar")));
//! assert_eq!(value.ok().as_deref(), Some("bar"));
//! assert!(fresh);
//! assert!(!group.is_in_flight("user:42"));
//! ```

mod async_group;
mod error;
mod group;
mod types;

pub use async_group::AsyncGroup;
pub use error::SharedError;
pub use group::Group;
pub use types::Options;
