//! Process security subsystem.
//!
//! # Design Decisions
//! - Privileges drop exactly once, after the listener has bound (privileged
//!   ports) and before any worker accepts a connection
//! - Failure to switch identity is fatal; the server never falls back to
//!   serving privileged

pub mod privilege;

pub use privilege::{drop_privileges, PrivilegeError};
