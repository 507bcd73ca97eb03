//! Core subsystem for hooktrap: bounded request history with pub/sub
//! fan-out, content-type-aware body decoding under memory caps, and
//! webhook signature verification.
//!
//! Everything here is transport-agnostic; the HTTP listeners live in
//! the `hooktrap_cli` crate and call into these modules.

pub mod decode;
pub mod display;
pub mod store;
pub mod verify;

pub use store::{CapturedRequest, FileAttachment, Store, Subscriber};
