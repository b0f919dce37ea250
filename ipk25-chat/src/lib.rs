//! `ipk25-chat` — client for the IPK25-CHAT protocol over TCP or UDP.
//!
//! # Architecture
//!
//! ```text
//!  stdin ─▶ input ─▶ send loop ─┐                 ┌─▶ line   (TCP text)
//!                               ├─▶ sender ───────┤
//!           error escalation ───┘  (Outbound)     └─▶ packet (UDP binary)
//!                                      │
//!                                   socket
//!                                      │
//!  console ◀─ receive loop ◀───────────┘
//!                 │
//!               state (FSM), dedup, signal
//! ```
//!
//! Each module has a single responsibility:
//! - [`message`]     — logical message model shared by both encodings
//! - [`field`]       — per-field length and charset rules
//! - [`line`]        — TCP text encoding and line framing
//! - [`packet`]      — UDP binary encoding
//! - [`state`]       — protocol finite-state machine
//! - [`dedup`]       — seen-id set for UDP duplicates
//! - [`signal`]      — resettable flags and per-id CONFIRM waits
//! - [`timer`]       — confirmation, retry and reply timing
//! - [`socket`]      — TCP and UDP transport handles
//! - [`sender`]      — outbound delivery with UDP retransmission
//! - [`receiver`]    — inbound frame handling
//! - [`connection`]  — session state and the concurrent activities
//! - [`input`]       — local command grammar and stdin reader
//! - [`console`]     — operator-visible output
//! - [`config`]      — client configuration and server resolution
//! - [`error`]       — error taxonomy and exit codes

pub mod config;
pub mod connection;
pub mod console;
pub mod dedup;
pub mod error;
pub mod field;
pub mod input;
pub mod line;
pub mod message;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod signal;
pub mod socket;
pub mod state;
pub mod timer;

pub use connection::run;
pub use error::{ChatError, Result};
