//! Line-oriented command server plumbing.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       RPC Stack                          │
//! │                                                          │
//! │  ┌───────────┐   ┌────────────┐   ┌──────────────────┐   │
//! │  │ Transport │──▶│   Codec    │──▶│ Engine           │   │
//! │  │ (Link)    │   │ (lines)    │   │ GETS/CONTROL/... │   │
//! │  └───────────┘   └────────────┘   └──────────────────┘   │
//! │       ▲                                                  │
//! │       │          ┌────────────┐                          │
//! │       └──────────│  Stream    │   STRM frames            │
//! │                  │  (task)    │                          │
//! │                  └────────────┘                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The connection FSM ([`crate::fsm`]) owns the sequencing.

pub mod codec;
pub mod engine;
pub mod stream;
pub mod transport;
