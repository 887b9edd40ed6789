//! Viewer-side subsystem: per-viewer reconciliation state plus the
//! reverse action path back to the upstream platform.
//!
//! | Module   | Responsibility                                       |
//! |----------|------------------------------------------------------|
//! | `board`  | Keyed event reconciliation and the suppression guard |
//! | `bridge` | Toggle → authenticated upstream state change         |
//! | `client` | Terminal watch loop over the relay WebSocket         |

pub mod board;
pub mod bridge;
pub mod client;
