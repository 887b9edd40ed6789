//! Relay server subsystem.
//!
//! ```text
//! GitLab ── webhook POST ──> webhook.rs ──> broadcast ──> ws.rs ──> viewers
//!                                                           │
//! viewers ── PUT close/reopen ──> api.rs ──> gitlab.rs ──> GitLab
//! ```
//!
//! | Module    | Responsibility                                       |
//! |-----------|------------------------------------------------------|
//! | `server`  | Router assembly, listener, graceful shutdown         |
//! | `api`     | `AppState`, HTTP surface, error responses            |
//! | `webhook` | Secret check, ack-then-process, action normalization |
//! | `ws`      | Per-viewer snapshot + broadcast forwarding           |
//! | `gitlab`  | Authenticated upstream API client                    |

pub mod api;
pub mod gitlab;
pub mod server;
pub mod webhook;
pub mod ws;
