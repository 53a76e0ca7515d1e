//! Streaming Infrastructure
//!
//! The pipeline between a completion backend and the persistence boundary:
//!
//! ```text
//! ┌──────────────────┐  snapshots  ┌────────────────┐  Immediate  ┌──────────┐
//! │MessageStreamSource│ ──────────▶ │ ChangeDetector │ ──────────▶ │  commit  │
//! └──────────────────┘             └───────┬────────┘             └──────────┘
//!                                          │ Streaming                 ▲
//!                                          ▼                           │
//!                                  ┌────────────────┐   deadline /     │
//!                                  │UpdateCoalescer │ ─── flush ───────┘
//!                                  └────────────────┘
//! ```
//!
//! Sources run as spawned tasks and talk to the engine only through
//! [`crate::events::SyncEvent::Stream`]. The detector and the coalescer are
//! plain state owned by the engine.

mod coalescer;
mod detector;
mod source;

pub use coalescer::{CommitClass, UpdateCoalescer, DEFAULT_COALESCE_WINDOW};
pub use detector::{ChangeDetector, Detection, UpdateSnapshot};
pub use source::{MessageStreamSource, SourceUpdate, StreamHandle, StreamTicket};

// Re-export StreamingToken from backend for convenience
pub use crate::backend::StreamingToken;
