//! # wiretrace-core
//!
//! A library for introspecting binary streams: a seekable byte cursor with
//! pluggable interception hooks, paired with a structure tracker that mirrors
//! the reads you perform into a typed parse tree.
//!
//! This crate provides the core functionality for:
//! - Positioned reads, writes, and peeks over in-memory or external storage,
//!   with an explicit position save/restore stack
//! - A struct-format mini-language for fixed-width binary layouts
//! - Automatic reconstruction of a labeled, nested Object/List/Data tree
//!   from ordinary sequential reads
//! - Rendering the finished tree as a hex-viewer payload or a binary-template
//!   ("pattern") definition for third-party hex editors
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: The byte cursor, its hooks, and the format mini-language
//! - [`structure`]: The parse-tree model and the structure tracker
//! - [`export`]: Read-only tree renderers (viewer payload, pattern text)
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use wiretrace_core::{RootKind, StructureReader, Wire};
//!
//! let wire = Wire::from_bytes(b"test\x11\x22\x33\x44\x55\x66".to_vec());
//! let mut reader = StructureReader::with_root(wire, RootKind::Object)?;
//!
//! reader.will_read("magic");
//! reader.wire().read_exact(4)?;
//! reader.will_read("payload");
//! reader.list(|r| {
//!     r.wire().read_u16()?;
//!     r.wire().read_u32()?;
//!     Ok(())
//! })?;
//!
//! let payload = reader.viewer_payload();
//! println!("{}", serde_json::to_string_pretty(&payload).unwrap());
//! # Ok::<(), wiretrace_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! Hooks are the extension seam: [`Wire::install_hook`] registers pre/post
//! transforms around every primitive operation, which is exactly how
//! [`StructureReader`] observes reads without the cursor knowing about it.
//! External observers compose freely with the tracker.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod export;
pub mod structure;
pub mod wire;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use export::{generate_pattern, node_to_value, ViewerPayload};
pub use structure::{DataNode, ListNode, Node, NodeKind, ObjectNode, RootKind, StructureReader};
pub use wire::{Endian, FieldCode, Format, Hook, HookCtx, Stream, Value, Wire};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
