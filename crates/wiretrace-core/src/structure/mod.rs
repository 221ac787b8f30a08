//! Structure tracking over a [`Wire`] cursor.
//!
//! [`StructureReader`] attaches hooks to a cursor and mirrors the caller's
//! ordinary sequential reads into a typed parse tree: every primitive read
//! synthesizes a [`DataNode`] leaf, scoped [`object`](StructureReader::object)
//! / [`list`](StructureReader::list) calls open nested containers, and sizes
//! fold upward when each scope closes — on every exit path, including
//! failure, so a tree truncated at the failure point remains inspectable.
//!
//! ## Example
//!
//! ```
//! use wiretrace_core::{StructureReader, RootKind, Wire};
//!
//! let wire = Wire::from_bytes(b"test\x11\x22\x33\x44\x55\x66".to_vec());
//! let mut reader = StructureReader::with_root(wire, RootKind::Object)?;
//! reader.will_read("magic");
//! reader.wire().read_exact(4)?;
//! reader.will_read("items");
//! reader.list(|r| {
//!     r.wire().read_u16()?;
//!     r.wire().read_u32()?;
//!     Ok(())
//! })?;
//! assert_eq!(reader.root().byte_size(), 10);
//! # Ok::<(), wiretrace_core::Error>(())
//! ```
//!
//! ## Preconditions
//!
//! Exactly one read may be in flight at a time: issuing a read from inside a
//! read hook re-enters the tracker and its behavior is undefined (the
//! in-flight capture is silently overwritten). This is a documented
//! precondition, not a runtime-checked invariant.

mod node;

use crate::error::{Error, Result};
use crate::wire::{Hook, Wire};
use bytes::{Bytes, BytesMut};
use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, error, warn};

pub use node::{DataNode, ListNode, Node, NodeKind, ObjectNode};

/// Shape of the root container, chosen at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootKind {
    /// Root is a list of unnamed elements
    #[default]
    List,
    /// Root is an object with named fields
    Object,
}

/// A container currently open on the stack
#[derive(Debug)]
struct Frame {
    /// The container under construction (Object or List variant)
    node: Node,
    /// Field name in the parent, decided when the scope opened.
    /// `None` for the root and for elements of a List parent.
    attach_name: Option<String>,
    /// Counter behind `item_%05u` auto-names, scoped to this container
    auto_counter: u32,
}

/// Mutable tracker state shared between the reader and its installed hooks
#[derive(Debug, Default)]
struct Tracker {
    frames: Vec<Frame>,
    pending_names: VecDeque<String>,
    last_format: Option<String>,
    in_flight: Option<DataNode>,
    consumed: BytesMut,
}

impl Tracker {
    /// Decides the attachment name for the next child of the top container.
    ///
    /// Pending names are consumed first-declared-first (FIFO). Inside an
    /// Object with no pending name a deterministic `item_%05u` name is
    /// generated and a warning is emitted; a List ignores pending names
    /// entirely (they stay queued for the next Object).
    fn next_attach_name(&mut self) -> Option<String> {
        let top = self.frames.last_mut()?;
        match &top.node {
            Node::Object(obj) => {
                if let Some(name) = self.pending_names.pop_front() {
                    return Some(name);
                }
                let name = format!("item_{:05}", top.auto_counter);
                top.auto_counter += 1;
                warn!(
                    object = obj.label.as_deref().unwrap_or(""),
                    field = %name,
                    "field read with no pending name, auto-generated"
                );
                Some(name)
            }
            _ => None,
        }
    }

    /// Attaches a finished child to the top container
    fn attach(&mut self, child: Node, name: Option<String>) {
        let Some(top) = self.frames.last_mut() else {
            return;
        };
        match &mut top.node {
            Node::Object(obj) => {
                // next_attach_name always yields a name for Object parents
                let name = name.unwrap_or_default();
                debug!(field = %name, size = child.byte_size(), "attached field");
                obj.attach(name, child);
            }
            Node::List(list) => {
                debug!(index = list.len(), size = child.byte_size(), "attached element");
                list.attach(child);
            }
            Node::Data(_) => {}
        }
    }
}

/// Builds a parse tree from the reads performed against an owned [`Wire`]
#[derive(Debug)]
pub struct StructureReader {
    wire: Wire,
    tracker: Rc<RefCell<Tracker>>,
}

impl StructureReader {
    /// Attaches a reader with a List root (see [`RootKind`]) to the cursor
    pub fn new(wire: Wire) -> Result<Self> {
        Self::with_root(wire, RootKind::default())
    }

    /// Attaches a reader with the chosen root container shape
    pub fn with_root(mut wire: Wire, root: RootKind) -> Result<Self> {
        let start = wire.position()?;
        let root_node = match root {
            RootKind::Object => Node::Object(ObjectNode::new(None, start)),
            RootKind::List => Node::List(ListNode::new(start)),
        };

        let tracker = Rc::new(RefCell::new(Tracker {
            frames: vec![Frame {
                node: root_node,
                attach_name: None,
                auto_counter: 0,
            }],
            ..Tracker::default()
        }));

        // A formatted read tags the Data node the next raw read produces.
        let state = Rc::clone(&tracker);
        wire.install_hook(Hook::FmtRead(Box::new(move |_, fmt| {
            state.borrow_mut().last_format = Some(fmt.clone());
            fmt
        })));

        // Pre-read: capture offset, requested size, and any pending format.
        let state = Rc::clone(&tracker);
        wire.install_hook(Hook::PreRead(Box::new(move |ctx, n| {
            let mut t = state.borrow_mut();
            let format = t.last_format.take();
            t.in_flight = Some(DataNode::new(ctx.position, n as u64, format));
            n
        })));

        // Post-read: fill in the bytes actually produced and attach.
        let state = Rc::clone(&tracker);
        wire.install_hook(Hook::PostRead(Box::new(move |_, bytes| {
            let mut t = state.borrow_mut();
            if let Some(mut data) = t.in_flight.take() {
                data.raw = Bytes::copy_from_slice(&bytes);
                data.byte_size = bytes.len() as u64;
                t.consumed.extend_from_slice(&bytes);
                let name = t.next_attach_name();
                t.attach(Node::Data(data), name);
            }
            bytes
        })));

        Ok(Self { wire, tracker })
    }

    /// The cursor this reader is tracking. Reads issued through it are
    /// mirrored into the tree.
    pub fn wire(&mut self) -> &mut Wire {
        &mut self.wire
    }

    /// Queues a field name for the next read or scope (FIFO order)
    pub fn will_read(&mut self, name: impl Into<String>) {
        self.tracker
            .borrow_mut()
            .pending_names
            .push_back(name.into());
    }

    /// Queues several field names at once, in iteration order
    pub fn will_read_each<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut t = self.tracker.borrow_mut();
        t.pending_names.extend(names.into_iter().map(Into::into));
    }

    fn open(&mut self, node_for: impl FnOnce(u64) -> Node) -> Result<()> {
        let start = self.wire.position()?;
        let mut t = self.tracker.borrow_mut();
        let attach_name = t.next_attach_name();
        let node = node_for(start);
        debug!(
            kind = node.kind().as_str(),
            offset = start,
            field = attach_name.as_deref().unwrap_or(""),
            "scope opened"
        );
        t.frames.push(Frame {
            node,
            attach_name,
            auto_counter: 0,
        });
        Ok(())
    }

    /// Pops the top container and folds it into its parent. Runs on every
    /// scope exit; on the failure path it first dumps the container-kind
    /// stack at error level. The failure itself propagates unchanged.
    fn close(&mut self, failure: Option<&Error>) -> Result<()> {
        let mut t = self.tracker.borrow_mut();
        if t.frames.len() < 2 {
            return Err(Error::structural_misuse(
                "scope closed with no open container",
            ));
        }
        let frame = t.frames.pop().ok_or_else(|| {
            Error::structural_misuse("scope closed with no open container")
        })?;

        if let Some(err) = failure {
            error!(error = %err, "scope failed, still-open container stack follows");
            for (depth, open) in t.frames.iter().enumerate() {
                error!(depth, kind = open.node.kind().as_str(), "open container");
            }
            error!(
                depth = t.frames.len(),
                kind = frame.node.kind().as_str(),
                "failed container (folded into parent)"
            );
        }

        debug!(
            kind = frame.node.kind().as_str(),
            size = frame.node.byte_size(),
            "scope closed"
        );
        t.attach(frame.node, frame.attach_name);
        Ok(())
    }

    fn scoped<T>(
        &mut self,
        node_for: impl FnOnce(u64) -> Node,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.open(node_for)?;
        let result = f(self);
        match self.close(result.as_ref().err()) {
            Ok(()) => result,
            // A close failure only surfaces when the body succeeded;
            // a body failure always wins.
            Err(close_err) => result.and(Err(close_err)),
        }
    }

    /// Opens a nested object for the duration of `f`.
    ///
    /// The object attaches to the current container (consuming a pending
    /// name when the parent is an Object) and is guaranteed to be popped,
    /// with its accumulated size folded into the parent, on every exit path.
    pub fn object<T>(
        &mut self,
        label: Option<&str>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let label = label.map(str::to_string);
        self.scoped(|start| Node::Object(ObjectNode::new(label, start)), f)
    }

    /// Opens a nested list for the duration of `f`, with the same
    /// guaranteed pop-and-fold contract as [`object`](Self::object)
    pub fn list<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scoped(|start| Node::List(ListNode::new(start)), f)
    }

    /// Read-only borrow of the root container.
    ///
    /// Available at any time, including after a failed scope; sizes reflect
    /// every read and fold completed so far. Do not hold the borrow across
    /// further reads.
    pub fn root(&self) -> Ref<'_, Node> {
        Ref::map(self.tracker.borrow(), |t| &t.frames[0].node)
    }

    /// Concatenation of every raw byte span read through the cursor since
    /// construction
    pub fn consumed_bytes(&self) -> Bytes {
        self.tracker.borrow().consumed.clone().freeze()
    }

    /// Consumes the reader, yielding the finished root node and the cursor.
    ///
    /// The cursor keeps its installed hooks; further reads through it no
    /// longer reach the returned tree.
    pub fn finish(self) -> (Node, Wire) {
        let mut t = self.tracker.borrow_mut();
        let root = std::mem::replace(&mut t.frames[0].node, Node::List(ListNode::new(0)));
        drop(t);
        (root, self.wire)
    }
}
