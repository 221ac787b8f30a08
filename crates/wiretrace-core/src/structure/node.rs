//! Parse-tree node model.
//!
//! Three node kinds mirror what a read sequence can produce: an Object
//! (named fields, order-preserving), a List (ordered elements), and a Data
//! leaf holding the exact bytes one read consumed, plus the canonical format
//! tag when the read was formatted. Every node tracks its own byte extent.
//!
//! Nodes are created, attached, and sized by the
//! [`StructureReader`](super::StructureReader) alone; exporters borrow the
//! finished tree through the read-only accessors here.

use bytes::Bytes;

/// Discriminant for the three node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Named, ordered fields
    Object,
    /// Ordered, unnamed elements
    List,
    /// Leaf bytes from a single read
    Data,
}

impl NodeKind {
    /// Export-facing tag for this kind
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Object => "OBJECT",
            NodeKind::List => "LIST",
            NodeKind::Data => "DATA",
        }
    }
}

/// A node of the reconstructed parse tree
#[derive(Debug, Clone)]
pub enum Node {
    /// Container with named, ordered fields
    Object(ObjectNode),
    /// Container with ordered, unnamed elements
    List(ListNode),
    /// Leaf holding the raw bytes of one read
    Data(DataNode),
}

impl Node {
    /// The kind of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Object(_) => NodeKind::Object,
            Node::List(_) => NodeKind::List,
            Node::Data(_) => NodeKind::Data,
        }
    }

    /// Cursor offset at which this node was opened
    pub fn start_offset(&self) -> u64 {
        match self {
            Node::Object(n) => n.start_offset,
            Node::List(n) => n.start_offset,
            Node::Data(n) => n.start_offset,
        }
    }

    /// Total bytes covered by this node and its children
    pub fn byte_size(&self) -> u64 {
        match self {
            Node::Object(n) => n.byte_size,
            Node::List(n) => n.byte_size,
            Node::Data(n) => n.byte_size,
        }
    }

    /// Borrows the object variant, if this is one
    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Object(n) => Some(n),
            _ => None,
        }
    }

    /// Borrows the list variant, if this is one
    pub fn as_list(&self) -> Option<&ListNode> {
        match self {
            Node::List(n) => Some(n),
            _ => None,
        }
    }

    /// Borrows the data variant, if this is one
    pub fn as_data(&self) -> Option<&DataNode> {
        match self {
            Node::Data(n) => Some(n),
            _ => None,
        }
    }
}

/// Container node with named, order-preserving fields
#[derive(Debug, Clone)]
pub struct ObjectNode {
    /// Free-form label ("class name") for downstream rendering
    pub label: Option<String>,
    pub(crate) start_offset: u64,
    pub(crate) byte_size: u64,
    pub(crate) fields: Vec<(String, Node)>,
}

impl ObjectNode {
    pub(crate) fn new(label: Option<String>, start_offset: u64) -> Self {
        Self {
            label,
            start_offset,
            byte_size: 0,
            fields: Vec::new(),
        }
    }

    /// Attaches a named child, folding its size into this object.
    ///
    /// Duplicate names are not checked; the ordered field list keeps both
    /// occurrences and map-shaped exports keep the last.
    pub(crate) fn attach(&mut self, name: String, child: Node) {
        self.byte_size += child.byte_size();
        self.fields.push((name, child));
    }

    /// Fields in attachment order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.fields.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields have been attached
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field by name (last occurrence wins)
    pub fn field(&self, name: &str) -> Option<&Node> {
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }
}

/// Container node with ordered, unnamed elements
#[derive(Debug, Clone)]
pub struct ListNode {
    pub(crate) start_offset: u64,
    pub(crate) byte_size: u64,
    pub(crate) items: Vec<Node>,
}

impl ListNode {
    pub(crate) fn new(start_offset: u64) -> Self {
        Self {
            start_offset,
            byte_size: 0,
            items: Vec::new(),
        }
    }

    /// Attaches an element, folding its size into this list
    pub(crate) fn attach(&mut self, child: Node) {
        self.byte_size += child.byte_size();
        self.items.push(child);
    }

    /// Elements in attachment order
    pub fn items(&self) -> &[Node] {
        &self.items
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no elements have been attached
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Leaf node holding the exact bytes one read consumed
#[derive(Debug, Clone)]
pub struct DataNode {
    pub(crate) start_offset: u64,
    pub(crate) byte_size: u64,
    pub(crate) raw: Bytes,
    pub(crate) format: Option<String>,
}

impl DataNode {
    pub(crate) fn new(start_offset: u64, byte_size: u64, format: Option<String>) -> Self {
        Self {
            start_offset,
            byte_size,
            raw: Bytes::new(),
            format,
        }
    }

    /// The raw bytes this read consumed
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// The canonical format tag, when the read was formatted
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}
