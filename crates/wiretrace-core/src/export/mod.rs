//! Tree export adapters.
//!
//! The export map is a generic recursive projection of a finished parse
//! tree, shaped for the downstream HTML hex-viewer: every node carries
//! `$TYPE` / `$POS` / `$SIZE`, objects add their fields plus an `$ORDER`
//! array, lists add `items`, and data leaves add `data_hex` plus a
//! re-decoded `data_fmt` when a format tag was recorded. Key order is
//! preserved (`serde_json` with `preserve_order`).

mod pattern;

use crate::structure::{Node, StructureReader};
use crate::wire::fmt::{unpack, Endian};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};

pub use pattern::generate_pattern;

/// Payload consumed by structure renderers: the root node export plus a hex
/// string of every byte consumed
#[derive(Debug, Clone, Serialize)]
pub struct ViewerPayload {
    /// Recursive export of the root node
    #[serde(rename = "struct")]
    pub structure: JsonValue,
    /// Hex encoding of all bytes consumed through the cursor
    pub data: String,
}

impl ViewerPayload {
    /// Builds the payload from a finished tree and the consumed byte span
    pub fn new(root: &Node, consumed: &[u8]) -> Self {
        Self {
            structure: node_to_value(root),
            data: hex::encode(consumed),
        }
    }
}

impl StructureReader {
    /// Renders the current tree state as a viewer payload
    pub fn viewer_payload(&self) -> ViewerPayload {
        ViewerPayload::new(&self.root(), &self.consumed_bytes())
    }
}

fn basic_entries(map: &mut Map<String, JsonValue>, node: &Node) {
    map.insert("$TYPE".into(), json!(node.kind().as_str()));
    map.insert("$POS".into(), json!(node.start_offset()));
    map.insert("$SIZE".into(), json!(node.byte_size()));
}

/// Projects a node into its generic export representation
pub fn node_to_value(node: &Node) -> JsonValue {
    let mut map = Map::new();
    basic_entries(&mut map, node);

    match node {
        Node::Object(obj) => {
            if let Some(label) = &obj.label {
                map.insert("$NAME".into(), json!(label));
            }
            let mut order = Vec::with_capacity(obj.len());
            for (name, child) in obj.fields() {
                order.push(name.to_string());
                map.insert(name.to_string(), node_to_value(child));
            }
            map.insert("$ORDER".into(), json!(order));
        }
        Node::List(list) => {
            let items: Vec<_> = list.items().iter().map(node_to_value).collect();
            map.insert("items".into(), JsonValue::Array(items));
        }
        Node::Data(data) => {
            if let Some(fmt) = data.format() {
                map.insert("format".into(), json!(fmt));
                // re-decode the raw bytes through the stored canonical
                // format; a truncated leaf (failed read) is left undecoded
                if let Ok(values) = unpack(fmt, Endian::Big, data.raw()) {
                    let decoded = if values.len() == 1 {
                        serde_json::to_value(values[0]).unwrap_or(JsonValue::Null)
                    } else {
                        serde_json::to_value(&values).unwrap_or(JsonValue::Null)
                    };
                    map.insert("data_fmt".into(), decoded);
                }
            }
            map.insert("data_hex".into(), json!(hex::encode(data.raw())));
        }
    }

    JsonValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::RootKind;
    use crate::wire::Wire;
    use pretty_assertions::assert_eq;

    fn sample_reader() -> StructureReader {
        let wire = Wire::from_bytes(b"test\x11\x22\x33\x44\x55\x66".to_vec());
        let mut r = StructureReader::with_root(wire, RootKind::Object).unwrap();
        r.will_read("magic");
        r.wire().read_exact(4).unwrap();
        r.will_read("items");
        r.list(|r| {
            r.wire().read_u16()?;
            r.wire().read_u32()?;
            Ok(())
        })
        .unwrap();
        r
    }

    #[test]
    fn test_export_map_shape() {
        let r = sample_reader();
        let value = node_to_value(&r.root());

        assert_eq!(value["$TYPE"], "OBJECT");
        assert_eq!(value["$POS"], 0);
        assert_eq!(value["$SIZE"], 10);
        assert_eq!(value["$ORDER"], json!(["magic", "items"]));
        assert_eq!(value["magic"]["$TYPE"], "DATA");
        assert_eq!(value["magic"]["data_hex"], "74657374");

        let items = &value["items"];
        assert_eq!(items["$TYPE"], "LIST");
        assert_eq!(items["items"].as_array().unwrap().len(), 2);
        assert_eq!(items["items"][0]["format"], ">H");
        assert_eq!(items["items"][0]["data_fmt"], 0x1122);
    }

    #[test]
    fn test_unnamed_reads_export_scenario() {
        // object with one unnamed 2-byte read, then a nested list with two
        // unnamed reads
        let wire = Wire::from_bytes(b"\xAA\xBB\x01\x02\x03".to_vec());
        let mut r = StructureReader::with_root(wire, RootKind::Object).unwrap();
        r.wire().read_exact(2).unwrap();
        r.list(|r| {
            r.wire().read_exact(1)?;
            r.wire().read_exact(2).map(|_| ())
        })
        .unwrap();

        let value = node_to_value(&r.root());
        assert_eq!(value["item_00000"]["$SIZE"], 2);
        let list = &value["item_00001"];
        assert_eq!(list["$TYPE"], "LIST");
        assert_eq!(list["items"].as_array().unwrap().len(), 2);
        assert_eq!(value["$SIZE"], 5);
    }

    #[test]
    fn test_viewer_payload() {
        let r = sample_reader();
        let payload = r.viewer_payload();
        assert_eq!(payload.data, "74657374112233445566");
        let rendered = serde_json::to_value(&payload).unwrap();
        assert!(rendered.get("struct").is_some());
        assert_eq!(rendered["data"], "74657374112233445566");
    }

    #[test]
    fn test_multi_field_format_decodes_to_array() {
        let wire = Wire::from_bytes(vec![0x01, 0x00, 0x02]);
        let mut r = StructureReader::new(wire).unwrap();
        r.wire().read_fmt(">BH").unwrap();
        let value = node_to_value(&r.root());
        assert_eq!(value["items"][0]["data_fmt"], json!([1, 2]));
    }
}
