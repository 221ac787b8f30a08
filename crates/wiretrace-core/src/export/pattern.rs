//! Binary-template ("pattern") code generation.
//!
//! Translates a finished parse tree into a textual pattern definition usable
//! by third-party hex editors: one synthetic `struct` type per container
//! (numbered pre-order, dependencies emitted first), each data leaf mapped
//! to a primitive declaration when its format describes a single field, and
//! an `u8 name[N]` fallback for everything else. The output ends with one
//! root-instance declaration placed at offset 0.

use crate::structure::Node;
use crate::wire::fmt::{Endian, FieldCode, Format};
use std::fmt::Write;

/// Pattern-language primitive for a single field code
fn primitive(code: FieldCode) -> &'static str {
    match code {
        FieldCode::U8 => "u8",
        FieldCode::I8 => "s8",
        FieldCode::U16 => "u16",
        FieldCode::I16 => "s16",
        FieldCode::U32 => "u32",
        FieldCode::I32 => "s32",
        FieldCode::U64 => "u64",
        FieldCode::I64 => "s64",
        FieldCode::F32 => "float",
        FieldCode::F64 => "double",
    }
}

/// Keeps generated field names valid pattern identifiers
fn identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

struct PatternEmitter {
    next_index: u32,
    definitions: Vec<String>,
}

impl PatternEmitter {
    fn new() -> Self {
        Self {
            next_index: 0,
            definitions: Vec::new(),
        }
    }

    /// Emits a definition for a container and returns its synthetic type
    /// name. Numbering is pre-order; definitions land dependencies-first.
    fn emit_container(&mut self, node: &Node) -> String {
        let type_name = format!("type_{:04}", self.next_index);
        self.next_index += 1;

        let mut body = String::new();
        match node {
            Node::Object(obj) => {
                for (name, child) in obj.fields() {
                    self.emit_field(&mut body, &identifier(name), child);
                }
            }
            Node::List(list) => {
                for (index, child) in list.items().iter().enumerate() {
                    self.emit_field(&mut body, &format!("item_{:05}", index), child);
                }
            }
            Node::Data(_) => {}
        }

        let mut def = String::new();
        let _ = writeln!(def, "struct {} {{", type_name);
        def.push_str(&body);
        let _ = writeln!(def, "}};");
        self.definitions.push(def);
        type_name
    }

    fn emit_field(&mut self, body: &mut String, name: &str, child: &Node) {
        match child {
            Node::Data(data) => {
                let decl = data
                    .format()
                    .and_then(|fmt| Format::parse(fmt).ok())
                    .filter(|format| format.fields.len() == 1)
                    .map(|format| {
                        let endian = match format.resolved_endian(Endian::Big) {
                            Endian::Big => "be",
                            Endian::Little => "le",
                        };
                        format!("{} {} {};", endian, primitive(format.fields[0]), name)
                    })
                    // unmapped formats fall back to a plain byte array
                    .unwrap_or_else(|| format!("u8 {}[{}];", name, data.byte_size));
                let _ = writeln!(body, "    {}", decl);
            }
            container => {
                let child_type = self.emit_container(container);
                let _ = writeln!(body, "    {} {};", child_type, name);
            }
        }
    }
}

/// Generates pattern-language text for a finished tree: a sequence of type
/// declarations followed by one root-instance declaration at offset 0
pub fn generate_pattern(root: &Node) -> String {
    let mut emitter = PatternEmitter::new();
    let root_type = emitter.emit_container(root);

    let mut out = String::new();
    for def in &emitter.definitions {
        out.push_str(def);
        out.push('\n');
    }
    let _ = writeln!(out, "{} root @ 0x00;", root_type);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{RootKind, StructureReader};
    use crate::wire::Wire;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_primitive_declarations() {
        let wire = Wire::from_bytes(b"test\x12\x34\x37\x13\x03\x00".to_vec());
        let mut r = StructureReader::with_root(wire, RootKind::Object).unwrap();
        r.will_read("magic");
        r.wire().read_exact(4).unwrap();
        r.will_read("version");
        r.wire().read_u16().unwrap();
        r.will_read("serial");
        r.wire().read_fmt_single("<I").unwrap();

        let (root, _) = r.finish();
        let text = generate_pattern(&root);
        assert_eq!(
            text,
            "struct type_0000 {\n\
             \x20   u8 magic[4];\n\
             \x20   be u16 version;\n\
             \x20   le u32 serial;\n\
             };\n\
             \n\
             type_0000 root @ 0x00;\n"
        );
    }

    #[test]
    fn test_nested_containers_dependencies_first() {
        let wire = Wire::from_bytes(b"\x01\x02\x03\x04".to_vec());
        let mut r = StructureReader::with_root(wire, RootKind::Object).unwrap();
        r.will_read("head");
        r.wire().read_u8().unwrap();
        r.will_read("entries");
        r.list(|r| {
            r.wire().read_u8()?;
            r.wire().read_u16().map(|_| ())
        })
        .unwrap();

        let (root, _) = r.finish();
        let text = generate_pattern(&root);

        // pre-order numbering: root is type_0000, the list type_0001; the
        // list definition must precede the root definition that uses it
        let list_def = text.find("struct type_0001").unwrap();
        let root_def = text.find("struct type_0000").unwrap();
        assert!(list_def < root_def);
        assert!(text.contains("    type_0001 entries;"));
        assert!(text.ends_with("type_0000 root @ 0x00;\n"));
    }

    #[test]
    fn test_identifier_sanitizing() {
        assert_eq!(identifier("ok_name1"), "ok_name1");
        assert_eq!(identifier("has space"), "has_space");
        assert_eq!(identifier("0start"), "_0start");
        assert_eq!(identifier(""), "_");
    }
}
