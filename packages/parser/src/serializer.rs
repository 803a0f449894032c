use quick_xml::escape::{escape, partial_escape};
use std::fmt::Write;

use crate::ast::{Document, Node, NodeKind};

/// Serializer converts a [`Document`] back to XML text
///
/// Output is re-indented: every element starts on its own line, elements
/// whose children are all text stay on a single line.
pub struct Serializer {
    indent_level: usize,
    indent_string: String,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_string: "  ".to_string(),
        }
    }

    pub fn with_indent(indent: &str) -> Self {
        Self {
            indent_level: 0,
            indent_string: indent.to_string(),
        }
    }

    pub fn serialize(&mut self, doc: &Document) -> String {
        let mut output = String::new();

        if let Some(declaration) = &doc.declaration {
            let _ = writeln!(output, "<?xml {}?>", declaration);
        }
        if let Some(root) = doc.root() {
            self.serialize_node(root, &mut output);
        }

        output
    }

    fn serialize_node(&mut self, node: Node<'_>, output: &mut String) {
        match node.kind() {
            NodeKind::Element { tag, attributes } => {
                self.write_indent(output);
                output.push('<');
                output.push_str(tag);
                for attr in attributes {
                    let _ = write!(output, " {}=\"{}\"", attr.name, escape(attr.value.as_str()));
                }

                let mut children = node.children().peekable();
                if children.peek().is_none() {
                    output.push_str("/>\n");
                    return;
                }
                output.push('>');

                if node.children().all(|child| child.is_text()) {
                    for child in children {
                        output.push_str(&partial_escape(child.text_content().as_str()));
                    }
                } else {
                    output.push('\n');
                    self.indent_level += 1;
                    for child in children {
                        self.serialize_node(child, output);
                    }
                    self.indent_level -= 1;
                    self.write_indent(output);
                }

                let _ = writeln!(output, "</{}>", tag);
            }
            NodeKind::Text { text } => {
                self.write_indent(output);
                output.push_str(&partial_escape(text.as_str()));
                output.push('\n');
            }
            NodeKind::Comment { text } => {
                self.write_indent(output);
                let _ = writeln!(output, "<!--{}-->", text);
            }
        }
    }

    fn write_indent(&self, output: &mut String) {
        for _ in 0..self.indent_level {
            output.push_str(&self.indent_string);
        }
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to serialize a document with two-space indentation
pub fn serialize(doc: &Document) -> String {
    Serializer::new().serialize(doc)
}
