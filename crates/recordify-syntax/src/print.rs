//! Source printer.
//!
//! The original text is copied as-is; each record node is rendered over the
//! extent of the declaration it replaced. Records nested in unchanged classes
//! are spliced the same way.

use crate::tree::{Node, RecordComponent, RecordDecl, Verbatim};
use crate::{NodeId, SyntaxTree};

const INDENT_UNIT: &str = "    ";

/// Line terminator used by `source`: `\r\n` if it has any, `\n` otherwise.
pub fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Render `tree` back to Java source.
pub fn print(tree: &SyntaxTree) -> String {
    let source = tree.source();
    let printer = Printer {
        tree,
        newline: line_ending(source),
    };
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    printer.splice(&tree.unit().types, &mut cursor, &mut out);
    out.push_str(&source[cursor..]);
    out
}

/// Render a single record declaration, comments included, without the
/// newline that separates it from the preceding declaration.
pub fn render_record(tree: &SyntaxTree, id: NodeId, record: &RecordDecl) -> String {
    let printer = Printer {
        tree,
        newline: line_ending(tree.source()),
    };
    let mut out = String::new();
    printer.record(id, record, &mut out);
    out
}

struct Printer<'t> {
    tree: &'t SyntaxTree,
    newline: &'static str,
}

impl Printer<'_> {
    /// Copy source text up to each record among `ids`, searching unchanged
    /// classes for nested records, and render the records in place.
    fn splice(&self, ids: &[NodeId], cursor: &mut usize, out: &mut String) {
        let source = self.tree.source();
        for &id in ids {
            match self.tree.node(id) {
                Some(Node::Record(record)) => {
                    let extent = record.extent;
                    if extent.start < *cursor || extent.end > source.len() {
                        tracing::warn!(
                            target = "recordify.syntax",
                            record = %record.name,
                            start = extent.start,
                            end = extent.end,
                            "record extent overlaps printed text; skipping"
                        );
                        continue;
                    }
                    out.push_str(&source[*cursor..extent.start]);
                    if extent.start > 0 {
                        out.push_str(self.newline);
                    }
                    self.record(id, record, out);
                    *cursor = extent.end;
                }
                Some(Node::Class(class)) => self.splice(&class.members, cursor, out),
                _ => {}
            }
        }
    }

    fn record(&self, id: NodeId, record: &RecordDecl, out: &mut String) {
        let trivia = self.tree.trivia();
        let nl = self.newline;
        let indent = record.indent.as_str();

        for comment in trivia.leading(id) {
            out.push_str(indent);
            out.push_str(&comment.text);
            out.push_str(nl);
        }

        out.push_str(indent);
        out.push_str(&record.header_prefix);
        out.push_str("record ");
        out.push_str(&record.name);
        if let Some(type_params) = &record.type_params {
            out.push_str(type_params);
        }
        out.push('(');
        let components: Vec<String> =
            record.components.iter().map(RecordComponent::render).collect();
        out.push_str(&components.join(", "));
        out.push(')');
        if let Some(implements) = &record.implements {
            out.push_str(" implements ");
            out.push_str(implements);
        }
        out.push_str(" {");

        let member_indent = format!("{indent}{INDENT_UNIT}");
        for (idx, &member) in record.members.iter().enumerate() {
            out.push_str(nl);
            if idx > 0 {
                out.push_str(nl);
            }
            self.member(member, &member_indent, out);
        }
        for comment in trivia.dangling(id) {
            out.push_str(nl);
            out.push_str(&member_indent);
            out.push_str(&comment.text);
        }

        out.push_str(nl);
        out.push_str(indent);
        out.push('}');
        for comment in trivia.trailing(id) {
            out.push(' ');
            out.push_str(&comment.text);
        }
    }

    fn member(&self, id: NodeId, default_indent: &str, out: &mut String) {
        let source = match self.tree.node(id) {
            Some(Node::Record(record)) => return self.record(id, record, out),
            Some(node) => match node.verbatim() {
                Some(source) => source,
                None => return,
            },
            None => return,
        };
        let indent = if source.indent.is_empty() {
            default_indent
        } else {
            source.indent.as_str()
        };
        let trivia = self.tree.trivia();

        // Comments inside the member's own text are printed with it.
        for comment in trivia
            .leading(id)
            .iter()
            .filter(|c| c.range.end <= source.range.start)
        {
            out.push_str(indent);
            out.push_str(&comment.text);
            out.push_str(self.newline);
        }
        out.push_str(indent);
        match self.tree.node(id) {
            Some(Node::Class(class)) => self.verbatim_with_records(source, &class.members, out),
            _ => out.push_str(&source.text),
        }
        for comment in trivia.trailing(id) {
            out.push(' ');
            out.push_str(&comment.text);
        }
    }

    /// `source.text`, with records among `members` spliced in.
    fn verbatim_with_records(&self, source: &Verbatim, members: &[NodeId], out: &mut String) {
        let text = self.tree.source();
        let range = source.range;
        if range.end > text.len() || text.get(range.start..range.end) != Some(source.text.as_str())
        {
            out.push_str(&source.text);
            return;
        }
        let mut cursor = range.start;
        self.splice(members, &mut cursor, out);
        out.push_str(&text[cursor.min(range.end)..range.end]);
    }
}
