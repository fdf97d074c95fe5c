use super::Node;

const INDENT: &str = "  ";

/// Render `node` as indented, source-like text.
///
/// Records and non-empty lists put one entry per line; leaves are always
/// quoted so numbers, booleans and strings share one lexical form.
pub fn print(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    match node {
        Node::Leaf(value) => write_quoted(out, value),
        Node::Nil => out.push_str("nil"),
        Node::List(items) if items.is_empty() => out.push_str("[]"),
        Node::List(items) => {
            out.push_str("[\n");
            for (idx, item) in items.iter().enumerate() {
                indent(out, depth + 1);
                write_node(out, item, depth + 1);
                if idx + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(']');
        }
        Node::Record { name, fields } if fields.is_empty() => {
            out.push_str(name);
            out.push_str("()");
        }
        Node::Record { name, fields } => {
            out.push_str(name);
            out.push_str("(\n");
            for (idx, (field, value)) in fields.iter().enumerate() {
                indent(out, depth + 1);
                out.push_str(field);
                out.push_str(": ");
                write_node(out, value, depth + 1);
                if idx + 1 < fields.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(')');
        }
        Node::Variant { ty, case, payload } => {
            out.push_str(ty);
            out.push('.');
            out.push_str(case);
            if let Some(payload) = payload {
                out.push('(');
                write_node(out, payload, depth);
                out.push(')');
            }
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_quoted(out: &mut String, value: &str) {
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        let text = print(&Node::leaf("a\"b\\c\nd"));
        assert_eq!(text, r#""a\"b\\c\nd""#);
    }

    #[test]
    fn variant_payload_stays_inline() {
        let node = Node::variant_with(
            "Action",
            "rename",
            Node::record("Rename").field("to", &"x".to_string()).build(),
        );
        assert_eq!(print(&node), "Action.rename(Rename(\n  to: \"x\"\n))");
    }

    #[test]
    fn nested_lists_indent_per_level() {
        let node = Node::List(vec![Node::List(vec![Node::leaf(1)]), Node::Nil]);
        assert_eq!(print(&node), "[\n  [\n    \"1\"\n  ],\n  nil\n]");
    }
}
