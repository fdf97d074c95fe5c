use super::{DecodeError, Node};

/// Deepest nesting of lists, records and payloads accepted.
const MAX_DEPTH: usize = 128;

/// Parse text produced by [`print`](super::print) back into a [`Node`].
///
/// Whitespace between tokens is insignificant, so hand-edited effects do not
/// have to preserve the printer's indentation.
pub fn parse(text: &str) -> Result<Node, DecodeError> {
    let mut parser = Parser {
        src: text,
        pos: 0,
        depth: 0,
    };
    let node = parser.node()?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(node)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), DecodeError> {
        self.skip_ws();
        match self.peek() {
            Some(ch) if ch == want => {
                self.bump();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected `{want}`, found `{ch}`"))),
            None => Err(self.error(format!("expected `{want}`, found end of input"))),
        }
    }

    fn ident(&mut self) -> Result<String, DecodeError> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {}
            _ => return Err(self.error("expected identifier")),
        }
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn node(&mut self) -> Result<Node, DecodeError> {
        if self.depth == MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {MAX_DEPTH} levels")));
        }
        self.depth += 1;
        let node = self.value();
        self.depth -= 1;
        node
    }

    fn value(&mut self) -> Result<Node, DecodeError> {
        self.skip_ws();
        match self.peek() {
            Some('"') => self.leaf(),
            Some('[') => self.list(),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let ident = self.ident()?;
                if ident == "nil" {
                    return Ok(Node::Nil);
                }
                self.skip_ws();
                match self.peek() {
                    Some('(') => self.record(ident),
                    Some('.') => self.variant(ident),
                    _ => Err(self.error(format!("expected `(` or `.` after `{ident}`"))),
                }
            }
            Some(ch) => Err(self.error(format!("unexpected `{ch}`"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn leaf(&mut self) -> Result<Node, DecodeError> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Node::Leaf(value)),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some(other) => return Err(self.error(format!("unknown escape `\\{other}`"))),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(ch) => value.push(ch),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn list(&mut self) -> Result<Node, DecodeError> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(Node::List(items));
        }
        loop {
            items.push(self.node()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Node::List(items)),
                _ => return Err(self.error("expected `,` or `]` in list")),
            }
        }
    }

    fn record(&mut self, name: String) -> Result<Node, DecodeError> {
        self.expect('(')?;
        let mut fields = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(Node::Record { name, fields });
        }
        loop {
            let field = self.ident()?;
            self.expect(':')?;
            let value = self.node()?;
            fields.push((field, value));
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(Node::Record { name, fields }),
                _ => return Err(self.error(format!("expected `,` or `)` in `{name}`"))),
            }
        }
    }

    fn variant(&mut self, ty: String) -> Result<Node, DecodeError> {
        self.expect('.')?;
        let case = self.ident()?;
        let payload = if self.peek() == Some('(') {
            self.bump();
            let inner = self.node()?;
            self.expect(')')?;
            Some(Box::new(inner))
        } else {
            None
        };
        Ok(Node::Variant { ty, case, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::print;

    #[test]
    fn parses_printed_tree() {
        let node = Node::record("Model")
            .node(
                "items",
                Node::List(vec![Node::leaf("a\tb"), Node::Nil, Node::List(vec![])]),
            )
            .node(
                "mode",
                Node::variant_with("Mode", "custom", Node::record("Empty").build()),
            )
            .node("state", Node::variant("State", "idle"))
            .build();

        assert_eq!(parse(&print(&node)).unwrap(), node);
    }

    #[test]
    fn tolerates_reflowed_whitespace() {
        let node = parse("Model( count : \"1\" ,\n\n flags:[ \"a\",\"b\" ] )").unwrap();
        assert_eq!(
            node,
            Node::record("Model")
                .node("count", Node::leaf(1))
                .node("flags", Node::List(vec![Node::leaf("a"), Node::leaf("b")]))
                .build()
        );
    }

    #[test]
    fn rejects_trailing_input() {
        let err = parse("\"a\" \"b\"").unwrap_err();
        assert_eq!(
            err,
            DecodeError::Syntax {
                offset: 4,
                message: "unexpected trailing input".to_string()
            }
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(matches!(
            parse("Model(name: \"abc"),
            Err(DecodeError::Syntax { .. })
        ));
    }

    #[test]
    fn rejects_bare_identifier() {
        assert!(parse("Model").is_err());
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let text = "[".repeat(100_000);
        match parse(&text) {
            Err(DecodeError::Syntax { offset, message }) => {
                assert_eq!(offset, MAX_DEPTH);
                assert!(message.contains("nesting"), "{message}");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }

        let nested = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&nested).is_ok());
    }
}
