//! Deterministic, source-like text rendering of state values.
//!
//! Every piece of state that ends up inside a [`Moment`](crate::moment::Moment)
//! is rendered through a [`Node`] tree. Types opt in by implementing
//! [`Describe`] (value → tree) and, when they need to be replayed, [`Restore`]
//! (tree → value). The printer and parser are exact inverses, so the text
//! stored in a moment can always be turned back into the value that produced
//! it.
//!
//! ```text
//! Counter(
//!   count: "2",
//!   label: "clicks",
//!   mode: Mode.fast
//! )
//! ```

mod parse;
mod print;

pub use parse::parse;
pub use print::print;

/// Structured form of a described value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Quoted scalar (strings, numbers and booleans alike).
    Leaf(String),
    /// Ordered sequence.
    List(Vec<Node>),
    /// Product type with named fields, in declaration order.
    Record {
        name: String,
        fields: Vec<(String, Node)>,
    },
    /// Enum case, optionally carrying a single payload node.
    Variant {
        ty: String,
        case: String,
        payload: Option<Box<Node>>,
    },
    /// Absent optional value.
    Nil,
}

/// Errors raised while parsing text or restoring a value from a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("unknown case `{case}` for `{ty}`")]
    UnknownCase { ty: String, case: String },

    #[error("invalid value `{value}`: {message}")]
    InvalidLeaf { value: String, message: String },
}

impl DecodeError {
    pub fn mismatch(expected: impl Into<String>, found: &Node) -> Self {
        DecodeError::Mismatch {
            expected: expected.into(),
            found: found.kind_name(),
        }
    }

    pub fn unknown_case(ty: &str, case: &str) -> Self {
        DecodeError::UnknownCase {
            ty: ty.to_string(),
            case: case.to_string(),
        }
    }

    pub fn invalid(value: &str, message: impl Into<String>) -> Self {
        DecodeError::InvalidLeaf {
            value: value.to_string(),
            message: message.into(),
        }
    }
}

/// Renders a value into a [`Node`] tree.
pub trait Describe {
    fn describe(&self) -> Node;

    /// Printed form of [`Describe::describe`].
    fn to_text(&self) -> String {
        print(&self.describe())
    }
}

/// Rebuilds a value from a [`Node`] tree.
pub trait Restore: Sized {
    fn restore(node: &Node) -> Result<Self, DecodeError>;

    /// Parse `text` and restore a value from it.
    fn from_text(text: &str) -> Result<Self, DecodeError> {
        Self::restore(&parse(text)?)
    }
}

impl Node {
    /// Start building a record node.
    pub fn record(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// A payload-less enum case.
    pub fn variant(ty: impl Into<String>, case: impl Into<String>) -> Self {
        Node::Variant {
            ty: ty.into(),
            case: case.into(),
            payload: None,
        }
    }

    /// An enum case carrying `payload`.
    pub fn variant_with(ty: impl Into<String>, case: impl Into<String>, payload: Node) -> Self {
        Node::Variant {
            ty: ty.into(),
            case: case.into(),
            payload: Some(Box::new(payload)),
        }
    }

    pub fn leaf(value: impl ToString) -> Self {
        Node::Leaf(value.to_string())
    }

    /// Short human-readable name of the node shape, used in error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Node::Leaf(_) => "leaf".to_string(),
            Node::List(_) => "list".to_string(),
            Node::Record { name, .. } => format!("record `{name}`"),
            Node::Variant { ty, case, .. } => format!("case `{ty}.{case}`"),
            Node::Nil => "nil".to_string(),
        }
    }

    pub fn as_leaf(&self) -> Result<&str, DecodeError> {
        match self {
            Node::Leaf(value) => Ok(value),
            other => Err(DecodeError::mismatch("leaf", other)),
        }
    }

    pub fn as_list(&self) -> Result<&[Node], DecodeError> {
        match self {
            Node::List(items) => Ok(items),
            other => Err(DecodeError::mismatch("list", other)),
        }
    }

    /// Access the fields of a record named `name`.
    pub fn as_record(&self, name: &str) -> Result<Fields<'_>, DecodeError> {
        match self {
            Node::Record {
                name: found,
                fields,
            } if found == name => Ok(Fields { fields }),
            other => Err(DecodeError::mismatch(format!("record `{name}`"), other)),
        }
    }

    /// Split a variant of enum `ty` into its case name and payload.
    pub fn as_variant(&self, ty: &str) -> Result<(&str, Option<&Node>), DecodeError> {
        match self {
            Node::Variant {
                ty: found,
                case,
                payload,
            } if found == ty => Ok((case, payload.as_deref())),
            other => Err(DecodeError::mismatch(format!("case of `{ty}`"), other)),
        }
    }
}

/// Builder returned by [`Node::record`].
pub struct RecordBuilder {
    name: String,
    fields: Vec<(String, Node)>,
}

impl RecordBuilder {
    pub fn field(mut self, name: &str, value: &impl Describe) -> Self {
        self.fields.push((name.to_string(), value.describe()));
        self
    }

    pub fn node(mut self, name: &str, node: Node) -> Self {
        self.fields.push((name.to_string(), node));
        self
    }

    pub fn build(self) -> Node {
        Node::Record {
            name: self.name,
            fields: self.fields,
        }
    }
}

/// Borrowed view over a record's fields.
pub struct Fields<'a> {
    fields: &'a [(String, Node)],
}

impl Fields<'_> {
    pub fn node(&self, name: &str) -> Result<&Node, DecodeError> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, node)| node)
            .ok_or_else(|| DecodeError::MissingField(name.to_string()))
    }

    pub fn get<T: Restore>(&self, name: &str) -> Result<T, DecodeError> {
        T::restore(self.node(name)?)
    }
}

/// Payload of a variant that must carry one.
pub fn payload<'a>(
    ty: &str,
    case: &str,
    payload: Option<&'a Node>,
) -> Result<&'a Node, DecodeError> {
    payload.ok_or_else(|| DecodeError::Mismatch {
        expected: format!("payload for `{ty}.{case}`"),
        found: "nothing".to_string(),
    })
}

impl Describe for String {
    fn describe(&self) -> Node {
        Node::Leaf(self.clone())
    }
}

impl Restore for String {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        node.as_leaf().map(str::to_string)
    }
}

impl Describe for bool {
    fn describe(&self) -> Node {
        Node::leaf(self)
    }
}

impl Restore for bool {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        match node.as_leaf()? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(DecodeError::invalid(other, "expected `true` or `false`")),
        }
    }
}

macro_rules! describe_number {
    ($($ty:ty),*) => {
        $(
            impl Describe for $ty {
                fn describe(&self) -> Node {
                    Node::leaf(self)
                }
            }

            impl Restore for $ty {
                fn restore(node: &Node) -> Result<Self, DecodeError> {
                    let raw = node.as_leaf()?;
                    raw.parse::<$ty>()
                        .map_err(|e| DecodeError::invalid(raw, e.to_string()))
                }
            }
        )*
    };
}

describe_number!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f64);

impl<T: Describe> Describe for Option<T> {
    fn describe(&self) -> Node {
        match self {
            Some(value) => value.describe(),
            None => Node::Nil,
        }
    }
}

impl<T: Restore> Restore for Option<T> {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        match node {
            Node::Nil => Ok(None),
            other => T::restore(other).map(Some),
        }
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe(&self) -> Node {
        Node::List(self.iter().map(Describe::describe).collect())
    }
}

impl<T: Restore> Restore for Vec<T> {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        node.as_list()?.iter().map(T::restore).collect()
    }
}

impl Describe for std::path::PathBuf {
    fn describe(&self) -> Node {
        Node::Leaf(self.display().to_string())
    }
}

impl Restore for std::path::PathBuf {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        node.as_leaf().map(std::path::PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Mode {
        Slow,
        Fast,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        count: i64,
        label: Option<String>,
        mode: Mode,
        history: Vec<u32>,
    }

    impl Describe for Mode {
        fn describe(&self) -> Node {
            match self {
                Mode::Slow => Node::variant("Mode", "slow"),
                Mode::Fast => Node::variant("Mode", "fast"),
            }
        }
    }

    impl Restore for Mode {
        fn restore(node: &Node) -> Result<Self, DecodeError> {
            match node.as_variant("Mode")? {
                ("slow", _) => Ok(Mode::Slow),
                ("fast", _) => Ok(Mode::Fast),
                (case, _) => Err(DecodeError::unknown_case("Mode", case)),
            }
        }
    }

    impl Describe for Counter {
        fn describe(&self) -> Node {
            Node::record("Counter")
                .field("count", &self.count)
                .field("label", &self.label)
                .field("mode", &self.mode)
                .field("history", &self.history)
                .build()
        }
    }

    impl Restore for Counter {
        fn restore(node: &Node) -> Result<Self, DecodeError> {
            let fields = node.as_record("Counter")?;
            Ok(Self {
                count: fields.get("count")?,
                label: fields.get("label")?,
                mode: fields.get("mode")?,
                history: fields.get("history")?,
            })
        }
    }

    fn sample() -> Counter {
        Counter {
            count: -3,
            label: Some("say \"hi\"\n".to_string()),
            mode: Mode::Fast,
            history: vec![1, 2],
        }
    }

    #[test]
    fn rendering_is_source_like() {
        let text = Counter {
            count: 2,
            label: None,
            mode: Mode::Slow,
            history: vec![],
        }
        .to_text();

        insta::assert_snapshot!(text, @r#"
        Counter(
          count: "2",
          label: nil,
          mode: Mode.slow,
          history: []
        )
        "#);
    }

    #[test]
    fn restore_reverses_describe() {
        let value = sample();
        let restored = Counter::from_text(&value.to_text()).unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn record_name_must_match() {
        let node = Node::record("Other").build();
        let err = Counter::restore(&node).unwrap_err();
        assert!(matches!(err, DecodeError::Mismatch { .. }));
    }

    #[test]
    fn missing_field_is_reported() {
        let node = Node::record("Counter").field("count", &1i64).build();
        let err = Counter::restore(&node).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("label".to_string()));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = i64::restore(&Node::leaf("twelve")).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidLeaf { .. }));
    }

    #[test]
    fn unknown_case_is_rejected() {
        let err = Mode::restore(&Node::variant("Mode", "warp")).unwrap_err();
        assert_eq!(err, DecodeError::unknown_case("Mode", "warp"));
    }
}
