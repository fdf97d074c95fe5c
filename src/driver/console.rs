use std::fmt;
use std::future::ready;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::describe::{payload, DecodeError, Describe, Node, Restore};

use super::{Driver, DriverKind, MenuCommand};

/// One line typed at the monitor console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Advance to the next event-handling mode.
    CycleMode,
    Record,
    Play,
    SendEvents,
    SendEffects,
    Select(usize),
    Next,
    Prev,
    Approve(Option<usize>),
    Disapprove(Option<usize>),
    Edit(String),
    Clear,
    Connect(String),
    Disconnect,
    Menu(MenuCommand),
    /// Anything that did not parse; echoed back as a status message.
    Invalid(String),
}

impl ConsoleCommand {
    /// Parse a console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let invalid = || ConsoleCommand::Invalid(line.to_string());
        let index = |rest: &str| -> Result<Option<usize>, ()> {
            if rest.is_empty() {
                Ok(None)
            } else {
                rest.parse().map(Some).map_err(|_| ())
            }
        };

        let command = match (word.to_lowercase().as_str(), rest) {
            ("mode", "") => ConsoleCommand::CycleMode,
            ("record", "") => ConsoleCommand::Record,
            ("play", "") => ConsoleCommand::Play,
            ("events", "") => ConsoleCommand::SendEvents,
            ("effects", "") => ConsoleCommand::SendEffects,
            ("select", n) => match n.parse() {
                Ok(n) => ConsoleCommand::Select(n),
                Err(_) => invalid(),
            },
            ("next", "") => ConsoleCommand::Next,
            ("prev", "") => ConsoleCommand::Prev,
            ("approve", n) => index(n).map_or_else(|_| invalid(), ConsoleCommand::Approve),
            ("disapprove", n) => index(n).map_or_else(|_| invalid(), ConsoleCommand::Disapprove),
            ("edit", text) if !text.is_empty() => ConsoleCommand::Edit(text.to_string()),
            ("clear", "") => ConsoleCommand::Clear,
            ("connect", name) if !name.is_empty() => ConsoleCommand::Connect(name.to_string()),
            ("disconnect", "") => ConsoleCommand::Disconnect,
            ("open", path) if !path.is_empty() => {
                ConsoleCommand::Menu(MenuCommand::OpenTimeline(PathBuf::from(path)))
            }
            ("save", path) if !path.is_empty() => {
                ConsoleCommand::Menu(MenuCommand::SaveTimeline(PathBuf::from(path)))
            }
            ("export", path) if !path.is_empty() => {
                ConsoleCommand::Menu(MenuCommand::ExportTests(PathBuf::from(path)))
            }
            ("quit" | "exit", "") => ConsoleCommand::Menu(MenuCommand::Quit),
            _ => invalid(),
        };
        Some(command)
    }
}

/// One-line summary of the monitor shown on the console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleView {
    pub mode: String,
    pub events: usize,
    pub selected: Option<usize>,
    pub approved: usize,
    pub peer: Option<String>,
    pub connection: String,
    pub status: Option<String>,
}

impl fmt::Display for ConsoleView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} events", self.mode, self.events)?;
        if let Some(selected) = self.selected {
            write!(f, ", selected {selected}")?;
        }
        write!(f, ", {} approved", self.approved)?;
        match &self.peer {
            Some(peer) => write!(f, " | peer {peer} ({})", self.connection)?,
            None => write!(f, " | no peer")?,
        }
        if let Some(status) = &self.status {
            write!(f, " | {status}")?;
        }
        Ok(())
    }
}

/// Line-oriented console: reads commands from `input`, prints the summary
/// to `output` whenever it changes.
pub struct ConsoleDriver<R, W> {
    input: Option<R>,
    output: W,
    last: Option<ConsoleView>,
}

impl ConsoleDriver<tokio::io::Stdin, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> ConsoleDriver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Some(input),
            output,
            last: None,
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}

#[async_trait]
impl<R, W> Driver for ConsoleDriver<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Model = ConsoleView;
    type Action = ConsoleCommand;

    fn kind(&self) -> DriverKind {
        DriverKind::Console
    }

    fn events(&mut self) -> BoxStream<'static, ConsoleCommand> {
        let Some(input) = self.input.take() else {
            return stream::empty().boxed();
        };
        FramedRead::new(input, LinesCodec::new())
            .take_while(|line| {
                if let Err(err) = line {
                    tracing::warn!(error = %err, "Console input closed");
                }
                ready(line.is_ok())
            })
            .filter_map(|line| ready(line.ok().and_then(|line| ConsoleCommand::parse(&line))))
            .boxed()
    }

    async fn render(&mut self, view: ConsoleView) {
        if self.last.as_ref() == Some(&view) {
            return;
        }
        let line = format!("{view}\n");
        self.last = Some(view);
        if let Err(err) = self.output.write_all(line.as_bytes()).await {
            tracing::debug!(error = %err, "Failed to write console summary");
            return;
        }
        if let Err(err) = self.output.flush().await {
            tracing::debug!(error = %err, "Failed to flush console output");
        }
    }
}

impl Describe for ConsoleCommand {
    fn describe(&self) -> Node {
        const TY: &str = "Console";
        match self {
            ConsoleCommand::CycleMode => Node::variant(TY, "cycleMode"),
            ConsoleCommand::Record => Node::variant(TY, "record"),
            ConsoleCommand::Play => Node::variant(TY, "play"),
            ConsoleCommand::SendEvents => Node::variant(TY, "sendEvents"),
            ConsoleCommand::SendEffects => Node::variant(TY, "sendEffects"),
            ConsoleCommand::Select(index) => Node::variant_with(TY, "select", index.describe()),
            ConsoleCommand::Next => Node::variant(TY, "next"),
            ConsoleCommand::Prev => Node::variant(TY, "prev"),
            ConsoleCommand::Approve(index) => Node::variant_with(TY, "approve", index.describe()),
            ConsoleCommand::Disapprove(index) => {
                Node::variant_with(TY, "disapprove", index.describe())
            }
            ConsoleCommand::Edit(text) => Node::variant_with(TY, "edit", text.describe()),
            ConsoleCommand::Clear => Node::variant(TY, "clear"),
            ConsoleCommand::Connect(name) => Node::variant_with(TY, "connect", name.describe()),
            ConsoleCommand::Disconnect => Node::variant(TY, "disconnect"),
            ConsoleCommand::Menu(command) => Node::variant_with(TY, "menu", command.describe()),
            ConsoleCommand::Invalid(line) => Node::variant_with(TY, "invalid", line.describe()),
        }
    }
}

impl Restore for ConsoleCommand {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        const TY: &str = "Console";
        let (case, body) = node.as_variant(TY)?;
        let body = || payload(TY, case, body);
        Ok(match case {
            "cycleMode" => ConsoleCommand::CycleMode,
            "record" => ConsoleCommand::Record,
            "play" => ConsoleCommand::Play,
            "sendEvents" => ConsoleCommand::SendEvents,
            "sendEffects" => ConsoleCommand::SendEffects,
            "select" => ConsoleCommand::Select(usize::restore(body()?)?),
            "next" => ConsoleCommand::Next,
            "prev" => ConsoleCommand::Prev,
            "approve" => ConsoleCommand::Approve(Option::restore(body()?)?),
            "disapprove" => ConsoleCommand::Disapprove(Option::restore(body()?)?),
            "edit" => ConsoleCommand::Edit(String::restore(body()?)?),
            "clear" => ConsoleCommand::Clear,
            "connect" => ConsoleCommand::Connect(String::restore(body()?)?),
            "disconnect" => ConsoleCommand::Disconnect,
            "menu" => ConsoleCommand::Menu(MenuCommand::restore(body()?)?),
            "invalid" => ConsoleCommand::Invalid(String::restore(body()?)?),
            other => return Err(DecodeError::unknown_case(TY, other)),
        })
    }
}
