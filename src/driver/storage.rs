use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::describe::{payload, DecodeError, Describe, Node, Restore};
use crate::export::{self, Fixture};
use crate::timeline::Timeline;

use super::{Driver, DriverKind};

/// File operation requested by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Open(PathBuf),
    Save { path: PathBuf, timeline: Timeline },
    Export { path: PathBuf, fixtures: Vec<Fixture> },
}

/// A request is executed once per `id`, however often it is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRequest {
    pub id: u64,
    pub op: StorageOp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageModel {
    pub request: Option<StorageRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageAction {
    Opened {
        request: u64,
        path: PathBuf,
        timeline: Timeline,
    },
    Saved {
        request: u64,
        path: PathBuf,
    },
    Exported {
        request: u64,
        path: PathBuf,
        count: usize,
    },
    Failed {
        request: u64,
        message: String,
    },
}

impl StorageAction {
    pub fn request(&self) -> u64 {
        match self {
            StorageAction::Opened { request, .. }
            | StorageAction::Saved { request, .. }
            | StorageAction::Exported { request, .. }
            | StorageAction::Failed { request, .. } => *request,
        }
    }
}

/// Reads and writes timeline and fixture files.
pub struct StorageDriver {
    handled: Option<u64>,
    actions: mpsc::UnboundedSender<StorageAction>,
    events: Option<mpsc::UnboundedReceiver<StorageAction>>,
}

impl Default for StorageDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageDriver {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handled: None,
            actions: tx,
            events: Some(rx),
        }
    }

    fn execute(request: StorageRequest) -> StorageAction {
        let id = request.id;
        let result = match request.op {
            StorageOp::Open(path) => export::read_timeline(&path).map(|timeline| {
                StorageAction::Opened {
                    request: id,
                    path,
                    timeline,
                }
            }),
            StorageOp::Save { path, timeline } => export::write_timeline(&path, &timeline)
                .map(|()| StorageAction::Saved { request: id, path }),
            StorageOp::Export { path, fixtures } => export::write_fixtures(&path, &fixtures)
                .map(|()| StorageAction::Exported {
                    request: id,
                    path,
                    count: fixtures.len(),
                }),
        };
        result.unwrap_or_else(|err| {
            tracing::warn!(request = id, error = %err, "Storage request failed");
            StorageAction::Failed {
                request: id,
                message: err.to_string(),
            }
        })
    }
}

#[async_trait]
impl Driver for StorageDriver {
    type Model = StorageModel;
    type Action = StorageAction;

    fn kind(&self) -> DriverKind {
        DriverKind::Storage
    }

    fn events(&mut self) -> BoxStream<'static, StorageAction> {
        match self.events.take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|action| (action, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }

    async fn render(&mut self, model: StorageModel) {
        let Some(request) = model.request else {
            return;
        };
        if self.handled == Some(request.id) {
            return;
        }
        self.handled = Some(request.id);

        let id = request.id;
        let action = tokio::task::spawn_blocking(move || Self::execute(request))
            .await
            .unwrap_or_else(|err| StorageAction::Failed {
                request: id,
                message: err.to_string(),
            });
        if self.actions.send(action).is_err() {
            tracing::debug!(request = id, "Storage result dropped, no subscriber");
        }
    }
}

impl Describe for StorageAction {
    fn describe(&self) -> Node {
        const TY: &str = "Storage";
        match self {
            StorageAction::Opened {
                request,
                path,
                timeline,
            } => Node::variant_with(
                TY,
                "opened",
                Node::record("Opened")
                    .field("request", request)
                    .field("path", path)
                    .field("timeline", timeline)
                    .build(),
            ),
            StorageAction::Saved { request, path } => Node::variant_with(
                TY,
                "saved",
                Node::record("Saved")
                    .field("request", request)
                    .field("path", path)
                    .build(),
            ),
            StorageAction::Exported {
                request,
                path,
                count,
            } => Node::variant_with(
                TY,
                "exported",
                Node::record("Exported")
                    .field("request", request)
                    .field("path", path)
                    .field("count", count)
                    .build(),
            ),
            StorageAction::Failed { request, message } => Node::variant_with(
                TY,
                "failed",
                Node::record("Failed")
                    .field("request", request)
                    .field("message", message)
                    .build(),
            ),
        }
    }
}

impl Restore for StorageAction {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        const TY: &str = "Storage";
        let (case, body) = node.as_variant(TY)?;
        let body = payload(TY, case, body)?;
        match case {
            "opened" => {
                let fields = body.as_record("Opened")?;
                Ok(StorageAction::Opened {
                    request: fields.get("request")?,
                    path: fields.get("path")?,
                    timeline: fields.get("timeline")?,
                })
            }
            "saved" => {
                let fields = body.as_record("Saved")?;
                Ok(StorageAction::Saved {
                    request: fields.get("request")?,
                    path: fields.get("path")?,
                })
            }
            "exported" => {
                let fields = body.as_record("Exported")?;
                Ok(StorageAction::Exported {
                    request: fields.get("request")?,
                    path: fields.get("path")?,
                    count: fields.get("count")?,
                })
            }
            "failed" => {
                let fields = body.as_record("Failed")?;
                Ok(StorageAction::Failed {
                    request: fields.get("request")?,
                    message: fields.get("message")?,
                })
            }
            other => Err(DecodeError::unknown_case(TY, other)),
        }
    }
}

impl Describe for StorageOp {
    fn describe(&self) -> Node {
        const TY: &str = "StorageOp";
        match self {
            StorageOp::Open(path) => Node::variant_with(TY, "open", path.describe()),
            StorageOp::Save { path, timeline } => Node::variant_with(
                TY,
                "save",
                Node::record("Save")
                    .field("path", path)
                    .field("timeline", timeline)
                    .build(),
            ),
            StorageOp::Export { path, fixtures } => Node::variant_with(
                TY,
                "export",
                Node::record("Export")
                    .field("path", path)
                    .field("fixtures", fixtures)
                    .build(),
            ),
        }
    }
}

impl Restore for StorageOp {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        const TY: &str = "StorageOp";
        let (case, body) = node.as_variant(TY)?;
        let body = payload(TY, case, body)?;
        match case {
            "open" => Ok(StorageOp::Open(PathBuf::restore(body)?)),
            "save" => {
                let fields = body.as_record("Save")?;
                Ok(StorageOp::Save {
                    path: fields.get("path")?,
                    timeline: fields.get("timeline")?,
                })
            }
            "export" => {
                let fields = body.as_record("Export")?;
                Ok(StorageOp::Export {
                    path: fields.get("path")?,
                    fixtures: fields.get("fixtures")?,
                })
            }
            other => Err(DecodeError::unknown_case(TY, other)),
        }
    }
}

impl Describe for StorageRequest {
    fn describe(&self) -> Node {
        Node::record("StorageRequest")
            .field("id", &self.id)
            .field("op", &self.op)
            .build()
    }
}

impl Restore for StorageRequest {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("StorageRequest")?;
        Ok(Self {
            id: fields.get("id")?,
            op: fields.get("op")?,
        })
    }
}
