use std::path::PathBuf;

use crate::describe::{payload, DecodeError, Describe, Node, Restore};

use super::{ChannelDriver, ChannelRemote, DriverKind};

/// Commands offered by the application menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    OpenTimeline(PathBuf),
    SaveTimeline(PathBuf),
    ExportTests(PathBuf),
    Quit,
}

/// What the menu needs to know to enable or disable its items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuView {
    pub can_save: bool,
    pub can_export: bool,
    pub busy: bool,
}

/// A menu is rendered outside the crate; this is its channel adapter.
pub fn menu_driver() -> (
    ChannelDriver<MenuView, MenuCommand>,
    ChannelRemote<MenuView, MenuCommand>,
) {
    ChannelDriver::new(DriverKind::Menu)
}

impl Describe for MenuCommand {
    fn describe(&self) -> Node {
        match self {
            MenuCommand::OpenTimeline(path) => {
                Node::variant_with("Menu", "openTimeline", path.describe())
            }
            MenuCommand::SaveTimeline(path) => {
                Node::variant_with("Menu", "saveTimeline", path.describe())
            }
            MenuCommand::ExportTests(path) => {
                Node::variant_with("Menu", "exportTests", path.describe())
            }
            MenuCommand::Quit => Node::variant("Menu", "quit"),
        }
    }
}

impl Restore for MenuCommand {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let (case, body) = node.as_variant("Menu")?;
        let path = || PathBuf::restore(payload("Menu", case, body)?);
        match case {
            "openTimeline" => Ok(MenuCommand::OpenTimeline(path()?)),
            "saveTimeline" => Ok(MenuCommand::SaveTimeline(path()?)),
            "exportTests" => Ok(MenuCommand::ExportTests(path()?)),
            "quit" => Ok(MenuCommand::Quit),
            other => Err(DecodeError::unknown_case("Menu", other)),
        }
    }
}

impl Describe for MenuView {
    fn describe(&self) -> Node {
        Node::record("MenuView")
            .field("canSave", &self.can_save)
            .field("canExport", &self.can_export)
            .field("busy", &self.busy)
            .build()
    }
}

impl Restore for MenuView {
    fn restore(node: &Node) -> Result<Self, DecodeError> {
        let fields = node.as_record("MenuView")?;
        Ok(Self {
            can_save: fields.get("canSave")?,
            can_export: fields.get("canExport")?,
            busy: fields.get("busy")?,
        })
    }
}
