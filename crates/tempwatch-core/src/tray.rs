//! Tray command vocabulary and gesture mapping.
//!
//! The tray backend turns raw UI interactions into [`TrayGesture`]s; each
//! gesture maps to at most one [`TrayCommand`]. Keeping the mapping here lets
//! it be tested without a desktop session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user request coming from the tray indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayCommand {
    OpenDashboard,
    ViewLogs,
    EditSettings,
    Quit,
}

impl TrayCommand {
    /// Stable menu identifier for this command.
    pub fn menu_id(&self) -> &'static str {
        match self {
            Self::OpenDashboard => "open_dashboard",
            Self::ViewLogs => "view_logs",
            Self::EditSettings => "edit_settings",
            Self::Quit => "quit",
        }
    }

    /// Menu label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenDashboard => "Open Dashboard",
            Self::ViewLogs => "View Logs",
            Self::EditSettings => "Edit Settings",
            Self::Quit => "Quit",
        }
    }

    /// Resolves a menu identifier back to its command.
    pub fn from_menu_id(id: &str) -> Option<Self> {
        MENU_ITEMS.iter().copied().find(|cmd| cmd.menu_id() == id)
    }
}

impl fmt::Display for TrayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.menu_id())
    }
}

/// The context menu, in display order.
pub const MENU_ITEMS: [TrayCommand; 4] = [
    TrayCommand::OpenDashboard,
    TrayCommand::ViewLogs,
    TrayCommand::EditSettings,
    TrayCommand::Quit,
];

/// A physical interaction with the indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayGesture {
    /// Single primary click (left button). Shows nothing.
    PrimaryClick,
    /// Double primary click. Opens the dashboard.
    DoubleClick,
    /// Secondary click (right button). The backend shows the context menu.
    SecondaryClick,
    /// A context menu entry was chosen.
    MenuItem(String),
}

impl TrayGesture {
    /// The command this gesture produces, if any.
    pub fn command(&self) -> Option<TrayCommand> {
        match self {
            Self::PrimaryClick | Self::SecondaryClick => None,
            Self::DoubleClick => Some(TrayCommand::OpenDashboard),
            Self::MenuItem(id) => TrayCommand::from_menu_id(id),
        }
    }

    /// Whether the backend should display the context menu for this gesture.
    pub fn opens_menu(&self) -> bool {
        matches!(self, Self::SecondaryClick)
    }
}
