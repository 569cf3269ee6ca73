use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Estado de un `JobRun` o de un `TaskRun`.
///
/// Transiciones válidas:
/// - `Pending` -> `InProgress` (claim atómico en la store)
/// - `InProgress` -> `Completed` | `Errored`
/// - `Pending` | `InProgress` -> `Cancelled` (sólo `JobRun`)
///
/// `Completed`, `Errored` y `Cancelled` son terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    InProgress,
    Completed,
    Errored,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }

    /// Representación estable usada también como columna en la base de datos.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "errored" => Ok(Self::Errored),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}
