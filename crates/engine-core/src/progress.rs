use serde::Serialize;
use std::fmt;

/// Coarse position of a run, reported in logs as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStage {
    Preparing,
    Resolving,
    Dispatching,
    Classifying,
    Reporting,
    Done,
    Cancelled,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Preparing => "Preparing",
            RunStage::Resolving => "Resolving",
            RunStage::Dispatching => "Dispatching",
            RunStage::Classifying => "Classifying",
            RunStage::Reporting => "Reporting",
            RunStage::Done => "Done",
            RunStage::Cancelled => "Cancelled",
            RunStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStage::Done | RunStage::Cancelled | RunStage::Failed
        )
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
