//! Non-fatal problems collected while a document is wired.

use log::warn;
use thiserror::Error;

use crate::common::Point;

/// A problem that was skipped over instead of aborting the run.
///
/// Diagnostics are returned alongside a best-effort result so that every
/// problem in a document can be seen after a single pass.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum Diagnostic {
    #[error("line {line}: `{keyword}` block could not be read and is kept as is: {reason}")]
    UnreadableBlock {
        keyword: String,
        line: usize,
        reason: String,
    },
    #[error("line {line}: `{library_id}` symbol has no Reference property and is ignored")]
    MissingReference { library_id: String, line: usize },
    #[error("no component with reference `{reference}` in the document")]
    UnknownComponentReference { reference: String },
    #[error("pin {reference}.{pin_number} is not defined by library symbol `{library_id}`")]
    UnresolvedPin {
        reference: String,
        pin_number: String,
        library_id: String,
    },
    #[error("pin {reference}.{pin_number} is assigned to `{net}` more than once")]
    RepeatedAssignment {
        reference: String,
        pin_number: String,
        net: String,
    },
    #[error("`{net}` has no embedded `power:{net}` symbol, a global label is used instead")]
    MissingPowerSymbol { net: String },
    #[error("routing of `{first_net}` and `{second_net}` meets at {position}: {detail}")]
    RoutingConflict {
        first_net: String,
        second_net: String,
        position: Point,
        detail: String,
    },
}

impl Diagnostic {
    /// Logs the diagnostic and appends it to `diagnostics`.
    pub(crate) fn record(self, diagnostics: &mut Vec<Diagnostic>) {
        warn!("{self}");
        diagnostics.push(self);
    }
}
