use thiserror::Error;

use crate::lead::LeadStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: LeadStatus, to: LeadStatus },
}
