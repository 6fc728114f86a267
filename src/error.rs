//! Link budget error types

use thiserror::Error;

use crate::cascade::StageRow;
use crate::component::ComponentId;
use crate::spec::Direction;

/// Result type for link budget operations
pub type BudgetResult<T> = Result<T, BudgetError>;

/// Errors raised by the component model, the cascade engine, and the
/// merge algebra. All of these are fatal to the operation that raised
/// them; nothing is retried internally.
#[derive(Error, Debug)]
pub enum BudgetError {
    /// A stage has no specification for the requested frequency/direction
    #[error("component '{component}' has no {direction} spec at {frequency} GHz")]
    MissingSpec {
        component: String,
        frequency: String,
        direction: Direction,
    },

    /// A forward-direction stage was driven past its compression point.
    /// Carries the per-stage table computed so far, including the row of
    /// the failing stage.
    #[error(
        "component '{component}' is compressed: Pout {output_dbm:.2} dBm exceeds \
         OP1dB {p1db_dbm:.2} dBm"
    )]
    Compression {
        component: String,
        component_id: ComponentId,
        output_dbm: f64,
        p1db_dbm: f64,
        rows: Vec<StageRow>,
    },

    /// The cascade was invoked with no stages
    #[error("chain has no components")]
    EmptyChain,

    /// The connection graph does not reduce to a single ordered chain
    #[error("broken chain: {0}")]
    BrokenChain(String),

    /// A merge selection is not a single contiguous sub-chain
    #[error("invalid merge selection: {0}")]
    InvalidSelection(String),

    /// A merge selection shares no declared frequency
    #[error("the selected components share no common frequency")]
    NoCommonFrequency,

    /// A frequency label did not parse as a positive number
    #[error("'{0}' is not a valid frequency in GHz")]
    InvalidFrequency(String),

    /// A raw spec of the wrong kind was supplied for a component's category
    #[error("component '{component}' takes '{expected}' specs")]
    SpecKindMismatch {
        component: String,
        expected: &'static str,
    },

    /// An auto-calculator setter was called on the wrong category
    #[error("component '{component}' is not a {expected} component")]
    CategoryMismatch {
        component: String,
        expected: &'static str,
    },

    /// The last declared frequency of a component cannot be removed
    #[error("component '{component}' must keep at least one declared frequency")]
    LastFrequency { component: String },

    /// Unmerge was requested on a component without stored members
    #[error("component '{component}' is not a merged component")]
    NotMerged { component: String },

    /// An operation referenced a component id the lineup does not contain
    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),
}

impl BudgetError {
    /// Overshoot past the compression point in dB, for compression errors.
    pub fn overshoot_db(&self) -> Option<f64> {
        match self {
            BudgetError::Compression {
                output_dbm,
                p1db_dbm,
                ..
            } => Some(output_dbm - p1db_dbm),
            _ => None,
        }
    }
}
