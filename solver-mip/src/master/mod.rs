//! Master problem (LP/QP relaxation) management.

mod backend;
mod relaxation;

pub use backend::{
    CutSource, LinearCut, MasterBackend, MasterRequest, MasterResult, MasterStatus, WarmStart,
};
pub use relaxation::RelaxationMaster;
