pub mod excuse;
pub mod tags;

pub use excuse::{ExcuseRecord, HistoryEntry, Rating};
pub use tags::{Criticality, ProofKind, Scenario};
