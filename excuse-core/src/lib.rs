pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod models;
pub mod proof;
pub mod store;

pub use completion::{
    create_backend, CompletionBackend, CompletionConfig, CompletionError, GeminiCompletionClient,
    DEFAULT_MODEL,
};
pub use config::ExcuseConfig;
pub use error::{ExcuseError, UnknownTag};
pub use generator::{ExcuseGenerator, GeneratedExcuse, GenerationError};
pub use models::{Criticality, ExcuseRecord, HistoryEntry, ProofKind, Rating, Scenario};
pub use proof::{ProofArtifact, ProofError, ProofRenderer};
pub use store::{ExcuseStore, StoreError};
