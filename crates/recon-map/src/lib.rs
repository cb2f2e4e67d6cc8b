//! Column reconciliation engine.
//!
//! Maps documented columns onto the physical columns of warehouse objects,
//! one (page, environment) pass at a time:
//!
//! - [`matcher`] scores candidates and classifies the best one,
//! - [`engine`] applies the override guard and the unchanged-definition gate
//!   before matching, then commits each unit to a [`MappingStore`],
//! - [`orphan`] retires records whose column left the documentation,
//! - [`overrides`] holds the human edit operations.

#![deny(unsafe_code)]

pub mod clock;
pub mod collab;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod orphan;
pub mod overrides;
pub mod report;
pub mod repository;
pub mod score;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use collab::{
    Collaborators, ColumnExtractor, DefinitionSource, DocumentationSource, TargetResolver,
    TypeResolver,
};
pub use engine::{Decision, EngineConfig, PhysicalContext, ReconciliationEngine, decide};
pub use error::{CollaboratorError, ConfigError, ReconError, Result, StoreError};
pub use matcher::{BestMatch, DEFAULT_MATCH_THRESHOLD, MatchOutcome, MatcherConfig, extract_one};
pub use orphan::{OrphanDecision, orphan_decision, sweep_orphans};
pub use overrides::{clear_override, set_override};
pub use report::{ActionCounts, RunReport, SkipReason, UnitAction, UnitOutcome};
pub use repository::JsonMappingRepository;
pub use store::{InMemoryMappingStore, MappingStore};
