//! Reconciliation ledger engine.
//!
//! Tracks credit entries imported from bank statements through a two-stage
//! approval workflow, with partial funding and overturn. All state lives in
//! the database; [`Engine`] wraps the connection plus the in-process locks
//! that serialize writers.

pub use accounts::{Account, AccountId, AccountStatus, Approver, NewAccount};
pub use commands::{OverturnCmd, StageOneCmd, StageTwoCmd};
pub use error::EngineError;
pub use ingest::{
    CandidateEntry, IngestSummary, StatementCell, StatementLayout, StatementRow,
    read_csv_statement, serial_to_date,
};
pub use locks::{EntryGuard, EntryLocks};
pub use money::MoneyCents;
pub use ops::{
    Engine, EngineBuilder, LineageReport, OverturnOutcome, ReconciliationFilter, ReportLine,
    StageOneOutcome, MAX_LIST_LIMIT,
};
pub use reconciliations::{ApprovalState, Reconciliation, ReconciliationId};
pub use references::{CounterGuard, ReferenceAllocator, ReferenceKind, format_reference};
pub use util::{DISPLAY_DATE_FORMAT, MISSING_REMARKS, format_display_date, parse_display_date};

pub mod accounts;
mod commands;
mod error;
mod ingest;
mod locks;
mod money;
mod ops;
pub mod reconciliations;
pub mod references;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
