use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait};

use crate::{
    EngineError, EntryLocks, Reconciliation, ReconciliationId, ReferenceAllocator, ResultEngine,
    reconciliations,
};

mod accounts;
mod approvals;
mod ingest;
mod lineage;
mod list;
mod overturn;

pub use approvals::StageOneOutcome;
pub use lineage::LineageReport;
pub use list::{MAX_LIST_LIMIT, ReconciliationFilter, ReportLine};
pub use overturn::OverturnOutcome;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point for every ledger operation.
///
/// Writers to the same entry are serialized through [`EntryLocks`]; writers
/// issuing numbers of the same kind through the [`ReferenceAllocator`]. Locks
/// are always taken in that order (entries first, child before parent, then
/// counters) and before the DB transaction is opened.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    allocator: ReferenceAllocator,
    locks: EntryLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

fn entry_not_found(id: ReconciliationId) -> EngineError {
    EngineError::KeyNotFound(format!("reconciliation {id}"))
}

async fn find_entry<C>(db: &C, id: ReconciliationId) -> ResultEngine<Option<Reconciliation>>
where
    C: ConnectionTrait,
{
    Ok(reconciliations::Entity::find_by_id(id)
        .one(db)
        .await?
        .map(Reconciliation::from))
}

async fn require_entry<C>(db: &C, id: ReconciliationId) -> ResultEngine<Reconciliation>
where
    C: ConnectionTrait,
{
    find_entry(db, id).await?.ok_or_else(|| entry_not_found(id))
}

async fn save_entry<C>(db: &C, entry: &Reconciliation) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    reconciliations::ActiveModel::from(entry).update(db).await?;
    Ok(())
}

async fn insert_entry<C>(db: &C, entry: &Reconciliation) -> ResultEngine<Reconciliation>
where
    C: ConnectionTrait,
{
    let model = entry.insert_model().insert(db).await?;
    Ok(Reconciliation::from(model))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            allocator: ReferenceAllocator::new(),
            locks: EntryLocks::new(),
        })
    }
}
