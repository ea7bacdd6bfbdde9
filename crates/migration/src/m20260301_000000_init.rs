//! Initial schema migration.
//!
//! - `accounts`: staff who approve and overturn entries
//! - `reconciliations`: statement credit lines and their approval state
//! - `reference_counters`: highest reference / cancellation number issued

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Email,
    Password,
    Firstname,
    Lastname,
    Roles,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Reconciliations {
    Table,
    Id,
    ValueDate,
    Remarks,
    Customer,
    CreditAmount,
    AmountUsed,
    Balance,
    ApprovedOne,
    ApprovedTwo,
    ApprovalOne,
    ApprovalTwo,
    OverturnedBy,
    Reference,
    CancellationNumber,
    WayBillNumber,
    ParentId,
    ReconcileDateOne,
    ReconcileDateTwo,
    CancellationDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ReferenceCounters {
    Table,
    Kind,
    LastValue,
}

fn account_fk(name: &str, column: Reconciliations) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(Reconciliations::Table, column)
        .to(Accounts::Table, Accounts::Id)
        .on_delete(ForeignKeyAction::SetNull)
        .to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::UserId).uuid().not_null())
                    .col(ColumnDef::new(Accounts::Email).string().not_null())
                    .col(ColumnDef::new(Accounts::Password).string().not_null())
                    .col(ColumnDef::new(Accounts::Firstname).string().not_null())
                    .col(ColumnDef::new(Accounts::Lastname).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Roles)
                            .string()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Accounts::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Accounts::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-email-unique")
                    .table(Accounts::Table)
                    .col(Accounts::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Reconciliations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Reconciliations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reconciliations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reconciliations::ValueDate).date().not_null())
                    .col(ColumnDef::new(Reconciliations::Remarks).string())
                    .col(ColumnDef::new(Reconciliations::Customer).string())
                    .col(
                        ColumnDef::new(Reconciliations::CreditAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reconciliations::AmountUsed).big_integer())
                    .col(ColumnDef::new(Reconciliations::Balance).big_integer())
                    .col(
                        ColumnDef::new(Reconciliations::ApprovedOne)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Reconciliations::ApprovedTwo)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reconciliations::ApprovalOne).integer())
                    .col(ColumnDef::new(Reconciliations::ApprovalTwo).integer())
                    .col(ColumnDef::new(Reconciliations::OverturnedBy).integer())
                    .col(ColumnDef::new(Reconciliations::Reference).string())
                    .col(ColumnDef::new(Reconciliations::CancellationNumber).string())
                    .col(ColumnDef::new(Reconciliations::WayBillNumber).string())
                    .col(ColumnDef::new(Reconciliations::ParentId).integer())
                    .col(ColumnDef::new(Reconciliations::ReconcileDateOne).timestamp())
                    .col(ColumnDef::new(Reconciliations::ReconcileDateTwo).timestamp())
                    .col(ColumnDef::new(Reconciliations::CancellationDate).timestamp())
                    .col(
                        ColumnDef::new(Reconciliations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reconciliations::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(&mut account_fk(
                        "fk-reconciliations-approval_one",
                        Reconciliations::ApprovalOne,
                    ))
                    .foreign_key(&mut account_fk(
                        "fk-reconciliations-approval_two",
                        Reconciliations::ApprovalTwo,
                    ))
                    .foreign_key(&mut account_fk(
                        "fk-reconciliations-overturned_by",
                        Reconciliations::OverturnedBy,
                    ))
                    .to_owned(),
            )
            .await?;

        // Numbers must never be issued twice.
        manager
            .create_index(
                Index::create()
                    .name("idx-reconciliations-reference-unique")
                    .table(Reconciliations::Table)
                    .col(Reconciliations::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-reconciliations-cancellation_number-unique")
                    .table(Reconciliations::Table)
                    .col(Reconciliations::CancellationNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-reconciliations-parent_id")
                    .table(Reconciliations::Table)
                    .col(Reconciliations::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-reconciliations-value_date-remarks")
                    .table(Reconciliations::Table)
                    .col(Reconciliations::ValueDate)
                    .col(Reconciliations::Remarks)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-reconciliations-reconcile_date_two")
                    .table(Reconciliations::Table)
                    .col(Reconciliations::ReconcileDateTwo)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Reference counters
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ReferenceCounters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReferenceCounters::Kind)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReferenceCounters::LastValue)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReferenceCounters::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Reconciliations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
