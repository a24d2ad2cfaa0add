//! Persistence Layer
//!
//! SQLite storage for the settlement ledger, accessed through sqlx.
//!
//! # Database Schema
//!
//! ## creditors / debtors
//! Collaborator records. Creditors carry their commission configuration,
//! debtors their gateway customer id once known.
//!
//! ## debts
//! - status: pending, overdue, negotiating, paid, cancelled
//! - external_charge_id: charge issued for the debt itself (bound once)
//!
//! ## agreements
//! - status: active, settled, broken
//! - amounts stored as decimal TEXT
//!
//! ## installments
//! - (agreement_id, sequence) unique
//! - external_charge_id unique when present
//! - sync_status: pending, synced, failed (gateway side of the installment)
//! - generation: legacy or current
//!
//! ## commissions
//! Insert-only. At most one row per installment and one per debt.
//!
//! ## legacy_installments
//! Installments written by the previous schema. Copied into `installments`
//! with `generation = 'legacy'` on every start-up.

pub mod ledger_repository;
pub mod models;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

/// Initialize the database connection pool and run migrations
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/recovery.db" or "sqlite::memory:")
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    // Every connection to an in-memory database is a separate database
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

const SCHEMA: &[(&str, &str)] = &[
    (
        "creditors",
        r#"
        CREATE TABLE IF NOT EXISTS creditors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            commission_type TEXT CHECK(commission_type IN ('percentage', 'fixed', 'goal_based')),
            commission_percentage TEXT,
            commission_fixed_amount TEXT,
            commission_goal_amount TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "debtors",
        r#"
        CREATE TABLE IF NOT EXISTS debtors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            document TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            gateway_customer_id TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "debts",
        r#"
        CREATE TABLE IF NOT EXISTS debts (
            id TEXT PRIMARY KEY,
            debtor_id TEXT NOT NULL,
            creditor_id TEXT NOT NULL,
            original_amount TEXT NOT NULL,
            due_date DATE NOT NULL,
            status TEXT NOT NULL
                CHECK(status IN ('pending', 'overdue', 'negotiating', 'paid', 'cancelled')),
            external_charge_id TEXT,
            external_charge_url TEXT,
            notes TEXT,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (debtor_id) REFERENCES debtors(id),
            FOREIGN KEY (creditor_id) REFERENCES creditors(id)
        )
        "#,
    ),
    (
        "agreements",
        r#"
        CREATE TABLE IF NOT EXISTS agreements (
            id TEXT PRIMARY KEY,
            debt_id TEXT,
            debtor_id TEXT NOT NULL,
            creditor_id TEXT NOT NULL,
            original_amount TEXT NOT NULL,
            discount_value TEXT NOT NULL,
            discount_percentage TEXT NOT NULL,
            agreed_amount TEXT NOT NULL,
            down_payment TEXT NOT NULL,
            installment_count INTEGER NOT NULL CHECK(installment_count >= 1),
            first_due_date DATE NOT NULL,
            payment_method TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('active', 'settled', 'broken')),
            notes TEXT,
            created_by TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (debt_id) REFERENCES debts(id),
            FOREIGN KEY (debtor_id) REFERENCES debtors(id),
            FOREIGN KEY (creditor_id) REFERENCES creditors(id)
        )
        "#,
    ),
    (
        "installments",
        r#"
        CREATE TABLE IF NOT EXISTS installments (
            id TEXT PRIMARY KEY,
            agreement_id TEXT NOT NULL,
            sequence INTEGER NOT NULL CHECK(sequence >= 1),
            amount TEXT NOT NULL,
            due_date DATE NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'paid', 'overdue', 'cancelled')),
            paid_amount TEXT,
            paid_date DATE,
            payment_method TEXT,
            external_charge_id TEXT,
            external_charge_url TEXT,
            pix_payload TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(sync_status IN ('pending', 'synced', 'failed')),
            sync_note TEXT,
            generation TEXT NOT NULL DEFAULT 'current'
                CHECK(generation IN ('legacy', 'current')),
            UNIQUE (agreement_id, sequence),
            FOREIGN KEY (agreement_id) REFERENCES agreements(id)
        )
        "#,
    ),
    (
        "commissions",
        r#"
        CREATE TABLE IF NOT EXISTS commissions (
            id TEXT PRIMARY KEY,
            creditor_id TEXT NOT NULL,
            debtor_id TEXT NOT NULL,
            agreement_id TEXT,
            installment_id TEXT,
            debt_id TEXT,
            commission_type TEXT NOT NULL,
            base_amount TEXT NOT NULL,
            percentage TEXT,
            commission_amount TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'paid')),
            created_at DATETIME NOT NULL,
            FOREIGN KEY (creditor_id) REFERENCES creditors(id),
            FOREIGN KEY (debtor_id) REFERENCES debtors(id),
            FOREIGN KEY (agreement_id) REFERENCES agreements(id),
            FOREIGN KEY (installment_id) REFERENCES installments(id),
            FOREIGN KEY (debt_id) REFERENCES debts(id)
        )
        "#,
    ),
    (
        "legacy_installments",
        r#"
        CREATE TABLE IF NOT EXISTS legacy_installments (
            id TEXT PRIMARY KEY,
            agreement_id TEXT NOT NULL,
            installment_number INTEGER NOT NULL,
            value TEXT NOT NULL,
            due_date DATE NOT NULL,
            status TEXT NOT NULL,
            paid_value TEXT,
            paid_at DATE,
            asaas_payment_id TEXT,
            asaas_invoice_url TEXT
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_debts_status ON debts(status)",
    "CREATE INDEX IF NOT EXISTS idx_debts_charge ON debts(external_charge_id)",
    "CREATE INDEX IF NOT EXISTS idx_agreements_debt ON agreements(debt_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_agreements_active_debt
        ON agreements(debt_id) WHERE status = 'active' AND debt_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_installments_agreement ON installments(agreement_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_installments_charge
        ON installments(external_charge_id) WHERE external_charge_id IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_commissions_installment
        ON commissions(installment_id) WHERE installment_id IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_commissions_debt
        ON commissions(debt_id) WHERE debt_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_commissions_creditor ON commissions(creditor_id)",
];

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    for (table, ddl) in SCHEMA {
        sqlx::query(ddl).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {} table: {}", table, e))
        })?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;
    }

    let migrated = migrate_legacy_installments(pool).await?;
    if migrated > 0 {
        info!("Migrated {} legacy installment(s)", migrated);
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Copy legacy installment rows into `installments` tagged `legacy`.
///
/// Idempotent: rows whose id already exists are skipped, as are rows whose
/// agreement is unknown. Returns the number of rows copied.
pub async fn migrate_legacy_installments(pool: &DbPool) -> Result<u64, DatabaseError> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO installments (
            id, agreement_id, sequence, amount, due_date, status,
            paid_amount, paid_date, external_charge_id, external_charge_url,
            sync_status, generation
        )
        SELECT
            l.id, l.agreement_id, l.installment_number, l.value, l.due_date,
            CASE lower(l.status)
                WHEN 'paid' THEN 'paid'
                WHEN 'received' THEN 'paid'
                WHEN 'confirmed' THEN 'paid'
                WHEN 'overdue' THEN 'overdue'
                WHEN 'cancelled' THEN 'cancelled'
                WHEN 'canceled' THEN 'cancelled'
                ELSE 'pending'
            END,
            l.paid_value, l.paid_at, l.asaas_payment_id, l.asaas_invoice_url,
            CASE WHEN l.asaas_payment_id IS NULL THEN 'pending' ELSE 'synced' END,
            'legacy'
        FROM legacy_installments l
        WHERE l.agreement_id IN (SELECT id FROM agreements)
          AND l.id NOT IN (SELECT id FROM installments)
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to migrate legacy installments: {}", e))
    })?;

    Ok(result.rows_affected())
}
