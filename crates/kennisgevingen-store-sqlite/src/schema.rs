//! SQL schema for the kennisgevingen SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Dates are stored as `YYYY-MM-DD`, timestamps as RFC 3339 UTC with a
/// fixed precision (see `encode`), so lexicographic comparison in SQL
/// matches chronological order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per BSN ever subscribed to. inserted_at is written by the
-- external change-detection process; rows are never deleted.
CREATE TABLE IF NOT EXISTS bsn_mutations (
    bsn         TEXT PRIMARY KEY,
    inserted_at TEXT
);

-- Subscriptions are never hard-deleted; ending one means writing an
-- end_date in the past. The uniqueness key includes start_date, so a
-- lapsed subscription restarting on a later day is a fresh row.
CREATE TABLE IF NOT EXISTS subscriptions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    application_id TEXT NOT NULL,
    bsn            TEXT NOT NULL REFERENCES bsn_mutations(bsn),
    start_date     TEXT NOT NULL,
    end_date       TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (application_id, bsn, start_date)
);

-- Newly registered persons. Independent of subscriptions.
CREATE TABLE IF NOT EXISTS new_residents (
    bsn         TEXT PRIMARY KEY,
    birthdate   TEXT,
    inserted_at TEXT
);

-- BSN renumbering events. new_bsn stays NULL until the renumbering is
-- resolved to a replacement number.
CREATE TABLE IF NOT EXISTS bsn_changes (
    application_id TEXT NOT NULL,
    old_bsn        TEXT NOT NULL UNIQUE,
    new_bsn        TEXT,
    inserted_at    TEXT,
    valid_from     TEXT
);

CREATE INDEX IF NOT EXISTS subscriptions_app_idx
    ON subscriptions(application_id);
CREATE INDEX IF NOT EXISTS bsn_mutations_inserted_idx
    ON bsn_mutations(inserted_at);
CREATE INDEX IF NOT EXISTS new_residents_inserted_idx
    ON new_residents(inserted_at);
CREATE INDEX IF NOT EXISTS bsn_changes_app_idx
    ON bsn_changes(application_id, inserted_at);

PRAGMA user_version = 1;
";
