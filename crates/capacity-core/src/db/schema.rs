//! SQLite schema definition.

/// Complete database schema for capacity reconciliation.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patient Buckets
-- ============================================================================
-- A case id lives in at most one of these tables; moves between them run in
-- a single transaction.

CREATE TABLE IF NOT EXISTS patients_in_care (
    case_id TEXT PRIMARY KEY,
    page_number INTEGER NOT NULL,
    species_raw TEXT NOT NULL,
    species TEXT,
    age_raw TEXT NOT NULL DEFAULT '',
    age_stage TEXT CHECK (age_stage IN ('Infant', 'Juvenile', 'Adult')),
    status TEXT NOT NULL DEFAULT 'Pending',
    intake_date TEXT NOT NULL,                   -- YYYY-MM-DD
    last_checked TEXT NOT NULL,                  -- RFC 3339 UTC
    reason TEXT
);

CREATE TABLE IF NOT EXISTS other_patients (
    case_id TEXT PRIMARY KEY,
    page_number INTEGER NOT NULL,
    species_raw TEXT NOT NULL,
    species TEXT,
    age_raw TEXT NOT NULL DEFAULT '',
    age_stage TEXT CHECK (age_stage IN ('Infant', 'Juvenile', 'Adult')),
    status TEXT NOT NULL DEFAULT 'Pending',
    intake_date TEXT NOT NULL,
    last_checked TEXT NOT NULL,
    reason TEXT
);

CREATE TABLE IF NOT EXISTS failed_patients (
    case_id TEXT PRIMARY KEY,
    page_number INTEGER NOT NULL,
    species_raw TEXT NOT NULL,
    species TEXT,
    age_raw TEXT NOT NULL DEFAULT '',
    age_stage TEXT CHECK (age_stage IN ('Infant', 'Juvenile', 'Adult')),
    status TEXT NOT NULL DEFAULT 'Pending',
    intake_date TEXT NOT NULL,
    last_checked TEXT NOT NULL,
    reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_in_care_intake ON patients_in_care(intake_date);
CREATE INDEX IF NOT EXISTS idx_other_intake ON other_patients(intake_date);
CREATE INDEX IF NOT EXISTS idx_failed_intake ON failed_patients(intake_date);

-- ============================================================================
-- Capacity Counters
-- ============================================================================

CREATE TABLE IF NOT EXISTS species (
    species_slug TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    shared_capacity INTEGER CHECK (shared_capacity IS NULL OR shared_capacity >= 0)
);

CREATE TABLE IF NOT EXISTS capacity_counters (
    species_slug TEXT NOT NULL REFERENCES species(species_slug),
    age_slug TEXT NOT NULL,
    age_stage TEXT NOT NULL CHECK (age_stage IN ('Infant', 'Juvenile', 'Adult')),
    capacity INTEGER CHECK (capacity IS NULL OR capacity >= 0),
    number_in_care INTEGER NOT NULL DEFAULT 0 CHECK (number_in_care >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (species_slug, age_slug)
);

-- Adjustments absorbed by the zero clamp (single row)
CREATE TABLE IF NOT EXISTS ledger_stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    clamp_events INTEGER NOT NULL DEFAULT 0,
    last_clamp_at TEXT
);

INSERT OR IGNORE INTO ledger_stats (id, clamp_events) VALUES (1, 0);

-- ============================================================================
-- Audit Log (bounded)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id TEXT NOT NULL UNIQUE,
    case_id TEXT NOT NULL,
    page_number INTEGER NOT NULL,
    species TEXT NOT NULL,
    age_stage TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('add', 'remove')),
    success INTEGER NOT NULL,
    timestamp TEXT NOT NULL                      -- RFC 3339 UTC, fixed width
);

CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp, seq);

-- ============================================================================
-- Run Status (single row)
-- ============================================================================

CREATE TABLE IF NOT EXISTS run_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    timestamp TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
    error TEXT
);
"#;
