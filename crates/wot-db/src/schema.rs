//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Seeder registry
-- ============================================================

CREATE TABLE IF NOT EXISTS seeders (
    pubkey TEXT PRIMARY KEY CHECK (length(pubkey) = 64),
    region TEXT NOT NULL CHECK (length(region) > 0),
    label TEXT,
    added_by TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_seeders_region ON seeders(region);

-- ============================================================
-- Build runs (append-only history)
-- ============================================================

CREATE TABLE IF NOT EXISTS build_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    status TEXT NOT NULL CHECK (status IN ('RUNNING', 'COMPLETED', 'FAILED')),
    triggered_by TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    seeders_count INTEGER,
    nodes_count INTEGER,
    fetch_failures INTEGER,
    max_depth INTEGER NOT NULL,
    error_message TEXT
);

-- At most one run may be RUNNING at a time.
CREATE UNIQUE INDEX IF NOT EXISTS idx_build_runs_one_running
    ON build_runs(status) WHERE status = 'RUNNING';

CREATE INDEX IF NOT EXISTS idx_build_runs_started ON build_runs(started_at);

-- ============================================================
-- Graph nodes, one generation per completed build
-- ============================================================

CREATE TABLE IF NOT EXISTS graph_nodes (
    generation INTEGER NOT NULL REFERENCES build_runs(id),
    pubkey TEXT NOT NULL,
    depth INTEGER NOT NULL CHECK (depth >= 0),
    score REAL NOT NULL CHECK (score >= 0.0 AND score <= 1.0),
    PRIMARY KEY (generation, pubkey)
);

CREATE INDEX IF NOT EXISTS idx_graph_nodes_depth ON graph_nodes(generation, depth);

CREATE TABLE IF NOT EXISTS graph_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    current_generation INTEGER REFERENCES build_runs(id),
    swapped_at INTEGER
);
"#;
