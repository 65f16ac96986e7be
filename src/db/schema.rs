pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- sources table
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    digest_enabled INTEGER NOT NULL DEFAULT 1,
    last_fetched TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

-- source_items table
CREATE TABLE IF NOT EXISTS source_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE,
    body TEXT,
    published_at TEXT,
    fetched_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    is_read INTEGER NOT NULL DEFAULT 0,
    is_favorite INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_source_items_source_id ON source_items(source_id);
CREATE INDEX IF NOT EXISTS idx_source_items_published_at ON source_items(published_at DESC);
CREATE INDEX IF NOT EXISTS idx_source_items_is_read ON source_items(is_read);

-- digest_entries table
CREATE TABLE IF NOT EXISTS digest_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    synopsis TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE,
    image TEXT,
    published_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    is_read INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_digest_entries_published ON digest_entries(published_at DESC, id DESC);

-- source_links table (source item <-> digest entry)
CREATE TABLE IF NOT EXISTS source_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES source_items(id) ON DELETE CASCADE,
    entry_id INTEGER NOT NULL REFERENCES digest_entries(id) ON DELETE CASCADE,
    UNIQUE(item_id, entry_id)
);

CREATE INDEX IF NOT EXISTS idx_source_links_item_id ON source_links(item_id);
CREATE INDEX IF NOT EXISTS idx_source_links_entry_id ON source_links(entry_id);

-- settings table (single row)
CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    sync_interval_minutes INTEGER NOT NULL DEFAULT 60,
    clean_after_days INTEGER NOT NULL DEFAULT 60,
    utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
    last_sync TEXT,
    digest_enabled INTEGER NOT NULL DEFAULT 0,
    digest_at TEXT,
    digest_duration_minutes INTEGER,
    lookback_hours INTEGER NOT NULL DEFAULT 24,
    include_read INTEGER NOT NULL DEFAULT 0,
    compare_titles INTEGER NOT NULL DEFAULT 1,
    translate INTEGER NOT NULL DEFAULT 0,
    language TEXT NOT NULL DEFAULT 'English'
);

INSERT OR IGNORE INTO settings (id) VALUES (1);
"#;
