//! Database schema and migrations for filevault.
//!
//! Migrations are applied sequentially when the database is opened; the
//! `schema_version` table records which ones have run.

/// Database migrations, applied in order.
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL,
    password        TEXT NOT NULL,           -- Argon2 hash
    display_name    TEXT NOT NULL,
    avatar_url      TEXT,
    storage_limit   INTEGER NOT NULL,        -- bytes
    storage_used    INTEGER NOT NULL DEFAULT 0 CHECK (storage_used >= 0),
    created_at      TEXT NOT NULL
);

CREATE UNIQUE INDEX idx_users_username ON users(username COLLATE NOCASE);
"#,
    // v2: folders
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    parent_id   INTEGER REFERENCES folders(id),
    in_trash    INTEGER NOT NULL DEFAULT 0,
    deleted_at  TEXT,
    starred     INTEGER NOT NULL DEFAULT 0,
    is_shared   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE INDEX idx_folders_user_parent ON folders(user_id, parent_id);
CREATE INDEX idx_folders_user_starred ON folders(user_id, starred);
"#,
    // v3: files
    r#"
CREATE TABLE files (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    mime_type           TEXT NOT NULL,
    size                INTEGER NOT NULL CHECK (size >= 0),
    user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    folder_id           INTEGER REFERENCES folders(id),
    path                TEXT NOT NULL,       -- stored blob name
    starred             INTEGER NOT NULL DEFAULT 0,
    is_shared           INTEGER NOT NULL DEFAULT 0,
    in_trash            INTEGER NOT NULL DEFAULT 0,
    deleted_at          TEXT,
    last_accessed_at    TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    modified_at         TEXT NOT NULL
);

CREATE INDEX idx_files_user_folder ON files(user_id, folder_id);
CREATE INDEX idx_files_user_starred ON files(user_id, starred);
"#,
    // v4: shares
    r#"
CREATE TABLE shares (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id         INTEGER REFERENCES files(id),
    folder_id       INTEGER REFERENCES folders(id),
    user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    access_type     TEXT NOT NULL DEFAULT 'public',  -- 'public' or 'restricted'
    allow_download  INTEGER NOT NULL DEFAULT 1,
    expiry_date     TEXT,
    token           TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    CHECK ((file_id IS NULL) <> (folder_id IS NULL))
);

CREATE UNIQUE INDEX idx_shares_token ON shares(token);
CREATE INDEX idx_shares_user ON shares(user_id);
CREATE INDEX idx_shares_file ON shares(file_id);
CREATE INDEX idx_shares_folder ON shares(folder_id);
"#,
];
