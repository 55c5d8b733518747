// ==========================================
// 样品导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表（幂等）
// ==========================================

use rusqlite::types::Type;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    configure_sqlite_connection(conn)?;
    conn.execute_batch(SCHEMA_SQL)?;

    if read_schema_version(conn)?.unwrap_or(0) < CURRENT_SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "数据库 schema 已初始化");
    }
    Ok(())
}

/// 读取 JSON 文本列（解析失败按列类型转换错误上报）
pub fn json_column<T: DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 参考数据 =====
CREATE TABLE IF NOT EXISTS client (
    uid TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    client_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contact (
    uid TEXT PRIMARY KEY,
    client_uid TEXT NOT NULL REFERENCES client(uid),
    fullname TEXT NOT NULL,
    email TEXT,
    cc_contact_uids_json TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_contact_client ON contact(client_uid);

CREATE TABLE IF NOT EXISTS setup_item (
    uid TEXT PRIMARY KEY,
    portal_type TEXT NOT NULL,
    title TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_setup_item_type_title ON setup_item(portal_type, title);

CREATE TABLE IF NOT EXISTS analysis_service (
    uid TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    keyword TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS analysis_profile (
    uid TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    profile_key TEXT
);

CREATE TABLE IF NOT EXISTS analysis_profile_service (
    profile_uid TEXT NOT NULL REFERENCES analysis_profile(uid),
    service_uid TEXT NOT NULL REFERENCES analysis_service(uid),
    PRIMARY KEY (profile_uid, service_uid)
);

CREATE TABLE IF NOT EXISTS batch (
    uid TEXT PRIMARY KEY,
    client_uid TEXT NOT NULL REFERENCES client(uid),
    title TEXT NOT NULL,
    description TEXT,
    client_batch_id TEXT,
    batch_date TEXT NOT NULL,
    extra_fields_json TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_batch_client_title ON batch(client_uid, title);

-- ===== 导入单 =====
CREATE TABLE IF NOT EXISTS sample_import (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL UNIQUE,
    client_uid TEXT NOT NULL REFERENCES client(uid),
    original_filename TEXT NOT NULL,
    original_data BLOB NOT NULL,
    filename TEXT,
    client_name TEXT,
    client_id TEXT,
    client_order_number TEXT,
    client_reference TEXT,
    nr_samples INTEGER,
    contact_uid TEXT,
    cc_contacts_json TEXT NOT NULL DEFAULT '[]',
    batch_uid TEXT,
    client_batch_id TEXT,
    sample_data_json TEXT NOT NULL DEFAULT '[]',
    errors_json TEXT NOT NULL DEFAULT '[]',
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    date_validated TEXT,
    date_imported TEXT,
    nr_samples_invalid TEXT
);
CREATE INDEX IF NOT EXISTS idx_sample_import_order ON sample_import(client_order_number);
CREATE INDEX IF NOT EXISTS idx_sample_import_reference ON sample_import(client_reference);

-- ===== 导入产物 =====
CREATE TABLE IF NOT EXISTS analysis_request (
    uid TEXT PRIMARY KEY,
    request_id TEXT NOT NULL UNIQUE,
    client_uid TEXT NOT NULL REFERENCES client(uid),
    import_id TEXT REFERENCES sample_import(id),
    fields_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analysis (
    uid TEXT PRIMARY KEY,
    request_uid TEXT NOT NULL REFERENCES analysis_request(uid),
    service_uid TEXT NOT NULL REFERENCES analysis_service(uid),
    keyword TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'registered'
);
CREATE INDEX IF NOT EXISTS idx_analysis_request ON analysis(request_uid);
"#;
