// ==========================================
// 样品导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{
    ImportConfigReader, DEFAULT_CONTACT_FALLBACK, DEFAULT_DATE_INPUT_FORMAT,
    DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_MIN_FILE_LINES, DEFAULT_MIN_REFERENCE_LENGTH,
};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值配置;格式错误时告警并回退默认值
    fn get_usize_or_default(&self, key: &str, default: usize) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.trim().parse::<usize>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %value, "配置格式错误，使用默认值");
            default
        }))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 返回
    /// - Ok(String): 配置快照的JSON字符串（缺省项以默认值补齐）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let mut config_map: BTreeMap<String, String> = config_keys::DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_min_file_lines(&self) -> Result<usize, Box<dyn Error>> {
        self.get_usize_or_default(config_keys::MIN_FILE_LINES, DEFAULT_MIN_FILE_LINES)
    }

    fn get_max_file_size_bytes(&self) -> Result<usize, Box<dyn Error>> {
        self.get_usize_or_default(config_keys::MAX_FILE_SIZE_BYTES, DEFAULT_MAX_FILE_SIZE_BYTES)
    }

    fn get_date_input_format(&self) -> Result<String, Box<dyn Error>> {
        let value =
            self.get_config_or_default(config_keys::DATE_INPUT_FORMAT, DEFAULT_DATE_INPUT_FORMAT)?;
        if value.trim().is_empty() {
            return Ok(DEFAULT_DATE_INPUT_FORMAT.to_string());
        }
        Ok(value.trim().to_string())
    }

    fn get_min_reference_length(&self) -> Result<usize, Box<dyn Error>> {
        self.get_usize_or_default(config_keys::MIN_REFERENCE_LENGTH, DEFAULT_MIN_REFERENCE_LENGTH)
    }

    fn get_contact_fallback(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::CONTACT_FALLBACK,
            if DEFAULT_CONTACT_FALLBACK { "true" } else { "false" },
        )?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Ok(DEFAULT_CONTACT_FALLBACK),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const MIN_FILE_LINES: &str = "import/min_file_lines";
    pub const MAX_FILE_SIZE_BYTES: &str = "import/max_file_size_bytes";
    pub const DATE_INPUT_FORMAT: &str = "import/date_input_format";
    pub const MIN_REFERENCE_LENGTH: &str = "import/min_reference_length";
    pub const CONTACT_FALLBACK: &str = "import/contact_fallback";

    /// 快照中的默认值
    pub const DEFAULTS: &[(&str, &str)] = &[
        (MIN_FILE_LINES, "3"),
        (MAX_FILE_SIZE_BYTES, "10485760"),
        (DATE_INPUT_FORMAT, "%d/%m/%Y"),
        (MIN_REFERENCE_LENGTH, "2"),
        (CONTACT_FALLBACK, "true"),
    ];
}
