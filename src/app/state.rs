// ==========================================
// 样品导入系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接和API实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ApiError, ApiResult, ImportApi};
use crate::db::{init_schema, open_sqlite_connection};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "SAMPLE_IMPORT_DB_PATH";

/// 应用状态
///
/// 所有API共享同一个数据库连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 样品导入API
    pub import_api: Arc<ImportApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 打开数据库、建表（幂等）、创建API实例
    pub fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("无法打开数据库: {}", e)))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(format!("建表失败: {}", e)))?;
        let conn = Arc::new(Mutex::new(conn));

        let import_api = Arc::new(ImportApi::from_connection(conn.clone())?);

        tracing::info!("AppState初始化成功");
        Ok(Self {
            db_path,
            conn,
            import_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 SAMPLE_IMPORT_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./sample_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("sample-import");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("sample_import.db");
        }
    }

    path.to_string_lossy().to_string()
}
