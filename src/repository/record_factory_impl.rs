// ==========================================
// 样品导入系统 - 建单工厂 Repository 实现
// ==========================================
// 职责: 新建批次、新建样品申请单及其分析记录（使用 rusqlite）
// 红线: 单张申请单在一个事务内写入
// ==========================================

use crate::db::json_column;
use crate::domain::reference::{AnalysisRequest, Batch, NewAnalysisRequest, NewBatch};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_factory::RecordFactory;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

// ==========================================
// RecordFactoryImpl
// ==========================================
pub struct RecordFactoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl RecordFactoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 共享已有连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 导入单产生的全部样品申请单（按创建顺序）
    pub fn list_requests_by_import(&self, import_id: &str) -> RepositoryResult<Vec<AnalysisRequest>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT uid, request_id, client_uid, import_id, fields_json, created_at
               FROM analysis_request WHERE import_id = ?1 ORDER BY rowid"#,
        )?;
        let mut requests = stmt
            .query_map(params![import_id], |row| {
                Ok(AnalysisRequest {
                    uid: row.get(0)?,
                    request_id: row.get(1)?,
                    client_uid: row.get(2)?,
                    import_id: row.get(3)?,
                    fields: json_column(row, 4)?,
                    service_uids: Vec::new(),
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut analyses =
            conn.prepare("SELECT service_uid FROM analysis WHERE request_uid = ?1 ORDER BY rowid")?;
        for request in &mut requests {
            request.service_uids = analyses
                .query_map(params![request.uid], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
        }
        Ok(requests)
    }

    /// 分析记录总数（按导入单）
    pub fn count_analyses_by_import(&self, import_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM analysis a
               JOIN analysis_request r ON r.uid = a.request_uid
               WHERE r.import_id = ?1"#,
            params![import_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl RecordFactory for RecordFactoryImpl {
    fn create_batch(&self, batch: NewBatch) -> RepositoryResult<Batch> {
        let mut fields = batch.fields;
        let created = Batch {
            uid: Uuid::new_v4().to_string(),
            client_uid: batch.client_uid,
            title: batch.title,
            description: fields.remove("description").filter(|v| !v.is_empty()),
            client_batch_id: fields.remove("ClientBatchID").filter(|v| !v.is_empty()),
            batch_date: batch.batch_date,
            extra_fields: fields,
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO batch (uid, client_uid, title, description, client_batch_id, batch_date, extra_fields_json)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                created.uid,
                created.client_uid,
                created.title,
                created.description,
                created.client_batch_id,
                created.batch_date,
                serde_json::to_string(&created.extra_fields)?,
            ],
        )?;
        debug!(batch_uid = %created.uid, title = %created.title, "批次已写入");
        Ok(created)
    }

    fn create_analysis_request(
        &self,
        request: NewAnalysisRequest,
    ) -> RepositoryResult<AnalysisRequest> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // ===== 申请单编号: <客户编号>-<序号> =====
        let client_id: String = tx
            .query_row(
                "SELECT client_id FROM client WHERE uid = ?1",
                params![request.client_uid],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Client".to_string(),
                id: request.client_uid.clone(),
            })?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM analysis_request WHERE client_uid = ?1",
            params![request.client_uid],
            |row| row.get(0),
        )?;

        let created = AnalysisRequest {
            uid: Uuid::new_v4().to_string(),
            request_id: format!("{}-{:04}", client_id, existing + 1),
            client_uid: request.client_uid,
            import_id: request.import_id,
            fields: request.fields,
            service_uids: request.service_uids,
            created_at: Utc::now(),
        };

        tx.execute(
            r#"INSERT INTO analysis_request (uid, request_id, client_uid, import_id, fields_json, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                created.uid,
                created.request_id,
                created.client_uid,
                created.import_id,
                serde_json::to_string(&created.fields)?,
                created.created_at,
            ],
        )?;

        for service_uid in &created.service_uids {
            let keyword: String = tx
                .query_row(
                    "SELECT keyword FROM analysis_service WHERE uid = ?1",
                    params![service_uid],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "AnalysisService".to_string(),
                    id: service_uid.clone(),
                })?;
            tx.execute(
                "INSERT INTO analysis (uid, request_uid, service_uid, keyword) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), created.uid, service_uid, keyword],
            )?;
        }

        tx.commit()?;
        debug!(
            request_id = %created.request_id,
            analyses = created.service_uids.len(),
            "样品申请单已写入"
        );
        Ok(created)
    }
}
