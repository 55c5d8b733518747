// ==========================================
// 样品导入API
// ==========================================
// 职责: 封装导入单全生命周期（上传/编辑/校验/导入/取消/查询）
// 红线: 每个调用按 ID 重新加载导入单,动作结束即落库
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::reference::AnalysisRequest;
use crate::domain::sample_import::{OriginalFile, SampleImport};
use crate::domain::types::ImportState;
use crate::engine::ImportWorkflow;
use crate::importer::error::ImportError;
use crate::importer::{
    HeaderEdit, SampleImporter, SampleImporterImpl, SampleRowEdit, UniversalFileParser,
};
use crate::repository::{
    RecordFactoryImpl, ReferenceCatalogImpl, ReferenceSeed, SampleImportRepository,
    SampleImportRepositoryImpl,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

type Importer =
    SampleImporterImpl<ReferenceCatalogImpl, RecordFactoryImpl, SampleImportRepositoryImpl, ConfigManager>;

/// 导入单列表项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub id: String,
    pub title: String,
    pub client_uid: String,
    pub state: ImportState,
    /// 样品行数
    pub rows: usize,
    /// 错误条数
    pub errors: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&SampleImport> for ImportSummary {
    fn from(doc: &SampleImport) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            client_uid: doc.client_uid.clone(),
            state: doc.state,
            rows: doc.sample_data.len(),
            errors: doc.errors().len(),
            created_at: doc.created_at,
        }
    }
}

/// 校验动作响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub import_id: String,
    /// 校验后的状态（valid / invalid）
    pub state: ImportState,
    /// 全量错误列表
    pub errors: Vec<String>,
    /// 当前可用的动作
    pub available_transitions: Vec<String>,
}

/// 导入动作响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportCommitResponse {
    pub import_id: String,
    pub state: ImportState,
    /// 新建样品申请单编号（按样品行顺序）
    pub request_ids: Vec<String>,
    /// 新建分析记录总数
    pub analysis_count: usize,
    /// 提交期间产生的行级诊断
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// 样品导入API
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    importer: Importer,
}

impl ImportApi {
    /// 打开数据库（必要时建表）并创建 ImportApi
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("无法打开数据库: {}", e)))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(format!("建表失败: {}", e)))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 共享已有连接（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::ConfigError(format!("创建ConfigManager失败: {}", e)))?;
        let importer = SampleImporterImpl::new(
            ReferenceCatalogImpl::from_connection(conn.clone()),
            RecordFactoryImpl::from_connection(conn.clone()),
            SampleImportRepositoryImpl::from_connection(conn.clone()),
            config,
            Box::new(UniversalFileParser),
        );
        Ok(Self { conn, importer })
    }

    fn load(&self, import_id: &str) -> ApiResult<SampleImport> {
        self.importer
            .imports()
            .find_by_id(import_id)?
            .ok_or_else(|| ImportError::NotFound(import_id.to_string()).into())
    }

    fn config(&self) -> ApiResult<ConfigManager> {
        ConfigManager::from_connection(self.conn.clone())
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    // ==========================================
    // 上传
    // ==========================================

    /// 从磁盘上传文件
    ///
    /// # 参数
    /// - client_uid: 所属客户
    /// - file_path: 文件路径（文件名取路径最后一段）
    ///
    /// # 返回
    /// - Ok(SampleImport): draft 状态的导入单,Errors 为解析期诊断
    /// - Err(ApiError): 文件不可读/为空/过短/过大,或客户不存在
    pub fn upload_file(&self, client_uid: &str, file_path: &Path) -> ApiResult<SampleImport> {
        let data = std::fs::read(file_path).map_err(ImportError::from)?;
        let filename = file_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        self.upload_bytes(client_uid, &filename, data)
    }

    /// 上传内存中的文件内容
    pub fn upload_bytes(
        &self,
        client_uid: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> ApiResult<SampleImport> {
        let doc = self
            .importer
            .upload(client_uid, OriginalFile::new(filename, data))?;
        info!(import_id = %doc.id, title = %doc.title, "文件上传完成");
        Ok(doc)
    }

    // ==========================================
    // 编辑
    // ==========================================

    /// 修改表头字段（valid/invalid 状态下自动重新校验）
    pub fn update_header(&self, import_id: &str, edit: HeaderEdit) -> ApiResult<SampleImport> {
        let mut doc = self.load(import_id)?;
        self.importer.edit_header(&mut doc, edit)?;
        Ok(doc)
    }

    /// 修改单个样品行（valid/invalid 状态下自动重新校验）
    pub fn update_sample_row(&self, import_id: &str, edit: SampleRowEdit) -> ApiResult<SampleImport> {
        let mut doc = self.load(import_id)?;
        self.importer.edit_sample_row(&mut doc, edit)?;
        Ok(doc)
    }

    /// 从原始文件重新解析
    pub fn reparse(&self, import_id: &str) -> ApiResult<SampleImport> {
        let mut doc = self.load(import_id)?;
        self.importer.resolve(&mut doc)?;
        Ok(doc)
    }

    // ==========================================
    // 状态动作
    // ==========================================

    /// 校验动作
    ///
    /// # 返回
    /// - Ok(ValidationResponse): 状态为 valid 或 invalid
    /// - Err(ApiError::InvalidStateTransition): 当前状态不允许校验
    pub fn validate(&self, import_id: &str) -> ApiResult<ValidationResponse> {
        let mut doc = self.load(import_id)?;
        let state = self.importer.validate(&mut doc)?;
        Ok(ValidationResponse {
            import_id: doc.id.clone(),
            state,
            errors: doc.errors().to_vec(),
            available_transitions: ImportWorkflow::available_transitions(&doc)
                .iter()
                .map(|t| t.to_string())
                .collect(),
        })
    }

    /// 导入动作: 逐行建单
    pub fn import(&self, import_id: &str) -> ApiResult<ImportCommitResponse> {
        let mut doc = self.load(import_id)?;
        let errors_before = doc.errors().len();
        let report = self.importer.import(&mut doc)?;

        let request_ids = RecordFactoryImpl::from_connection(self.conn.clone())
            .list_requests_by_import(&doc.id)?
            .into_iter()
            .filter(|request| report.request_uids.contains(&request.uid))
            .map(|request| request.request_id)
            .collect();

        Ok(ImportCommitResponse {
            import_id: doc.id.clone(),
            state: doc.state,
            request_ids,
            analysis_count: report.analysis_count,
            errors: doc.errors().iter().skip(errors_before).cloned().collect(),
        })
    }

    /// 取消动作
    pub fn cancel(&self, import_id: &str) -> ApiResult<SampleImport> {
        let mut doc = self.load(import_id)?;
        self.importer.cancel(&mut doc)?;
        Ok(doc)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, import_id: &str) -> ApiResult<SampleImport> {
        self.load(import_id)
    }

    /// 导入单列表（按创建时间倒序）
    pub fn list(
        &self,
        client_uid: Option<&str>,
        state: Option<ImportState>,
    ) -> ApiResult<Vec<ImportSummary>> {
        let docs = self.importer.imports().list(client_uid, state)?;
        Ok(docs.iter().map(ImportSummary::from).collect())
    }

    /// 导入单产生的样品申请单
    pub fn list_requests(&self, import_id: &str) -> ApiResult<Vec<AnalysisRequest>> {
        Ok(RecordFactoryImpl::from_connection(self.conn.clone()).list_requests_by_import(import_id)?)
    }

    // ==========================================
    // 参考数据与配置
    // ==========================================

    /// 写入参考数据种子
    pub fn seed_reference(&self, seed: &ReferenceSeed) -> ApiResult<()> {
        self.importer.catalog().seed(seed)?;
        Ok(())
    }

    /// 配置快照（JSON）
    pub fn config_snapshot(&self) -> ApiResult<String> {
        self.config()?
            .get_config_snapshot()
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// 覆写单个配置项
    pub fn set_config(&self, key: &str, value: &str) -> ApiResult<()> {
        if key.trim().is_empty() {
            return Err(ApiError::InvalidInput("配置键不能为空".to_string()));
        }
        self.config()?
            .set_global_value(key.trim(), value)
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }
}
