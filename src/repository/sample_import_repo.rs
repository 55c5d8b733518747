// ==========================================
// 样品导入系统 - 导入单 Repository Trait
// ==========================================
// 职责: 导入单持久化接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::sample_import::SampleImport;
use crate::domain::types::ImportState;
use crate::repository::error::RepositoryResult;

/// 需要跨导入单去重的表头字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKeyField {
    ClientOrderNumber,
    ClientReference,
}

impl ImportKeyField {
    pub fn column(&self) -> &'static str {
        match self {
            ImportKeyField::ClientOrderNumber => "client_order_number",
            ImportKeyField::ClientReference => "client_reference",
        }
    }

    /// 用户可见标签
    pub fn label(&self) -> &'static str {
        match self {
            ImportKeyField::ClientOrderNumber => "Client Order Number",
            ImportKeyField::ClientReference => "Client Reference",
        }
    }
}

// ==========================================
// SampleImportRepository Trait
// ==========================================
// 实现者: SampleImportRepositoryImpl（使用 rusqlite）
pub trait SampleImportRepository: Send + Sync {
    /// 新增导入单（含原始文件）
    fn insert(&self, doc: &SampleImport) -> RepositoryResult<()>;

    /// 保存导入单的派生字段与状态（原始文件不改写）
    fn update(&self, doc: &SampleImport) -> RepositoryResult<()>;

    /// 按 ID 查询
    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<SampleImport>>;

    /// 列表（可按客户/状态过滤,按创建时间倒序）
    fn list(
        &self,
        client_uid: Option<&str>,
        state: Option<ImportState>,
    ) -> RepositoryResult<Vec<SampleImport>>;

    /// 查找字段值相同、处于给定状态的其他导入单标题
    fn find_other_titles(
        &self,
        field: ImportKeyField,
        value: &str,
        states: &[ImportState],
        exclude_id: &str,
    ) -> RepositoryResult<Vec<String>>;

    /// 标题是否已被占用
    fn title_exists(&self, title: &str) -> RepositoryResult<bool>;
}
