// ==========================================
// 样品导入系统 - 参考目录 Trait
// ==========================================
// 职责: 定义导入核心所需的只读查询接口（不包含实现）
// 红线: 目录类型为封闭枚举,不接受字符串类型名
// ==========================================

use crate::domain::reference::{
    AnalysisProfile, AnalysisService, Batch, Client, Contact, ReferenceRecord,
};
use crate::domain::types::CatalogType;
use crate::repository::error::RepositoryResult;

// ==========================================
// LookupKey - 查询键
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey<'a> {
    Title(&'a str),
    Uid(&'a str),
    /// 仅 AnalysisService
    Keyword(&'a str),
    /// 仅 AnalysisProfile
    ProfileKey(&'a str),
}

impl LookupKey<'_> {
    pub fn value(&self) -> &str {
        match self {
            LookupKey::Title(v)
            | LookupKey::Uid(v)
            | LookupKey::Keyword(v)
            | LookupKey::ProfileKey(v) => v,
        }
    }
}

// ==========================================
// ReferenceCatalog Trait
// ==========================================
// 用途: 客户/联系人/批次/设置项/分析项/分析组合查询
// 实现者: ReferenceCatalogImpl（使用 rusqlite）
pub trait ReferenceCatalog: Send + Sync {
    /// 按目录类型与查询键查找（精确匹配,可返回多条）
    fn lookup(&self, catalog: CatalogType, key: LookupKey<'_>)
        -> RepositoryResult<Vec<ReferenceRecord>>;

    /// 按 UID 查客户
    fn find_client(&self, client_uid: &str) -> RepositoryResult<Option<Client>>;

    /// 客户的全部联系人（按创建顺序）
    fn list_contacts(&self, client_uid: &str) -> RepositoryResult<Vec<Contact>>;

    /// 客户下按标题查批次
    fn find_batch_by_title(&self, client_uid: &str, title: &str)
        -> RepositoryResult<Option<Batch>>;

    /// 全部分析项关键字
    fn analysis_keywords(&self) -> RepositoryResult<Vec<String>>;

    /// 按关键字/标题/UID 查分析项
    fn find_service(&self, key: LookupKey<'_>) -> RepositoryResult<Option<AnalysisService>>;

    /// 全部分析组合（含成员分析项 UID）
    fn list_profiles(&self) -> RepositoryResult<Vec<AnalysisProfile>>;

    /// 在允许的目录类型中依次查找,第一个有结果的类型胜出
    fn lookup_first(
        &self,
        allowed: &[CatalogType],
        key: LookupKey<'_>,
    ) -> RepositoryResult<Vec<ReferenceRecord>> {
        for catalog in allowed {
            let found = self.lookup(*catalog, key)?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    /// 按联系人 UID 查客户下的联系人
    fn find_contact(&self, client_uid: &str, contact_uid: &str) -> RepositoryResult<Option<Contact>> {
        Ok(self
            .list_contacts(client_uid)?
            .into_iter()
            .find(|c| c.uid == contact_uid))
    }
}
