// ==========================================
// 样品导入系统 - 参考数据领域模型
// ==========================================
// 职责: 客户/联系人/批次/分析项/分析组合等参考记录
// 红线: 导入核心只读这些记录,仅允许新建批次与样品申请单
// ==========================================

use crate::domain::sample_import::FieldValue;
use crate::domain::types::CatalogType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ReferenceRecord - 目录查询结果（通用）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub uid: String,
    pub catalog: CatalogType,
    pub title: String,
    pub keyword: Option<String>,     // 仅 AnalysisService
    pub profile_key: Option<String>, // 仅 AnalysisProfile
}

// ==========================================
// Client - 客户
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub uid: String,
    pub name: String,      // 客户名称（Title）
    pub client_id: String, // 客户编号
}

// ==========================================
// Contact - 客户联系人
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub uid: String,
    pub client_uid: String,
    pub fullname: String, // 即 Title
    pub email: Option<String>,
    pub cc_contact_uids: Vec<String>, // 默认抄送联系人
}

// ==========================================
// Batch - 批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub uid: String,
    pub client_uid: String,
    pub title: String,
    pub description: Option<String>,
    pub client_batch_id: Option<String>,
    pub batch_date: DateTime<Utc>,
    pub extra_fields: BTreeMap<String, String>, // 批次表头中其余的键值
}

/// 新建批次请求（由批次解析器发起）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatch {
    pub client_uid: String,
    pub title: String,
    pub fields: BTreeMap<String, String>,
    pub batch_date: DateTime<Utc>,
}

// ==========================================
// AnalysisService - 分析项
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisService {
    pub uid: String,
    pub title: String,
    pub keyword: String,
}

// ==========================================
// AnalysisProfile - 分析组合
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisProfile {
    pub uid: String,
    pub title: String,
    pub profile_key: Option<String>,
    pub service_uids: Vec<String>,
}

impl AnalysisProfile {
    /// 标题、键或 UID 任一匹配
    pub fn matches(&self, value: &str) -> bool {
        self.title == value || self.uid == value || self.profile_key.as_deref() == Some(value)
    }

    /// 样品行中可作为勾选列名的标识（标题 + 键）
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title.as_str()).chain(self.profile_key.as_deref())
    }
}

// ==========================================
// AnalysisRequest - 已创建的样品申请单
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub uid: String,
    pub request_id: String, // 人可读编号
    pub client_uid: String,
    pub import_id: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub service_uids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// 新建样品申请单请求（由提交器发起）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnalysisRequest {
    pub client_uid: String,
    pub import_id: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub service_uids: Vec<String>,
}
