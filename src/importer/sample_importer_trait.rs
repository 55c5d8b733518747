// ==========================================
// 样品导入系统 - 导入器 Trait
// ==========================================
// 职责: 定义导入流程接口（不包含实现）
// 红线: 所有动作同步执行,一次调用内完成
// ==========================================

use crate::domain::sample_import::{CcContact, FieldValue, OriginalFile, SampleImport};
use crate::domain::types::ImportState;
use crate::importer::error::ImportResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 非空行流（每行为已 TRIM 的单元格列表）
pub type RowStream<'a> = Box<dyn Iterator<Item = ImportResult<Vec<String>>> + 'a>;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 把原始文件切成惰性的非空行序列
    fn rows<'a>(&self, file: &'a OriginalFile) -> ImportResult<RowStream<'a>>;
}

// ==========================================
// HeaderEdit - 表头字段人工修改
// ==========================================
// None 表示不修改该字段; Some("") 表示清空
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEdit {
    pub client_name: Option<String>,
    pub client_id: Option<String>,
    pub client_order_number: Option<String>,
    pub client_reference: Option<String>,
    pub contact_uid: Option<String>,
    pub cc_contacts: Option<Vec<CcContact>>,
}

impl HeaderEdit {
    pub fn is_empty(&self) -> bool {
        *self == HeaderEdit::default()
    }
}

// ==========================================
// SampleRowEdit - 样品行人工修改
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRowEdit {
    /// 行号（1 起）
    pub row: usize,
    /// 覆写的字段; 值为 None 表示删除该字段
    pub fields: BTreeMap<String, Option<FieldValue>>,
    pub analyses: Option<Vec<String>>,
    pub profiles: Option<Vec<String>>,
}

// ==========================================
// CommitReport - 提交结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub request_uids: Vec<String>,
    pub analysis_count: usize,
}

// ==========================================
// SampleImporter Trait
// ==========================================
// 用途: 导入单全生命周期入口
// 实现者: SampleImporterImpl
pub trait SampleImporter {
    /// 上传文件并创建导入单,随即执行一次解析（表头/批次/样品）
    ///
    /// # 返回
    /// - Ok(SampleImport): 处于 draft 状态,Errors 中为解析期诊断
    /// - Err: 文件为空/过短/过大/不可读,或数据库错误
    fn upload(&self, client_uid: &str, file: OriginalFile) -> ImportResult<SampleImport>;

    /// 从原始文件重新解析全部派生字段（保存动作）
    fn resolve(&self, doc: &mut SampleImport) -> ImportResult<()>;

    /// 校验动作: 清空 Errors 后全量复核,落到 valid 或 invalid
    fn validate(&self, doc: &mut SampleImport) -> ImportResult<ImportState>;

    /// 导入动作: 仅 valid 可用,逐行创建样品申请单
    fn import(&self, doc: &mut SampleImport) -> ImportResult<CommitReport>;

    /// 取消动作
    fn cancel(&self, doc: &mut SampleImport) -> ImportResult<()>;

    /// 人工修改表头;valid/invalid 状态下自动重新校验
    fn edit_header(&self, doc: &mut SampleImport, edit: HeaderEdit) -> ImportResult<()>;

    /// 人工修改样品行;valid/invalid 状态下自动重新校验
    fn edit_sample_row(&self, doc: &mut SampleImport, edit: SampleRowEdit) -> ImportResult<()>;
}
