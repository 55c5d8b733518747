// ==========================================
// 样品导入系统 - 导入单领域模型
// ==========================================
// 职责: 导入单聚合根 SampleImport 及样品行
// 红线: 原始文件只在构造时写入一次
// 红线: 原始行 (RawSampleRow) 与物化行 (SampleRow) 类型分离,不混存
// ==========================================

use crate::domain::diagnostic::Diagnostic;
use crate::domain::types::ImportState;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// OriginalFile - 上传的原始文件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalFile {
    filename: String,
    data: Vec<u8>,
}

impl OriginalFile {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 文本内容（去掉 UTF-8 BOM,非法字节按替换字符处理）
    pub fn text(&self) -> Cow<'_, str> {
        let bytes = self.data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&self.data);
        String::from_utf8_lossy(bytes)
    }

    /// 行数（与上传页"行数过少"检查一致）
    pub fn line_count(&self) -> usize {
        self.text().lines().count()
    }

    /// 是否为 Excel 工作簿（按扩展名判断）
    pub fn is_spreadsheet(&self) -> bool {
        let lower = self.filename.to_lowercase();
        lower.ends_with(".xlsx") || lower.ends_with(".xls")
    }
}

// ==========================================
// CcContact - 抄送联系人
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcContact {
    pub report_names: Vec<String>,
    pub report_emails: Vec<String>,
    pub invoice_names: Vec<String>,
    pub invoice_emails: Vec<String>,
}

impl CcContact {
    pub fn is_empty(&self) -> bool {
        self.report_names.is_empty()
            && self.report_emails.is_empty()
            && self.invoice_names.is_empty()
            && self.invoice_emails.is_empty()
    }
}

// ==========================================
// FieldValue - 物化后的字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Uid(String),
    Uids(Vec<String>),
    DateTime(NaiveDateTime),
}

/// 日期时间的存储/展示格式
pub const STORED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(v) | FieldValue::Uid(v) => write!(f, "{}", v),
            FieldValue::Flag(v) => write!(f, "{}", if *v { "1" } else { "" }),
            FieldValue::Uids(v) => write!(f, "{}", v.join(",")),
            FieldValue::DateTime(v) => write!(f, "{}", v.format(STORED_DATETIME_FORMAT)),
        }
    }
}

// ==========================================
// RawSampleRow - 样品原始行（物化前）
// ==========================================
// 用途: 扫描器产物,列名 → 原始字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSampleRow {
    pub row_number: usize,
    pub cells: Vec<(String, String)>,
}

impl RawSampleRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }
}

// ==========================================
// SampleRow - 样品行（物化后）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRow {
    pub sid: String,                          // 源文件第 0 列的行标签
    pub fields: BTreeMap<String, FieldValue>, // 目标单据字段
    pub analyses: Vec<String>,                // 勾选的分析项关键字
    pub profiles: Vec<String>,                // 勾选的分析组合标题/键
}

impl SampleRow {
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            ..Default::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn selection_count(&self) -> usize {
        self.analyses.len() + self.profiles.len()
    }
}

// ==========================================
// DeclaredCount - 表头声明的样品数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredCount {
    Undeclared,
    Count(usize),
    /// 无法解析的原值
    Invalid(String),
}

// ==========================================
// SampleImport - 导入单（聚合根）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleImport {
    // ===== 标识 =====
    pub id: String,
    pub title: String,
    pub client_uid: String,

    // ===== 原始文件（只读）=====
    original_file: OriginalFile,

    // ===== 表头字段 =====
    pub filename: Option<String>,
    pub client_name: Option<String>,
    pub client_id: Option<String>,
    pub client_order_number: Option<String>,
    pub client_reference: Option<String>,
    pub nr_samples: Option<usize>,
    /// `No of Samples` 无法解析时保留原值
    pub nr_samples_invalid: Option<String>,
    pub contact_uid: Option<String>,
    pub cc_contacts: Vec<CcContact>,

    // ===== 批次 =====
    pub batch_uid: Option<String>,
    pub client_batch_id: Option<String>,

    // ===== 样品数据 =====
    pub sample_data: Vec<SampleRow>,

    // ===== 错误与状态 =====
    errors: Vec<String>,
    pub state: ImportState,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub date_validated: Option<DateTime<Utc>>,
    pub date_imported: Option<DateTime<Utc>>,
}

impl SampleImport {
    /// 创建空导入单,原始文件在此一次性写入
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        client_uid: impl Into<String>,
        original_file: OriginalFile,
    ) -> Self {
        let filename = Some(original_file.filename().to_string()).filter(|f| !f.is_empty());
        Self {
            id: id.into(),
            title: title.into(),
            client_uid: client_uid.into(),
            original_file,
            filename,
            client_name: None,
            client_id: None,
            client_order_number: None,
            client_reference: None,
            nr_samples: None,
            nr_samples_invalid: None,
            contact_uid: None,
            cc_contacts: Vec::new(),
            batch_uid: None,
            client_batch_id: None,
            sample_data: Vec::new(),
            errors: Vec::new(),
            state: ImportState::Draft,
            created_at: Utc::now(),
            date_validated: None,
            date_imported: None,
        }
    }

    pub fn original_file(&self) -> &OriginalFile {
        &self.original_file
    }

    pub fn declared_count(&self) -> DeclaredCount {
        match (&self.nr_samples_invalid, self.nr_samples) {
            (Some(raw), _) => DeclaredCount::Invalid(raw.clone()),
            (None, Some(n)) => DeclaredCount::Count(n),
            (None, None) => DeclaredCount::Undeclared,
        }
    }

    /// 校验动作的守卫: 必须已上传非空文件
    pub fn has_file_content(&self) -> bool {
        !self.original_file.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// 合并步骤诊断（按产生顺序追加）
    pub fn merge_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.errors
            .extend(diagnostics.into_iter().map(|d| d.to_string()));
    }

    /// 从持久化数据恢复错误列表
    pub fn restore_errors(&mut self, errors: Vec<String>) {
        self.errors = errors;
    }
}
