// ==========================================
// 样品导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 这里只放基础设施/流程错误;
//       数据问题一律走诊断列表 (Errors),不在此处
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件为空: {0}")]
    EmptyFile(String),

    #[error("文件行数过少: {lines} 行（至少 {min} 行）")]
    FileTooShort { lines: usize, min: usize },

    #[error("文件过大: {size} 字节（上限 {max} 字节）")]
    FileTooLarge { size: usize, max: usize },

    #[error("文件格式不支持: {0}（仅支持 .csv/.xlsx/.xls）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 流程错误 =====
    #[error("导入单不存在: {0}")]
    NotFound(String),

    #[error("动作不可用: action={action}, state={state}")]
    TransitionNotAllowed { action: String, state: String },

    #[error("守卫拒绝: {0}")]
    GuardRejected(String),

    #[error("样品行不存在: 第 {row} 行（共 {rows} 行）")]
    RowOutOfRange { row: usize, rows: usize },

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 下游错误 =====
    #[error("数据访问失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("序列化失败: {0}")]
    SerializationError(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::SerializationError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
