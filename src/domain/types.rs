// ==========================================
// 样品导入系统 - 领域类型定义
// ==========================================
// 职责: 导入单状态、工作流动作、参考目录类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导入单状态 (Import State)
// ==========================================
// 序列化格式: snake_case (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    Draft,     // 新建,尚未校验
    Invalid,   // 校验未通过
    Valid,     // 校验通过,可导入
    Imported,  // 已导入(终态)
    Cancelled, // 已取消(终态)
}

impl ImportState {
    /// 数据库存储值
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ImportState::Draft => "draft",
            ImportState::Invalid => "invalid",
            ImportState::Valid => "valid",
            ImportState::Imported => "imported",
            ImportState::Cancelled => "cancelled",
        }
    }

    /// 从数据库值解析（未知值按 draft 处理）
    pub fn from_db_str(raw: &str) -> Self {
        match raw.trim() {
            "invalid" => ImportState::Invalid,
            "valid" => ImportState::Valid,
            "imported" => ImportState::Imported,
            "cancelled" => ImportState::Cancelled,
            _ => ImportState::Draft,
        }
    }

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportState::Imported | ImportState::Cancelled)
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 工作流动作 (Transition)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Validate,
    Import,
    Cancel,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Validate => write!(f, "validate"),
            Transition::Import => write!(f, "import"),
            Transition::Cancel => write!(f, "cancel"),
        }
    }
}

// ==========================================
// 参考目录类型 (Catalog Type)
// ==========================================
// 红线: 封闭枚举,不允许以字符串动态指定类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogType {
    Client,
    Contact,
    Batch,
    SamplePoint,
    SampleType,
    SampleMatrix,
    ContainerType,
    Container,
    AnalysisSpec,
    SampleCondition,
    AnalysisService,
    AnalysisProfile,
}

impl CatalogType {
    /// reference_item 表中的 portal_type 值
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CatalogType::Client => "Client",
            CatalogType::Contact => "Contact",
            CatalogType::Batch => "Batch",
            CatalogType::SamplePoint => "SamplePoint",
            CatalogType::SampleType => "SampleType",
            CatalogType::SampleMatrix => "SampleMatrix",
            CatalogType::ContainerType => "ContainerType",
            CatalogType::Container => "Container",
            CatalogType::AnalysisSpec => "AnalysisSpec",
            CatalogType::SampleCondition => "SampleCondition",
            CatalogType::AnalysisService => "AnalysisService",
            CatalogType::AnalysisProfile => "AnalysisProfile",
        }
    }
}

impl fmt::Display for CatalogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_state_db_roundtrip() {
        for state in [
            ImportState::Draft,
            ImportState::Invalid,
            ImportState::Valid,
            ImportState::Imported,
            ImportState::Cancelled,
        ] {
            assert_eq!(ImportState::from_db_str(state.to_db_str()), state);
        }
        assert_eq!(ImportState::from_db_str("garbage"), ImportState::Draft);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ImportState::Imported.is_terminal());
        assert!(ImportState::Cancelled.is_terminal());
        assert!(!ImportState::Valid.is_terminal());
    }
}
