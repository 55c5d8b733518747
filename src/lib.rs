// ==========================================
// 样品导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 实验室样品登记文件的解析、校验与建单
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 导入单状态机
pub mod engine;

// 导入层 - 外部文件
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CatalogType, ImportState, Transition};

// 领域实体
pub use domain::sample_import::{CcContact, FieldValue, OriginalFile, SampleImport, SampleRow};

// 引擎
pub use engine::ImportWorkflow;

// API
pub use api::{ApiError, ApiResult, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "样品导入系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
