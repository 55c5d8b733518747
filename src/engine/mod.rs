// ==========================================
// 样品导入系统 - 引擎层
// ==========================================
// 职责: 导入单工作流（状态机）
// 红线: Engine 不拼 SQL
// ==========================================

pub mod workflow;

// 重导出核心引擎
pub use workflow::ImportWorkflow;
