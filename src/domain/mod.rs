// ==========================================
// 样品导入系统 - 领域模型层
// ==========================================
// 职责: 定义导入单、样品行、参考记录、字段表、诊断类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod diagnostic;
pub mod reference;
pub mod sample_import;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use diagnostic::{Diagnostic, Outcome};
pub use reference::{
    AnalysisProfile, AnalysisRequest, AnalysisService, Batch, Client, Contact, NewAnalysisRequest,
    NewBatch, ReferenceRecord,
};
pub use sample_import::{
    CcContact, DeclaredCount, FieldValue, OriginalFile, RawSampleRow, SampleImport, SampleRow,
};
pub use schema::{field_spec, FieldKind, FieldSpec, REQUEST_SCHEMA, TITLE_RESOLVED_COLUMNS};
pub use types::{CatalogType, ImportState, Transition};
