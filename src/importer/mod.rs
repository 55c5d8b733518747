// ==========================================
// 样品导入系统 - 导入层
// ==========================================
// 职责: 上传文件 → 导入单 → 校验 → 样品申请单
// 支持: CSV, Excel（首个工作表）
// 流程: 分节扫描 → 表头 → 批次 → 样品物化 → 校验 → 提交
// ==========================================

// 模块声明
pub mod batch_resolver;
pub mod committer;
pub mod error;
pub mod field_munger;
pub mod file_parser;
pub mod header_resolver;
pub mod sample_importer_impl;
pub mod sample_importer_trait;
pub mod sample_materializer;
pub mod section_scanner;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

// 重导出核心类型
pub use batch_resolver::{BatchResolution, BatchResolver};
pub use committer::Committer;
pub use error::{ImportError, ImportResult};
pub use field_munger::{is_truthy, FieldMunger};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use header_resolver::{HeaderResolution, HeaderResolver};
pub use sample_importer_impl::SampleImporterImpl;
pub use sample_materializer::{MaterializedSamples, SampleMaterializer};
pub use section_scanner::{ScannedFile, SectionMap, SectionScanner};
pub use validator::Validator;

// 重导出 Trait 接口
pub use sample_importer_trait::{
    CommitReport, FileParser, HeaderEdit, SampleImporter, SampleRowEdit,
};
