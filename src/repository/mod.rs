// ==========================================
// 样品导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod record_factory;
pub mod record_factory_impl;
pub mod reference_catalog;
pub mod reference_catalog_impl;
pub mod sample_import_repo;
pub mod sample_import_repo_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use record_factory::RecordFactory;
pub use record_factory_impl::RecordFactoryImpl;
pub use reference_catalog::{LookupKey, ReferenceCatalog};
pub use reference_catalog_impl::{ReferenceCatalogImpl, ReferenceSeed, SeedItem};
pub use sample_import_repo::{ImportKeyField, SampleImportRepository};
pub use sample_import_repo_impl::SampleImportRepositoryImpl;
