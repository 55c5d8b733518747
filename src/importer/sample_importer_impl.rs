// ==========================================
// 样品导入系统 - 导入器实现
// ==========================================
// 职责: 串联上传、解析、校验、导入、取消、人工编辑
// 流程: 解析 → 分节扫描 → 表头 → 批次 → 样品物化 → [校验] → [提交]
// 红线: 每个动作结束时落库;数据问题只进 Errors,不返回 Err
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::sample_import::{OriginalFile, SampleImport};
use crate::domain::types::{ImportState, Transition};
use crate::engine::workflow::ImportWorkflow;
use crate::importer::batch_resolver::BatchResolver;
use crate::importer::committer::Committer;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::header_resolver::{HeaderResolution, HeaderResolver};
use crate::importer::sample_importer_trait::{
    CommitReport, FileParser, HeaderEdit, SampleImporter, SampleRowEdit,
};
use crate::importer::sample_materializer::SampleMaterializer;
use crate::importer::section_scanner::SectionScanner;
use crate::importer::validator::Validator;
use crate::repository::error::RepositoryError;
use crate::repository::record_factory::RecordFactory;
use crate::repository::reference_catalog::ReferenceCatalog;
use crate::repository::sample_import_repo::SampleImportRepository;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// SampleImporterImpl
// ==========================================
pub struct SampleImporterImpl<C, F, R, K>
where
    C: ReferenceCatalog,
    F: RecordFactory,
    R: SampleImportRepository,
    K: ImportConfigReader,
{
    // 数据访问层
    catalog: C,
    factory: F,
    imports: R,

    // 配置读取器
    config: K,

    // 文件解析器
    file_parser: Box<dyn FileParser>,
}

impl<C, F, R, K> SampleImporterImpl<C, F, R, K>
where
    C: ReferenceCatalog,
    F: RecordFactory,
    R: SampleImportRepository,
    K: ImportConfigReader,
{
    /// 创建导入器
    ///
    /// # 参数
    /// - catalog: 参考目录（只读查询）
    /// - factory: 建单工厂（批次/样品申请单）
    /// - imports: 导入单仓储
    /// - config: 配置读取器
    /// - file_parser: 文件解析器
    pub fn new(
        catalog: C,
        factory: F,
        imports: R,
        config: K,
        file_parser: Box<dyn FileParser>,
    ) -> Self {
        Self {
            catalog,
            factory,
            imports,
            config,
            file_parser,
        }
    }

    pub fn imports(&self) -> &R {
        &self.imports
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// 每个动作开始时读取一次配置
    fn settings(&self) -> ImportResult<ImportSettings> {
        ImportSettings::load(&self.config).map_err(|e| ImportError::ConfigReadError {
            key: "import/*".to_string(),
            message: e.to_string(),
        })
    }

    /// 上传前置检查: 空文件 / 过大 / 行数过少
    fn check_upload(&self, file: &OriginalFile, settings: &ImportSettings) -> ImportResult<()> {
        if file.is_empty() {
            return Err(ImportError::EmptyFile(file.filename().to_string()));
        }
        if file.size() > settings.max_file_size_bytes {
            return Err(ImportError::FileTooLarge {
                size: file.size(),
                max: settings.max_file_size_bytes,
            });
        }
        if !file.is_spreadsheet() {
            let lines = file.line_count();
            if lines < settings.min_file_lines {
                return Err(ImportError::FileTooShort {
                    lines,
                    min: settings.min_file_lines,
                });
            }
        }
        Ok(())
    }

    /// 由文件名生成唯一标题: <stem>-<n>
    fn unique_title(&self, filename: &str) -> ImportResult<String> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("import");
        let mut n = 1;
        loop {
            let title = format!("{}-{}", stem, n);
            if !self.imports.title_exists(&title)? {
                return Ok(title);
            }
            n += 1;
        }
    }

    /// 清空 Errors → 全量复核 → 落到 valid / invalid
    fn run_validation(&self, doc: &mut SampleImport, settings: &ImportSettings) -> ImportResult<ImportState> {
        doc.clear_errors();
        let outcome = Validator::new(&self.catalog, &self.imports, settings).validate(doc)?;
        doc.merge_diagnostics(outcome.diagnostics);
        Ok(ImportWorkflow::finish_validation(doc))
    }

    /// 编辑保存后的统一收尾: 落库,必要时自动重新校验
    fn save_after_edit(&self, doc: &mut SampleImport, settings: &ImportSettings) -> ImportResult<()> {
        if ImportWorkflow::should_revalidate_after_edit(doc) {
            let state = self.run_validation(doc, settings)?;
            debug!(import_id = %doc.id, state = %state, "编辑后自动重新校验");
        }
        self.imports.update(doc)?;
        Ok(())
    }

    fn ensure_editable(doc: &SampleImport, action: &str) -> ImportResult<()> {
        if doc.state.is_terminal() {
            return Err(ImportError::TransitionNotAllowed {
                action: action.to_string(),
                state: doc.state.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_with(&self, doc: &mut SampleImport, settings: &ImportSettings) -> ImportResult<()> {
        doc.clear_errors();

        // ===== 分节扫描 =====
        let rows = self.file_parser.rows(doc.original_file())?;
        let (scanned, diagnostics) = SectionScanner::scan(rows)?.into_parts();
        doc.merge_diagnostics(diagnostics);

        // ===== 表头 =====
        let header = match scanned.header {
            Some(header) => {
                let (resolution, diagnostics) = HeaderResolver::new(&self.catalog, settings)
                    .resolve(&doc.client_uid, header)?
                    .into_parts();
                doc.merge_diagnostics(diagnostics);
                resolution
            }
            None => HeaderResolution::default(),
        };
        header.apply_to(doc);

        // ===== 批次 =====
        let (batch, diagnostics) = BatchResolver::new(&self.catalog, &self.factory)
            .resolve(&doc.client_uid, scanned.batch)?
            .into_parts();
        doc.merge_diagnostics(diagnostics);
        doc.batch_uid = batch.batch_uid;
        doc.client_batch_id = batch.client_batch_id;

        // ===== 样品 =====
        let (samples, diagnostics) = SampleMaterializer::new(&self.catalog, settings)
            .materialize(scanned.samples, doc.declared_count())?
            .into_parts();
        doc.merge_diagnostics(diagnostics);
        doc.sample_data = samples.rows;
        doc.nr_samples = samples.nr_samples;

        info!(
            import_id = %doc.id,
            rows = doc.sample_data.len(),
            errors = doc.errors().len(),
            batch_created = batch.created,
            "导入单解析完成"
        );
        Ok(())
    }
}

impl<C, F, R, K> SampleImporter for SampleImporterImpl<C, F, R, K>
where
    C: ReferenceCatalog,
    F: RecordFactory,
    R: SampleImportRepository,
    K: ImportConfigReader,
{
    #[instrument(skip(self, file), fields(filename = %file.filename(), size = file.size()))]
    fn upload(&self, client_uid: &str, file: OriginalFile) -> ImportResult<SampleImport> {
        let settings = self.settings()?;
        self.check_upload(&file, &settings)?;

        if self.catalog.find_client(client_uid)?.is_none() {
            return Err(RepositoryError::NotFound {
                entity: "Client".to_string(),
                id: client_uid.to_string(),
            }
            .into());
        }

        let title = self.unique_title(file.filename())?;
        let mut doc = SampleImport::new(Uuid::new_v4().to_string(), title, client_uid, file);
        self.imports.insert(&doc)?;
        info!(import_id = %doc.id, title = %doc.title, "导入单已创建");

        self.resolve_with(&mut doc, &settings)?;
        self.imports.update(&doc)?;
        Ok(doc)
    }

    #[instrument(skip(self, doc), fields(import_id = %doc.id))]
    fn resolve(&self, doc: &mut SampleImport) -> ImportResult<()> {
        Self::ensure_editable(doc, "resolve")?;
        let settings = self.settings()?;
        self.resolve_with(doc, &settings)?;
        self.save_after_edit(doc, &settings)
    }

    #[instrument(skip(self, doc), fields(import_id = %doc.id, state = %doc.state))]
    fn validate(&self, doc: &mut SampleImport) -> ImportResult<ImportState> {
        ImportWorkflow::ensure_available(doc, Transition::Validate)?;
        let settings = self.settings()?;
        let state = self.run_validation(doc, &settings)?;
        self.imports.update(doc)?;
        info!(state = %state, errors = doc.errors().len(), "校验完成");
        Ok(state)
    }

    #[instrument(skip(self, doc), fields(import_id = %doc.id, state = %doc.state))]
    fn import(&self, doc: &mut SampleImport) -> ImportResult<CommitReport> {
        ImportWorkflow::ensure_available(doc, Transition::Import)?;
        let (report, diagnostics) = Committer::new(&self.catalog, &self.factory)
            .commit(doc)?
            .into_parts();
        if !diagnostics.is_empty() {
            warn!(count = diagnostics.len(), "提交期间有分析项/分析组合未能解析");
        }
        doc.merge_diagnostics(diagnostics);
        ImportWorkflow::mark_imported(doc);
        self.imports.update(doc)?;
        Ok(report)
    }

    #[instrument(skip(self, doc), fields(import_id = %doc.id, state = %doc.state))]
    fn cancel(&self, doc: &mut SampleImport) -> ImportResult<()> {
        ImportWorkflow::ensure_available(doc, Transition::Cancel)?;
        ImportWorkflow::mark_cancelled(doc);
        self.imports.update(doc)?;
        Ok(())
    }

    #[instrument(skip(self, doc, edit), fields(import_id = %doc.id))]
    fn edit_header(&self, doc: &mut SampleImport, edit: HeaderEdit) -> ImportResult<()> {
        Self::ensure_editable(doc, "edit_header")?;
        if edit.is_empty() {
            return Ok(());
        }
        let settings = self.settings()?;

        let assign = |slot: &mut Option<String>, value: Option<String>| {
            if let Some(value) = value {
                *slot = Some(value).filter(|v| !v.is_empty());
            }
        };
        assign(&mut doc.client_name, edit.client_name);
        assign(&mut doc.client_id, edit.client_id);
        assign(&mut doc.client_order_number, edit.client_order_number);
        assign(&mut doc.client_reference, edit.client_reference);
        assign(&mut doc.contact_uid, edit.contact_uid);
        if let Some(cc_contacts) = edit.cc_contacts {
            doc.cc_contacts = cc_contacts;
        }

        self.save_after_edit(doc, &settings)
    }

    #[instrument(skip(self, doc, edit), fields(import_id = %doc.id, row = edit.row))]
    fn edit_sample_row(&self, doc: &mut SampleImport, edit: SampleRowEdit) -> ImportResult<()> {
        Self::ensure_editable(doc, "edit_sample_row")?;
        let rows = doc.sample_data.len();
        let row = edit
            .row
            .checked_sub(1)
            .and_then(|idx| doc.sample_data.get_mut(idx))
            .ok_or(ImportError::RowOutOfRange { row: edit.row, rows })?;

        for (name, value) in edit.fields {
            match value {
                Some(value) => {
                    row.fields.insert(name, value);
                }
                None => {
                    row.fields.remove(&name);
                }
            }
        }
        if let Some(analyses) = edit.analyses {
            row.analyses = analyses;
        }
        if let Some(profiles) = edit.profiles {
            row.profiles = profiles;
        }

        let settings = self.settings()?;
        self.save_after_edit(doc, &settings)
    }
}
