// ==========================================
// 样品导入系统 - 导入单校验器
// ==========================================
// 职责: 以当前参考数据复核已物化的导入单
// 规则:
//   (a) 表头: 客户名/编号、订单号与委托编号去重、联系人（必填）、抄送
//   (b) 样品行: 行数与声明一致、字段复核、分析项关键字、分析组合、至少一项勾选
// 红线: 只读不写;可重入,同一输入得到同一诊断列表
// ==========================================

use crate::config::ImportSettings;
use crate::domain::diagnostic::{Diagnostic, Outcome};
use crate::domain::sample_import::{DeclaredCount, SampleImport, SampleRow};
use crate::domain::schema::{is_document_field, REQUEST_SCHEMA};
use crate::domain::types::ImportState;
use crate::importer::field_munger::{FieldMunger, MSG_INVALID};
use crate::importer::header_resolver::invalid_sample_count;
use crate::importer::sample_materializer::{count_mismatch, NO_SAMPLE_DATA_ERROR};
use crate::repository::error::RepositoryResult;
use crate::repository::reference_catalog::ReferenceCatalog;
use crate::repository::sample_import_repo::{ImportKeyField, SampleImportRepository};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, instrument};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-']+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("邮箱正则非法")
});

const MSG_CONTACT_REQUIRED: &str = "Contact field requires a value";

/// 参与去重的导入单状态
const COMMITTED_STATES: [ImportState; 2] = [ImportState::Valid, ImportState::Imported];

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

pub struct Validator<'a, C, R>
where
    C: ReferenceCatalog + ?Sized,
    R: SampleImportRepository + ?Sized,
{
    catalog: &'a C,
    imports: &'a R,
    munger: FieldMunger<'a, C>,
}

impl<'a, C, R> Validator<'a, C, R>
where
    C: ReferenceCatalog + ?Sized,
    R: SampleImportRepository + ?Sized,
{
    pub fn new(catalog: &'a C, imports: &'a R, settings: &'a ImportSettings) -> Self {
        Self {
            catalog,
            imports,
            munger: FieldMunger::new(catalog, settings),
        }
    }

    /// 诊断为空即可进入 valid
    #[instrument(skip(self, doc), fields(import_id = %doc.id))]
    pub fn validate(&self, doc: &SampleImport) -> RepositoryResult<Outcome<()>> {
        let mut diagnostics = Vec::new();
        self.validate_header(doc, &mut diagnostics)?;
        self.validate_samples(doc, &mut diagnostics)?;
        debug!(errors = diagnostics.len(), "校验完成");
        Ok(Outcome::new((), diagnostics))
    }

    // ==========================================
    // (a) 表头
    // ==========================================
    fn validate_header(
        &self,
        doc: &SampleImport,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> RepositoryResult<()> {
        let client = self.catalog.find_client(&doc.client_uid)?;
        let (name, client_id) = client
            .as_ref()
            .map(|c| (c.name.as_str(), c.client_id.as_str()))
            .unwrap_or_default();

        let given_name = doc.client_name.as_deref().unwrap_or_default();
        if client.is_none() || given_name != name {
            diagnostics.push(Diagnostic::document(format!(
                "Client name: value is invalid ({}).",
                given_name
            )));
        }
        let given_id = doc.client_id.as_deref().unwrap_or_default();
        if client.is_none() || given_id != client_id {
            diagnostics.push(Diagnostic::document(format!(
                "Client ID: value is invalid ({}).",
                given_id
            )));
        }

        // ===== 订单号 / 委托编号去重 =====
        let keys = [
            (ImportKeyField::ClientOrderNumber, &doc.client_order_number),
            (ImportKeyField::ClientReference, &doc.client_reference),
        ];
        for (field, value) in keys {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let others = self
                .imports
                .find_other_titles(field, value, &COMMITTED_STATES, &doc.id)?;
            if !others.is_empty() {
                debug!(field = field.label(), value, others = ?others, "重复的导入键");
                diagnostics.push(Diagnostic::document(format!(
                    "{}: already used by existing import ({}).",
                    field.label(),
                    value
                )));
            }
        }

        // ===== 联系人 =====
        let contacts = self.catalog.list_contacts(&doc.client_uid)?;
        match doc.contact_uid.as_deref() {
            Some(contact_uid) if !contacts.iter().any(|c| c.uid == contact_uid) => {
                diagnostics.push(Diagnostic::document(format!(
                    "Contact: value is invalid ({}).",
                    contact_uid
                )));
            }
            Some(_) => {}
            None => diagnostics.push(Diagnostic::document(MSG_CONTACT_REQUIRED)),
        }

        // ===== 抄送 =====
        let names: HashSet<&str> = contacts.iter().map(|c| c.fullname.as_str()).collect();
        for cc in &doc.cc_contacts {
            let name_lists = [
                ("CC Names - Report", &cc.report_names),
                ("CC Names - Invoice", &cc.invoice_names),
            ];
            for (label, list) in name_lists {
                for name in list.iter().filter(|n| !names.contains(n.as_str())) {
                    diagnostics.push(Diagnostic::document(format!(
                        "{}: value is invalid ({}).",
                        label, name
                    )));
                }
            }

            let email_lists = [
                ("CC Emails - Report", &cc.report_emails),
                ("CC Emails - Invoice", &cc.invoice_emails),
            ];
            for (label, list) in email_lists {
                for email in list.iter().filter(|e| !is_valid_email(e)) {
                    diagnostics.push(Diagnostic::document(format!(
                        "{}: value is invalid ({}).",
                        label, email
                    )));
                }
            }
        }
        Ok(())
    }

    // ==========================================
    // (b) 样品行
    // ==========================================
    fn validate_samples(
        &self,
        doc: &SampleImport,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> RepositoryResult<()> {
        if doc.sample_data.is_empty() {
            diagnostics.push(Diagnostic::document(NO_SAMPLE_DATA_ERROR));
        }
        match doc.declared_count() {
            DeclaredCount::Invalid(raw) => diagnostics.push(invalid_sample_count(&raw)),
            DeclaredCount::Count(declared) if declared != doc.sample_data.len() => {
                diagnostics.push(count_mismatch(declared, doc.sample_data.len()));
            }
            _ => {}
        }

        let keywords: HashSet<String> = self.catalog.analysis_keywords()?.into_iter().collect();
        let profiles = self.catalog.list_profiles()?;
        let profile_selectors: HashSet<&str> =
            profiles.iter().flat_map(|p| p.selectors()).collect();

        for (idx, row) in doc.sample_data.iter().enumerate() {
            let row_number = idx + 1;
            self.validate_row_fields(row_number, row, diagnostics)?;

            let mut valid_selections = 0;
            for keyword in &row.analyses {
                if keywords.contains(keyword) {
                    valid_selections += 1;
                } else {
                    diagnostics.push(Diagnostic::field(
                        row_number,
                        "Analysis keyword",
                        keyword,
                        MSG_INVALID,
                    ));
                }
            }
            for profile in &row.profiles {
                if profile_selectors.contains(profile.as_str()) {
                    valid_selections += 1;
                } else {
                    diagnostics.push(Diagnostic::field(
                        row_number,
                        "Profile Title",
                        profile,
                        MSG_INVALID,
                    ));
                }
            }
            if valid_selections == 0 {
                diagnostics.push(Diagnostic::row(row_number, "No valid analyses or profiles"));
            }
        }
        Ok(())
    }

    /// 单据级字段（Contact/CCContact/Batch）由导入单在提交时提供,行内缺省不算错
    fn validate_row_fields(
        &self,
        row_number: usize,
        row: &SampleRow,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> RepositoryResult<()> {
        for spec in REQUEST_SCHEMA {
            let value = row.field(spec.name);
            if value.is_none() && is_document_field(spec.name) {
                continue;
            }
            if let Some(diagnostic) = self.munger.check(row_number, spec, value)? {
                diagnostics.push(diagnostic);
            }
        }
        Ok(())
    }
}
