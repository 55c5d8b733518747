// ==========================================
// 样品导入系统 - 表头解析器
// ==========================================
// 职责: 表头键值 → 导入单表头字段
// 规则:
//   - 已识别的键被消费（移除）,剩余键汇总成一条诊断
//   - Contact 按标题精确匹配客户联系人,找不到时记诊断并回退到第一个联系人
// ==========================================

use crate::config::ImportSettings;
use crate::domain::diagnostic::{Diagnostic, Outcome};
use crate::domain::sample_import::{CcContact, SampleImport};
use crate::importer::section_scanner::SectionMap;
use crate::repository::error::RepositoryResult;
use crate::repository::reference_catalog::ReferenceCatalog;
use tracing::{debug, warn};

pub const KEY_FILENAME: &str = "File name";
pub const KEY_NR_SAMPLES: &str = "No of Samples";
pub const KEY_CLIENT_NAME: &str = "Client name";
pub const KEY_CLIENT_ID: &str = "Client ID";
pub const KEY_CLIENT_ORDER_NUMBER: &str = "Client Order Number";
pub const KEY_CLIENT_REFERENCE: &str = "Client Reference";
pub const KEY_CONTACT: &str = "Contact";
pub const KEY_CC_NAMES_REPORT: &str = "CC Names - Report";
pub const KEY_CC_EMAILS_REPORT: &str = "CC Emails - Report";
pub const KEY_CC_NAMES_INVOICE: &str = "CC Names - Invoice";
pub const KEY_CC_EMAILS_INVOICE: &str = "CC Emails - Invoice";

/// 声明样品数无法解析
pub fn invalid_sample_count(raw: &str) -> Diagnostic {
    Diagnostic::document(format!("{}: value is invalid ({}).", KEY_NR_SAMPLES, raw))
}

// ==========================================
// HeaderResolution - 表头解析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderResolution {
    pub filename: Option<String>,
    pub client_name: Option<String>,
    pub client_id: Option<String>,
    pub client_order_number: Option<String>,
    pub client_reference: Option<String>,
    pub nr_samples: Option<usize>,
    pub nr_samples_invalid: Option<String>,
    pub contact_uid: Option<String>,
    pub cc_contacts: Vec<CcContact>,
}

impl HeaderResolution {
    /// 写回导入单（未给出的文件名保留上传时的值）
    pub fn apply_to(self, doc: &mut SampleImport) {
        if self.filename.is_some() {
            doc.filename = self.filename;
        }
        doc.client_name = self.client_name;
        doc.client_id = self.client_id;
        doc.client_order_number = self.client_order_number;
        doc.client_reference = self.client_reference;
        doc.nr_samples = self.nr_samples;
        doc.nr_samples_invalid = self.nr_samples_invalid;
        doc.contact_uid = self.contact_uid;
        doc.cc_contacts = self.cc_contacts;
    }
}

// ==========================================
// HeaderResolver
// ==========================================
pub struct HeaderResolver<'a, C: ReferenceCatalog + ?Sized> {
    catalog: &'a C,
    settings: &'a ImportSettings,
}

impl<'a, C: ReferenceCatalog + ?Sized> HeaderResolver<'a, C> {
    pub fn new(catalog: &'a C, settings: &'a ImportSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn resolve(
        &self,
        client_uid: &str,
        mut header: SectionMap,
    ) -> RepositoryResult<Outcome<HeaderResolution>> {
        let mut diagnostics = Vec::new();
        let mut take = |key: &str| header.take(key).filter(|v| !v.is_empty());

        let mut resolution = HeaderResolution {
            filename: take(KEY_FILENAME),
            client_name: take(KEY_CLIENT_NAME),
            client_id: take(KEY_CLIENT_ID),
            client_order_number: take(KEY_CLIENT_ORDER_NUMBER),
            client_reference: take(KEY_CLIENT_REFERENCE),
            ..Default::default()
        };

        if let Some(raw) = take(KEY_NR_SAMPLES) {
            match raw.parse::<usize>() {
                Ok(n) => resolution.nr_samples = Some(n),
                Err(_) => {
                    diagnostics.push(invalid_sample_count(&raw));
                    resolution.nr_samples_invalid = Some(raw);
                }
            }
        }

        // ===== CC 联系人 =====
        let cc = CcContact {
            report_names: split_list(take(KEY_CC_NAMES_REPORT)),
            report_emails: split_list(take(KEY_CC_EMAILS_REPORT)),
            invoice_names: split_list(take(KEY_CC_NAMES_INVOICE)),
            invoice_emails: split_list(take(KEY_CC_EMAILS_INVOICE)),
        };
        if !cc.is_empty() {
            resolution.cc_contacts.push(cc);
        }

        // ===== 主联系人 =====
        let requested = header.take(KEY_CONTACT).unwrap_or_default();
        resolution.contact_uid = self.resolve_contact(client_uid, &requested, &mut diagnostics)?;

        // ===== 未识别的键 =====
        if !header.is_empty() {
            let unexpected: Vec<&str> = header.keys().collect();
            diagnostics.push(Diagnostic::document(format!(
                "Unexpected header fields: {}",
                unexpected.join(",")
            )));
        }

        debug!(
            client_uid,
            contact = ?resolution.contact_uid,
            diagnostics = diagnostics.len(),
            "表头解析完成"
        );
        Ok(Outcome::new(resolution, diagnostics))
    }

    fn resolve_contact(
        &self,
        client_uid: &str,
        requested: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> RepositoryResult<Option<String>> {
        let contacts = self.catalog.list_contacts(client_uid)?;
        if let Some(contact) = contacts.iter().find(|c| c.fullname == requested) {
            return Ok(Some(contact.uid.clone()));
        }

        match contacts.first() {
            Some(fallback) if self.settings.contact_fallback => {
                warn!(requested, fallback = %fallback.fullname, "联系人不存在，回退到第一个联系人");
                diagnostics.push(Diagnostic::document(format!(
                    "Specified contact '{}' does not exist; using '{}'",
                    requested, fallback.fullname
                )));
                Ok(Some(fallback.uid.clone()))
            }
            Some(_) => {
                diagnostics.push(Diagnostic::document(format!(
                    "Specified contact '{}' does not exist",
                    requested
                )));
                Ok(None)
            }
            None => {
                diagnostics.push(Diagnostic::document(format!(
                    "Specified contact '{}' does not exist; client has no contacts",
                    requested
                )));
                Ok(None)
            }
        }
    }
}

/// 逗号分隔列表
fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::test_support::{MemoryCatalog, CLIENT_UID};

    fn section(keys: &[&str], values: &[&str]) -> SectionMap {
        let keys: Vec<String> = keys.iter().map(|s| s.to_string()).collect();
        let values: Vec<String> = values.iter().map(|s| s.to_string()).collect();
        SectionMap::zip(&keys, &values)
    }

    #[test]
    fn test_resolve_full_header() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let header = section(
            &[
                "File name", "Client name", "Client ID", "Contact", "CC Names - Report",
                "CC Emails - Report", "CC Names - Invoice", "CC Emails - Invoice",
                "No of Samples", "Client Order Number", "Client Reference",
            ],
            &[
                "test1.csv", "Happy Hills", "HH", "Rita Mohale", "Neil Standard",
                "a@x.example, b@x.example", "", "", "4", "HHPO-001", "",
            ],
        );

        let outcome = HeaderResolver::new(&catalog, &settings)
            .resolve(CLIENT_UID, header)
            .unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);

        let r = outcome.value;
        assert_eq!(r.filename.as_deref(), Some("test1.csv"));
        assert_eq!(r.client_name.as_deref(), Some("Happy Hills"));
        assert_eq!(r.nr_samples, Some(4));
        assert_eq!(r.client_order_number.as_deref(), Some("HHPO-001"));
        assert_eq!(r.client_reference, None);
        assert_eq!(r.contact_uid.as_deref(), Some("uid-rita-mohale"));
        assert_eq!(r.cc_contacts.len(), 1);
        assert_eq!(r.cc_contacts[0].report_names, vec!["Neil Standard"]);
        assert_eq!(r.cc_contacts[0].report_emails, vec!["a@x.example", "b@x.example"]);
    }

    #[test]
    fn test_unknown_contact_falls_back_with_one_error() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let header = section(&["Client name", "Client ID", "Contact"], &["Happy Hills", "HH", "Nobody"]);

        let outcome = HeaderResolver::new(&catalog, &settings)
            .resolve(CLIENT_UID, header)
            .unwrap();
        assert_eq!(outcome.value.contact_uid.as_deref(), Some("uid-rita-mohale"));
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "Specified contact 'Nobody' does not exist; using 'Rita Mohale'"
        );
    }

    #[test]
    fn test_fallback_disabled_leaves_contact_unset() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings {
            contact_fallback: false,
            ..Default::default()
        };
        let header = section(&["Contact"], &["Nobody"]);

        let outcome = HeaderResolver::new(&catalog, &settings)
            .resolve(CLIENT_UID, header)
            .unwrap();
        assert_eq!(outcome.value.contact_uid, None);
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "Specified contact 'Nobody' does not exist"
        );
    }

    #[test]
    fn test_unexpected_keys_aggregated() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let header = section(
            &["Client name", "Contact", "Colour", "Mood"],
            &["Happy Hills", "Rita Mohale", "blue", "fine"],
        );

        let outcome = HeaderResolver::new(&catalog, &settings)
            .resolve(CLIENT_UID, header)
            .unwrap();
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "Unexpected header fields: Colour,Mood"
        );
    }

    #[test]
    fn test_invalid_sample_count() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let header = section(&["Contact", "No of Samples"], &["Rita Mohale", "four"]);

        let outcome = HeaderResolver::new(&catalog, &settings)
            .resolve(CLIENT_UID, header)
            .unwrap();
        assert_eq!(outcome.value.nr_samples, None);
        assert_eq!(outcome.value.nr_samples_invalid.as_deref(), Some("four"));
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "No of Samples: value is invalid (four)."
        );
    }
}
