// ==========================================
// 样品导入系统 - 提交器
// ==========================================
// 职责: 已校验导入单 → 每行一张样品申请单
// 流程:
//   1. 分析组合（键/UID/标题）→ 成员分析项
//   2. 分析项（关键字 → 标题 → UID）
//   3. 二者并集,附加单据级字段后建单
// 红线: 不再校验;建单失败直接向上传播
// ==========================================

use crate::domain::diagnostic::{Diagnostic, Outcome};
use crate::domain::reference::{AnalysisProfile, NewAnalysisRequest};
use crate::domain::sample_import::{FieldValue, SampleImport, SampleRow};
use crate::importer::sample_importer_trait::CommitReport;
use crate::repository::error::RepositoryResult;
use crate::repository::record_factory::RecordFactory;
use crate::repository::reference_catalog::{LookupKey, ReferenceCatalog};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

pub struct Committer<'a, C: ReferenceCatalog + ?Sized, F: RecordFactory + ?Sized> {
    catalog: &'a C,
    factory: &'a F,
}

impl<'a, C, F> Committer<'a, C, F>
where
    C: ReferenceCatalog + ?Sized,
    F: RecordFactory + ?Sized,
{
    pub fn new(catalog: &'a C, factory: &'a F) -> Self {
        Self { catalog, factory }
    }

    #[instrument(skip(self, doc), fields(import_id = %doc.id, rows = doc.sample_data.len()))]
    pub fn commit(&self, doc: &SampleImport) -> RepositoryResult<Outcome<CommitReport>> {
        let profiles = self.catalog.list_profiles()?;
        let document_fields = self.document_fields(doc)?;

        let mut report = CommitReport::default();
        let mut diagnostics = Vec::new();

        for (idx, row) in doc.sample_data.iter().enumerate() {
            let row_number = idx + 1;
            let service_uids = self.row_services(row_number, row, &profiles, &mut diagnostics)?;
            let fields = merge_fields(row, &document_fields);

            let request = self.factory.create_analysis_request(NewAnalysisRequest {
                client_uid: doc.client_uid.clone(),
                import_id: Some(doc.id.clone()),
                fields,
                service_uids,
            })?;
            debug!(
                row = row_number,
                request_id = %request.request_id,
                analyses = request.service_uids.len(),
                "样品申请单已创建"
            );
            report.analysis_count += request.service_uids.len();
            report.request_uids.push(request.uid);
        }

        info!(
            requests = report.request_uids.len(),
            analyses = report.analysis_count,
            "导入单提交完成"
        );
        Ok(Outcome::new(report, diagnostics))
    }

    /// Contact / CCContact / Batch / ClientOrderNumber / ClientReference
    fn document_fields(&self, doc: &SampleImport) -> RepositoryResult<BTreeMap<String, FieldValue>> {
        let mut fields = BTreeMap::new();

        if let Some(batch_uid) = &doc.batch_uid {
            fields.insert("Batch".to_string(), FieldValue::Uid(batch_uid.clone()));
        }
        if let Some(contact_uid) = &doc.contact_uid {
            fields.insert("Contact".to_string(), FieldValue::Uid(contact_uid.clone()));
            let contact = self.catalog.find_contact(&doc.client_uid, contact_uid)?;
            if let Some(contact) = contact.filter(|c| !c.cc_contact_uids.is_empty()) {
                fields.insert("CCContact".to_string(), FieldValue::Uids(contact.cc_contact_uids));
            }
        }
        if let Some(order) = &doc.client_order_number {
            fields.insert("ClientOrderNumber".to_string(), FieldValue::Text(order.clone()));
        }
        if let Some(reference) = &doc.client_reference {
            fields.insert("ClientReference".to_string(), FieldValue::Text(reference.clone()));
        }
        Ok(fields)
    }

    /// 行内分析项与分析组合成员的并集（保持首次出现顺序）
    fn row_services(
        &self,
        row_number: usize,
        row: &SampleRow,
        profiles: &[AnalysisProfile],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> RepositoryResult<Vec<String>> {
        let mut services: Vec<String> = Vec::new();
        let mut add = |uid: &str| {
            if !services.iter().any(|s| s == uid) {
                services.push(uid.to_string());
            }
        };

        for value in &row.analyses {
            let service = match self.catalog.find_service(LookupKey::Keyword(value))? {
                Some(found) => Some(found),
                None => match self.catalog.find_service(LookupKey::Title(value))? {
                    Some(found) => Some(found),
                    None => self.catalog.find_service(LookupKey::Uid(value))?,
                },
            };
            match service {
                Some(service) => add(&service.uid),
                None => diagnostics.push(Diagnostic::row(
                    row_number,
                    format!("Invalid analysis specified: {}", value),
                )),
            }
        }

        for value in &row.profiles {
            match profiles.iter().find(|p| p.matches(value)) {
                Some(profile) => profile.service_uids.iter().for_each(|uid| add(uid)),
                None => diagnostics.push(Diagnostic::row(
                    row_number,
                    format!("Invalid profile specified: {}", value),
                )),
            }
        }

        Ok(services)
    }
}

/// 行字段 + 单据字段;Contact/CCContact/Batch 以单据为准,订单号与委托编号以行为准
fn merge_fields(
    row: &SampleRow,
    document_fields: &BTreeMap<String, FieldValue>,
) -> BTreeMap<String, FieldValue> {
    let mut fields = row.fields.clone();
    for (name, value) in document_fields {
        match name.as_str() {
            "ClientOrderNumber" | "ClientReference" => {
                fields.entry(name.clone()).or_insert_with(|| value.clone());
            }
            _ => {
                fields.insert(name.clone(), value.clone());
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample_import::OriginalFile;
    use crate::domain::types::CatalogType;
    use crate::importer::test_support::{MemoryCatalog, CLIENT_UID};

    fn doc_with_rows(catalog: &MemoryCatalog, rows: Vec<SampleRow>) -> SampleImport {
        let mut doc = SampleImport::new(
            "imp-1",
            "test1-1",
            CLIENT_UID,
            OriginalFile::new("test1.csv", b"x".to_vec()),
        );
        doc.contact_uid = Some(catalog.uid_of(CatalogType::Contact, "Rita Mohale"));
        doc.client_order_number = Some("HHPO-001".into());
        doc.client_reference = Some("HHREF-1".into());
        doc.batch_uid = Some("uid-batch-1".into());
        doc.sample_data = rows;
        doc
    }

    fn row(analyses: &[&str], profiles: &[&str]) -> SampleRow {
        let mut row = SampleRow::new("Sample");
        row.analyses = analyses.iter().map(|s| s.to_string()).collect();
        row.profiles = profiles.iter().map(|s| s.to_string()).collect();
        row
    }

    #[test]
    fn test_services_union_of_analyses_and_profiles() {
        let catalog = MemoryCatalog::happy_hills();
        let doc = doc_with_rows(
            &catalog,
            vec![row(&["ECO"], &["MicroBio"]), row(&["Color"], &["PROPS"])],
        );

        let outcome = Committer::new(&catalog, &catalog).commit(&doc).unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);
        assert_eq!(outcome.value.request_uids.len(), 2);
        // ECO+SAL,COL+TAS（去重后各 2 项）
        assert_eq!(outcome.value.analysis_count, 4);

        let requests = catalog.requests.lock().unwrap();
        assert_eq!(requests[0].service_uids, vec!["uid-ecoli", "uid-salmonella"]);
        assert_eq!(requests[1].service_uids, vec!["uid-color", "uid-taste"]);
    }

    #[test]
    fn test_document_fields_attached() {
        let catalog = MemoryCatalog::happy_hills();
        let mut with_reference = row(&["ECO"], &[]);
        with_reference
            .fields
            .insert("ClientReference".into(), FieldValue::Text("ROW-REF".into()));
        let doc = doc_with_rows(&catalog, vec![with_reference, row(&["SAL"], &[])]);

        Committer::new(&catalog, &catalog).commit(&doc).unwrap();
        let requests = catalog.requests.lock().unwrap();

        let first = &requests[0].fields;
        assert_eq!(first.get("Contact"), Some(&FieldValue::Uid("uid-rita-mohale".into())));
        assert_eq!(
            first.get("CCContact"),
            Some(&FieldValue::Uids(vec!["uid-neil-standard".into()]))
        );
        assert_eq!(first.get("Batch"), Some(&FieldValue::Uid("uid-batch-1".into())));
        assert_eq!(first.get("ClientOrderNumber"), Some(&FieldValue::Text("HHPO-001".into())));
        assert_eq!(first.get("ClientReference"), Some(&FieldValue::Text("ROW-REF".into())));

        let second = &requests[1].fields;
        assert_eq!(second.get("ClientReference"), Some(&FieldValue::Text("HHREF-1".into())));
        assert_eq!(requests[1].import_id.as_deref(), Some("imp-1"));
    }

    #[test]
    fn test_unresolvable_entries_reported_and_skipped() {
        let catalog = MemoryCatalog::happy_hills();
        let doc = doc_with_rows(&catalog, vec![row(&["ECO", "NOPE"], &["Ghost"])]);

        let outcome = Committer::new(&catalog, &catalog).commit(&doc).unwrap();
        let messages: Vec<String> = outcome.diagnostics.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 1: Invalid analysis specified: NOPE",
                "Row 1: Invalid profile specified: Ghost",
            ]
        );
        assert_eq!(outcome.value.analysis_count, 1);
    }
}
