// ==========================================
// 样品导入系统 - 批次解析器
// ==========================================
// 职责: 批次键值 → 关联已有批次或新建批次
// 规则:
//   - ClientBatchID 抄到导入单
//   - title 命中客户已有批次 → 关联
//   - 否则以剩余键值新建批次（丢弃 id 与空键）
// ==========================================

use crate::domain::diagnostic::Outcome;
use crate::domain::reference::NewBatch;
use crate::importer::section_scanner::SectionMap;
use crate::repository::error::RepositoryResult;
use crate::repository::record_factory::RecordFactory;
use crate::repository::reference_catalog::ReferenceCatalog;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const KEY_TITLE: &str = "title";
pub const KEY_CLIENT_BATCH_ID: &str = "ClientBatchID";
const KEY_ID: &str = "id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResolution {
    pub batch_uid: Option<String>,
    pub client_batch_id: Option<String>,
    pub created: bool,
}

pub struct BatchResolver<'a, C: ReferenceCatalog + ?Sized, F: RecordFactory + ?Sized> {
    catalog: &'a C,
    factory: &'a F,
}

impl<'a, C, F> BatchResolver<'a, C, F>
where
    C: ReferenceCatalog + ?Sized,
    F: RecordFactory + ?Sized,
{
    pub fn new(catalog: &'a C, factory: &'a F) -> Self {
        Self { catalog, factory }
    }

    /// 无批次分节时直接返回空结果
    pub fn resolve(
        &self,
        client_uid: &str,
        batch: Option<SectionMap>,
    ) -> RepositoryResult<Outcome<BatchResolution>> {
        let Some(batch) = batch else {
            return Ok(Outcome::clean(BatchResolution::default()));
        };

        let client_batch_id = batch
            .get(KEY_CLIENT_BATCH_ID)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let title = batch.get(KEY_TITLE).unwrap_or_default().to_string();

        if title.is_empty() {
            debug!("批次分节无标题，不关联批次");
            return Ok(Outcome::clean(BatchResolution {
                client_batch_id,
                ..Default::default()
            }));
        }

        if let Some(existing) = self.catalog.find_batch_by_title(client_uid, &title)? {
            debug!(batch_uid = %existing.uid, title = %title, "关联已有批次");
            return Ok(Outcome::clean(BatchResolution {
                batch_uid: Some(existing.uid),
                client_batch_id,
                created: false,
            }));
        }

        let fields: BTreeMap<String, String> = batch
            .into_entries()
            .into_iter()
            .filter(|(k, _)| !k.is_empty() && k != KEY_ID && k != KEY_TITLE)
            .collect();

        let created = self.factory.create_batch(NewBatch {
            client_uid: client_uid.to_string(),
            title: title.clone(),
            fields,
            batch_date: Utc::now(),
        })?;
        info!(batch_uid = %created.uid, title = %title, "新建批次");

        Ok(Outcome::clean(BatchResolution {
            batch_uid: Some(created.uid),
            client_batch_id,
            created: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::test_support::{MemoryCatalog, CLIENT_UID};

    fn section(pairs: &[(&str, &str)]) -> SectionMap {
        let mut map = SectionMap::default();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        map
    }

    #[test]
    fn test_no_batch_section() {
        let catalog = MemoryCatalog::happy_hills();
        let outcome = BatchResolver::new(&catalog, &catalog)
            .resolve(CLIENT_UID, None)
            .unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.value, BatchResolution::default());
    }

    #[test]
    fn test_creates_batch_then_links_existing() {
        let catalog = MemoryCatalog::happy_hills();
        let resolver = BatchResolver::new(&catalog, &catalog);
        let batch = section(&[
            ("id", "ignored"),
            ("title", "New Batch"),
            ("description", "Optional descr"),
            ("ClientBatchID", "CC 201506"),
            ("Remarks", "cold"),
        ]);

        let first = resolver.resolve(CLIENT_UID, Some(batch.clone())).unwrap().value;
        assert!(first.created);
        assert_eq!(first.client_batch_id.as_deref(), Some("CC 201506"));

        {
            let batches = catalog.batches.lock().unwrap();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].description.as_deref(), Some("Optional descr"));
            assert_eq!(batches[0].client_batch_id.as_deref(), Some("CC 201506"));
            assert_eq!(batches[0].extra_fields.get("Remarks").map(String::as_str), Some("cold"));
            assert!(!batches[0].extra_fields.contains_key("id"));
        }

        let second = resolver.resolve(CLIENT_UID, Some(batch)).unwrap().value;
        assert!(!second.created);
        assert_eq!(second.batch_uid, first.batch_uid);
        assert_eq!(catalog.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_title_links_nothing() {
        let catalog = MemoryCatalog::happy_hills();
        let batch = section(&[("title", ""), ("ClientBatchID", "CB-1")]);
        let outcome = BatchResolver::new(&catalog, &catalog)
            .resolve(CLIENT_UID, Some(batch))
            .unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.value.batch_uid, None);
        assert_eq!(outcome.value.client_batch_id.as_deref(), Some("CB-1"));
        assert!(catalog.batches.lock().unwrap().is_empty());
    }
}
