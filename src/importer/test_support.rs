// ==========================================
// 样品导入系统 - 单元测试用内存目录
// ==========================================
// 用途: 导入各步骤的单元测试,不依赖 SQLite
// ==========================================

use crate::domain::reference::{
    AnalysisProfile, AnalysisRequest, AnalysisService, Batch, Client, Contact,
    NewAnalysisRequest, NewBatch, ReferenceRecord,
};
use crate::domain::types::CatalogType;
use crate::repository::error::RepositoryResult;
use crate::repository::record_factory::RecordFactory;
use crate::repository::reference_catalog::{LookupKey, ReferenceCatalog};
use chrono::Utc;
use std::sync::Mutex;

pub const CLIENT_UID: &str = "uid-client-hh";

fn uid(title: &str) -> String {
    format!("uid-{}", title.to_lowercase().replace(' ', "-"))
}

pub struct MemoryCatalog {
    pub clients: Vec<Client>,
    pub contacts: Vec<Contact>,
    pub items: Vec<ReferenceRecord>,
    pub services: Vec<AnalysisService>,
    pub profiles: Vec<AnalysisProfile>,
    pub batches: Mutex<Vec<Batch>>,
    pub requests: Mutex<Vec<AnalysisRequest>>,
}

impl MemoryCatalog {
    /// Happy Hills 客户及其设置数据
    pub fn happy_hills() -> Self {
        let item = |catalog: CatalogType, title: &str| ReferenceRecord {
            uid: uid(title),
            catalog,
            title: title.to_string(),
            keyword: None,
            profile_key: None,
        };
        let service = |title: &str, keyword: &str| AnalysisService {
            uid: uid(title),
            title: title.to_string(),
            keyword: keyword.to_string(),
        };

        Self {
            clients: vec![Client {
                uid: CLIENT_UID.to_string(),
                name: "Happy Hills".to_string(),
                client_id: "HH".to_string(),
            }],
            contacts: vec![
                Contact {
                    uid: uid("Rita Mohale"),
                    client_uid: CLIENT_UID.to_string(),
                    fullname: "Rita Mohale".to_string(),
                    email: Some("rita@happyhills.example".to_string()),
                    cc_contact_uids: vec![uid("Neil Standard")],
                },
                Contact {
                    uid: uid("Neil Standard"),
                    client_uid: CLIENT_UID.to_string(),
                    fullname: "Neil Standard".to_string(),
                    email: None,
                    cc_contact_uids: vec![],
                },
            ],
            items: vec![
                item(CatalogType::SampleType, "Water"),
                item(CatalogType::SampleMatrix, "Liquids"),
                item(CatalogType::ContainerType, "Cup"),
                item(CatalogType::Container, "Glass Bottle"),
                item(CatalogType::AnalysisSpec, "Drinking Water"),
                item(CatalogType::SamplePoint, "Toilet"),
                item(CatalogType::SamplePoint, "Bracketville (Centre)"),
                item(CatalogType::SamplePoint, "(Land) of (Brackets) station"),
            ],
            services: vec![
                service("Ecoli", "ECO"),
                service("Salmonella", "SAL"),
                service("Color", "COL"),
                service("Taste", "TAS"),
            ],
            profiles: vec![
                AnalysisProfile {
                    uid: uid("MicroBio"),
                    title: "MicroBio".to_string(),
                    profile_key: None,
                    service_uids: vec![uid("Ecoli"), uid("Salmonella")],
                },
                AnalysisProfile {
                    uid: uid("Properties"),
                    title: "Properties".to_string(),
                    profile_key: Some("PROPS".to_string()),
                    service_uids: vec![uid("Color"), uid("Taste")],
                },
            ],
            batches: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 按类型+标题取 UID（测试断言用）
    pub fn uid_of(&self, catalog: CatalogType, title: &str) -> String {
        self.lookup(catalog, LookupKey::Title(title))
            .unwrap()
            .first()
            .map(|r| r.uid.clone())
            .unwrap_or_else(|| panic!("{} '{}' 不存在", catalog, title))
    }
}

impl ReferenceCatalog for MemoryCatalog {
    fn lookup(
        &self,
        catalog: CatalogType,
        key: LookupKey<'_>,
    ) -> RepositoryResult<Vec<ReferenceRecord>> {
        let matches = |uid: &str, title: &str| match key {
            LookupKey::Title(v) => title == v,
            LookupKey::Uid(v) => uid == v,
            _ => false,
        };
        let record = |uid: &str, title: &str| ReferenceRecord {
            uid: uid.to_string(),
            catalog,
            title: title.to_string(),
            keyword: None,
            profile_key: None,
        };

        Ok(match catalog {
            CatalogType::Client => self
                .clients
                .iter()
                .filter(|c| matches(&c.uid, &c.name))
                .map(|c| record(&c.uid, &c.name))
                .collect(),
            CatalogType::Contact => self
                .contacts
                .iter()
                .filter(|c| matches(&c.uid, &c.fullname))
                .map(|c| record(&c.uid, &c.fullname))
                .collect(),
            CatalogType::Batch => self
                .batches
                .lock()
                .unwrap()
                .iter()
                .filter(|b| matches(&b.uid, &b.title))
                .map(|b| record(&b.uid, &b.title))
                .collect(),
            _ => self
                .items
                .iter()
                .filter(|i| i.catalog == catalog && matches(&i.uid, &i.title))
                .cloned()
                .collect(),
        })
    }

    fn find_client(&self, client_uid: &str) -> RepositoryResult<Option<Client>> {
        Ok(self.clients.iter().find(|c| c.uid == client_uid).cloned())
    }

    fn list_contacts(&self, client_uid: &str) -> RepositoryResult<Vec<Contact>> {
        Ok(self
            .contacts
            .iter()
            .filter(|c| c.client_uid == client_uid)
            .cloned()
            .collect())
    }

    fn find_batch_by_title(&self, client_uid: &str, title: &str) -> RepositoryResult<Option<Batch>> {
        Ok(self
            .batches
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.client_uid == client_uid && b.title == title)
            .cloned())
    }

    fn analysis_keywords(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.services.iter().map(|s| s.keyword.clone()).collect())
    }

    fn find_service(&self, key: LookupKey<'_>) -> RepositoryResult<Option<AnalysisService>> {
        Ok(self
            .services
            .iter()
            .find(|s| match key {
                LookupKey::Keyword(v) => s.keyword == v,
                LookupKey::Title(v) => s.title == v,
                LookupKey::Uid(v) => s.uid == v,
                LookupKey::ProfileKey(_) => false,
            })
            .cloned())
    }

    fn list_profiles(&self) -> RepositoryResult<Vec<AnalysisProfile>> {
        Ok(self.profiles.clone())
    }
}

impl RecordFactory for MemoryCatalog {
    fn create_batch(&self, batch: NewBatch) -> RepositoryResult<Batch> {
        let mut fields = batch.fields;
        let created = Batch {
            uid: uid(&format!("batch {}", batch.title)),
            client_uid: batch.client_uid,
            title: batch.title,
            description: fields.remove("description"),
            client_batch_id: fields.remove("ClientBatchID"),
            batch_date: batch.batch_date,
            extra_fields: fields,
        };
        self.batches.lock().unwrap().push(created.clone());
        Ok(created)
    }

    fn create_analysis_request(
        &self,
        request: NewAnalysisRequest,
    ) -> RepositoryResult<AnalysisRequest> {
        let mut requests = self.requests.lock().unwrap();
        let created = AnalysisRequest {
            uid: format!("uid-request-{}", requests.len() + 1),
            request_id: format!("HH-{:04}", requests.len() + 1),
            client_uid: request.client_uid,
            import_id: request.import_id,
            fields: request.fields,
            service_uids: request.service_uids,
            created_at: Utc::now(),
        };
        requests.push(created.clone());
        Ok(created)
    }
}
