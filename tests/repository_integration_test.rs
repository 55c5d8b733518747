// ==========================================
// Repository 集成测试
// ==========================================
// 覆盖: 参考目录查询、建单工厂、导入单持久化（文件型 SQLite）


use std::collections::BTreeMap;

use sample_import::domain::{FieldValue, NewAnalysisRequest, NewBatch};
use sample_import::repository::{
    ImportKeyField, LookupKey, RecordFactory, RecordFactoryImpl, ReferenceCatalog,
    ReferenceCatalogImpl, SampleImportRepository, SampleImportRepositoryImpl,
};
use sample_import::{CatalogType, ImportState, OriginalFile, SampleImport};
use test_helpers::{create_test_db, happy_hills_seed, CLIENT_UID, NEIL_UID, RITA_UID};

fn seeded_catalog(db_path: &str) -> ReferenceCatalogImpl {
    let catalog = ReferenceCatalogImpl::new(db_path).expect("创建ReferenceCatalogImpl失败");
    catalog.seed(&happy_hills_seed()).expect("写入参考数据失败");
    catalog
}

#[test]
fn test_catalog_lookups() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let catalog = seeded_catalog(&db_path);

    // 括号标题按字面匹配
    let found = catalog
        .lookup(CatalogType::SamplePoint, LookupKey::Title("(Land) of (Brackets) station"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uid, "sp-land");

    // 设置项按类型隔离
    assert!(catalog
        .lookup(CatalogType::SampleType, LookupKey::Title("Toilet"))
        .unwrap()
        .is_empty());

    let profile = catalog
        .lookup(CatalogType::AnalysisProfile, LookupKey::ProfileKey("PROPS"))
        .unwrap();
    assert_eq!(profile[0].title, "Properties");

    let service = catalog.find_service(LookupKey::Keyword("TAS")).unwrap().unwrap();
    assert_eq!(service.title, "Taste");
    assert_eq!(
        catalog.analysis_keywords().unwrap(),
        vec!["ECO", "SAL", "COL", "TAS"]
    );

    let contacts = catalog.list_contacts(CLIENT_UID).unwrap();
    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts[0].cc_contact_uids, vec![NEIL_UID]);

    let profiles = catalog.list_profiles().unwrap();
    assert_eq!(profiles[0].service_uids, vec!["svc-eco", "svc-sal"]);
}

#[test]
fn test_record_factory_numbers_requests_per_client() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let catalog = seeded_catalog(&db_path);
    let factory = RecordFactoryImpl::new(&db_path).unwrap();

    let batch = factory
        .create_batch(NewBatch {
            client_uid: CLIENT_UID.to_string(),
            title: "B-01".to_string(),
            fields: BTreeMap::from([
                ("description".to_string(), "Borehole".to_string()),
                ("ClientBatchID".to_string(), "CB-9".to_string()),
                ("Remarks".to_string(), "cold".to_string()),
            ]),
            batch_date: chrono::Utc::now(),
        })
        .unwrap();
    assert_eq!(batch.description.as_deref(), Some("Borehole"));
    assert_eq!(batch.client_batch_id.as_deref(), Some("CB-9"));
    assert_eq!(batch.extra_fields.get("Remarks").map(String::as_str), Some("cold"));

    let stored = catalog.find_batch_by_title(CLIENT_UID, "B-01").unwrap().unwrap();
    assert_eq!(stored.uid, batch.uid);

    let mut fields = BTreeMap::new();
    fields.insert("Contact".to_string(), FieldValue::Uid(RITA_UID.to_string()));
    let request = |services: &[&str]| NewAnalysisRequest {
        client_uid: CLIENT_UID.to_string(),
        import_id: Some("imp-1".to_string()),
        fields: fields.clone(),
        service_uids: services.iter().map(|s| s.to_string()).collect(),
    };

    let first = factory.create_analysis_request(request(&["svc-eco"])).unwrap();
    let second = factory
        .create_analysis_request(request(&["svc-col", "svc-tas"]))
        .unwrap();
    assert_eq!(first.request_id, "HH-0001");
    assert_eq!(second.request_id, "HH-0002");
    assert_eq!(factory.count_analyses_by_import("imp-1").unwrap(), 3);

    let stored = factory.list_requests_by_import("imp-1").unwrap();
    assert_eq!(stored[1].service_uids, vec!["svc-col", "svc-tas"]);
    assert_eq!(stored[0].fields, fields);

    // 未知分析项 → 整张申请单回滚
    assert!(factory
        .create_analysis_request(request(&["svc-eco", "svc-missing"]))
        .is_err());
    assert_eq!(factory.list_requests_by_import("imp-1").unwrap().len(), 2);
}

#[test]
fn test_sample_import_persistence() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seeded_catalog(&db_path);
    let repo = SampleImportRepositoryImpl::new(&db_path).unwrap();

    let mut doc = SampleImport::new(
        "imp-1",
        "samples-1",
        CLIENT_UID,
        OriginalFile::new("samples.csv", b"Header,Client name\n".to_vec()),
    );
    repo.insert(&doc).unwrap();
    assert!(repo.title_exists("samples-1").unwrap());

    doc.client_order_number = Some("PO-1".to_string());
    doc.push_error("Row 1: No valid analyses or profiles");
    doc.state = ImportState::Valid;
    repo.update(&doc).unwrap();

    let loaded = repo.find_by_id("imp-1").unwrap().unwrap();
    assert_eq!(loaded.state, ImportState::Valid);
    assert_eq!(loaded.errors(), doc.errors());
    assert_eq!(loaded.original_file().data(), doc.original_file().data());

    // 自身不算重复
    assert!(repo
        .find_other_titles(ImportKeyField::ClientOrderNumber, "PO-1", &[ImportState::Valid], "imp-1")
        .unwrap()
        .is_empty());
    assert_eq!(
        repo.find_other_titles(ImportKeyField::ClientOrderNumber, "PO-1", &[ImportState::Valid], "imp-2")
            .unwrap(),
        vec!["samples-1"]
    );
}
