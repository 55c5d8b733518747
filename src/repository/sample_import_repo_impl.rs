// ==========================================
// 样品导入系统 - 导入单 Repository 实现
// ==========================================
// 职责: 导入单持久化（使用 rusqlite）
// 存储: 样品数据 / 抄送 / 错误列表以 JSON 文本保存
// 红线: update 不改写原始文件列
// ==========================================

use crate::db::json_column;
use crate::domain::sample_import::{OriginalFile, SampleImport};
use crate::domain::types::ImportState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sample_import_repo::{ImportKeyField, SampleImportRepository};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    id, title, client_uid, original_filename, original_data,
    filename, client_name, client_id, client_order_number, client_reference,
    nr_samples, contact_uid, cc_contacts_json, batch_uid, client_batch_id,
    sample_data_json, errors_json, state, created_at, date_validated, date_imported,
    nr_samples_invalid
"#;

// ==========================================
// SampleImportRepositoryImpl
// ==========================================
pub struct SampleImportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl SampleImportRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 共享已有连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SampleImport> {
        let original_file = OriginalFile::new(row.get::<_, String>(3)?, row.get::<_, Vec<u8>>(4)?);
        let mut doc = SampleImport::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            original_file,
        );

        doc.filename = row.get(5)?;
        doc.client_name = row.get(6)?;
        doc.client_id = row.get(7)?;
        doc.client_order_number = row.get(8)?;
        doc.client_reference = row.get(9)?;
        doc.nr_samples = row.get::<_, Option<i64>>(10)?.map(|n| n as usize);
        doc.contact_uid = row.get(11)?;
        doc.cc_contacts = json_column(row, 12)?;
        doc.batch_uid = row.get(13)?;
        doc.client_batch_id = row.get(14)?;
        doc.sample_data = json_column(row, 15)?;
        doc.restore_errors(json_column(row, 16)?);
        doc.state = ImportState::from_db_str(&row.get::<_, String>(17)?);
        doc.created_at = row.get(18)?;
        doc.date_validated = row.get(19)?;
        doc.date_imported = row.get(20)?;
        doc.nr_samples_invalid = row.get(21)?;
        Ok(doc)
    }
}

impl SampleImportRepository for SampleImportRepositoryImpl {
    fn insert(&self, doc: &SampleImport) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO sample_import (
                id, title, client_uid, original_filename, original_data,
                filename, client_name, client_id, client_order_number, client_reference,
                nr_samples, contact_uid, cc_contacts_json, batch_uid, client_batch_id,
                sample_data_json, errors_json, state, created_at, date_validated, date_imported,
                nr_samples_invalid
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
            )"#,
            params![
                doc.id,
                doc.title,
                doc.client_uid,
                doc.original_file().filename(),
                doc.original_file().data(),
                doc.filename,
                doc.client_name,
                doc.client_id,
                doc.client_order_number,
                doc.client_reference,
                doc.nr_samples.map(|n| n as i64),
                doc.contact_uid,
                serde_json::to_string(&doc.cc_contacts)?,
                doc.batch_uid,
                doc.client_batch_id,
                serde_json::to_string(&doc.sample_data)?,
                serde_json::to_string(doc.errors())?,
                doc.state.to_db_str(),
                doc.created_at,
                doc.date_validated,
                doc.date_imported,
                doc.nr_samples_invalid,
            ],
        )?;
        Ok(())
    }

    fn update(&self, doc: &SampleImport) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"UPDATE sample_import SET
                filename = ?2, client_name = ?3, client_id = ?4,
                client_order_number = ?5, client_reference = ?6, nr_samples = ?7,
                contact_uid = ?8, cc_contacts_json = ?9, batch_uid = ?10, client_batch_id = ?11,
                sample_data_json = ?12, errors_json = ?13, state = ?14,
                date_validated = ?15, date_imported = ?16, nr_samples_invalid = ?17
               WHERE id = ?1"#,
            params![
                doc.id,
                doc.filename,
                doc.client_name,
                doc.client_id,
                doc.client_order_number,
                doc.client_reference,
                doc.nr_samples.map(|n| n as i64),
                doc.contact_uid,
                serde_json::to_string(&doc.cc_contacts)?,
                doc.batch_uid,
                doc.client_batch_id,
                serde_json::to_string(&doc.sample_data)?,
                serde_json::to_string(doc.errors())?,
                doc.state.to_db_str(),
                doc.date_validated,
                doc.date_imported,
                doc.nr_samples_invalid,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "SampleImport".to_string(),
                id: doc.id.clone(),
            });
        }
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> RepositoryResult<Option<SampleImport>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM sample_import WHERE id = ?1", SELECT_COLUMNS);
        let doc = conn.query_row(&sql, params![id], Self::map_row).optional()?;
        Ok(doc)
    }

    fn list(
        &self,
        client_uid: Option<&str>,
        state: Option<ImportState>,
    ) -> RepositoryResult<Vec<SampleImport>> {
        let mut sql = format!("SELECT {} FROM sample_import WHERE 1 = 1", SELECT_COLUMNS);
        let mut values: Vec<String> = Vec::new();
        if let Some(client_uid) = client_uid {
            values.push(client_uid.to_string());
            sql.push_str(&format!(" AND client_uid = ?{}", values.len()));
        }
        if let Some(state) = state {
            values.push(state.to_db_str().to_string());
            sql.push_str(&format!(" AND state = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let docs = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    fn find_other_titles(
        &self,
        field: ImportKeyField,
        value: &str,
        states: &[ImportState],
        exclude_id: &str,
    ) -> RepositoryResult<Vec<String>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (0..states.len()).map(|i| format!("?{}", i + 3)).collect();
        let sql = format!(
            "SELECT title FROM sample_import WHERE {} = ?1 AND id <> ?2 AND state IN ({}) ORDER BY rowid",
            field.column(),
            placeholders.join(", ")
        );

        let mut values: Vec<String> = vec![value.to_string(), exclude_id.to_string()];
        values.extend(states.iter().map(|s| s.to_db_str().to_string()));

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let titles = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(titles)
    }

    fn title_exists(&self, title: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM sample_import WHERE title = ?1 LIMIT 1",
                params![title],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::sample_import::{CcContact, FieldValue, SampleRow};

    fn repo() -> SampleImportRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO client (uid, name, client_id) VALUES ('c-1', 'Happy Hills', 'HH')",
            [],
        )
        .unwrap();
        SampleImportRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn doc(id: &str, title: &str, order: &str, state: ImportState) -> SampleImport {
        let mut doc = SampleImport::new(id, title, "c-1", OriginalFile::new("t.csv", b"a,b\n".to_vec()));
        doc.client_order_number = Some(order.to_string());
        doc.state = state;
        doc
    }

    #[test]
    fn test_insert_update_roundtrip() {
        let repo = repo();
        let mut d = doc("imp-1", "t-1", "PO-1", ImportState::Draft);
        repo.insert(&d).unwrap();

        let mut row = SampleRow::new("Sample 1");
        row.fields.insert("SampleType".into(), FieldValue::Uid("st-1".into()));
        row.analyses.push("ECO".into());
        d.sample_data.push(row);
        d.cc_contacts.push(CcContact {
            report_names: vec!["Neil Standard".into()],
            ..Default::default()
        });
        d.nr_samples = Some(1);
        d.push_error("Row 1: No valid analyses or profiles");
        d.state = ImportState::Invalid;
        repo.update(&d).unwrap();

        let loaded = repo.find_by_id("imp-1").unwrap().unwrap();
        assert_eq!(loaded.original_file().data(), b"a,b\n");
        assert_eq!(loaded.sample_data, d.sample_data);
        assert_eq!(loaded.cc_contacts, d.cc_contacts);
        assert_eq!(loaded.errors(), d.errors());
        assert_eq!(loaded.nr_samples, Some(1));
        assert_eq!(loaded.state, ImportState::Invalid);
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_missing_doc_is_not_found() {
        let repo = repo();
        let d = doc("imp-x", "t-x", "PO-1", ImportState::Draft);
        assert!(matches!(repo.update(&d), Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_find_other_titles_filters_state_and_self() {
        let repo = repo();
        repo.insert(&doc("imp-1", "t-1", "PO-1", ImportState::Valid)).unwrap();
        repo.insert(&doc("imp-2", "t-2", "PO-1", ImportState::Draft)).unwrap();
        repo.insert(&doc("imp-3", "t-3", "PO-1", ImportState::Imported)).unwrap();

        let states = [ImportState::Valid, ImportState::Imported];
        let others = repo
            .find_other_titles(ImportKeyField::ClientOrderNumber, "PO-1", &states, "imp-1")
            .unwrap();
        assert_eq!(others, vec!["t-3"]);
        assert!(repo
            .find_other_titles(ImportKeyField::ClientReference, "PO-1", &states, "imp-9")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_list_and_title_exists() {
        let repo = repo();
        repo.insert(&doc("imp-1", "t-1", "PO-1", ImportState::Valid)).unwrap();
        repo.insert(&doc("imp-2", "t-2", "PO-2", ImportState::Draft)).unwrap();

        assert_eq!(repo.list(None, None).unwrap().len(), 2);
        let valid = repo.list(Some("c-1"), Some(ImportState::Valid)).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].id, "imp-1");
        assert!(repo.title_exists("t-2").unwrap());
        assert!(!repo.title_exists("t-9").unwrap());
    }
}
