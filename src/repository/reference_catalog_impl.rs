// ==========================================
// 样品导入系统 - 参考目录 Repository 实现
// ==========================================
// 职责: 实现参考数据查询（使用 rusqlite）,以及初始化/种子数据写入
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::json_column;
use crate::domain::reference::{
    AnalysisProfile, AnalysisService, Batch, Client, Contact, ReferenceRecord,
};
use crate::domain::types::CatalogType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::reference_catalog::{LookupKey, ReferenceCatalog};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

// ==========================================
// ReferenceSeed - 参考数据种子（JSON）
// ==========================================
// 用途: CLI `seed` 子命令与集成测试
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSeed {
    pub clients: Vec<Client>,
    pub contacts: Vec<Contact>,
    /// 目录类型 → 标题列表（SamplePoint / SampleType / ...）
    pub setup_items: BTreeMap<String, Vec<SeedItem>>,
    pub services: Vec<AnalysisService>,
    pub profiles: Vec<AnalysisProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedItem {
    pub uid: String,
    pub title: String,
}

/// 通用设置项对应的目录类型
fn setup_catalog(name: &str) -> Option<CatalogType> {
    match name {
        "SamplePoint" => Some(CatalogType::SamplePoint),
        "SampleType" => Some(CatalogType::SampleType),
        "SampleMatrix" => Some(CatalogType::SampleMatrix),
        "ContainerType" => Some(CatalogType::ContainerType),
        "Container" => Some(CatalogType::Container),
        "AnalysisSpec" => Some(CatalogType::AnalysisSpec),
        "SampleCondition" => Some(CatalogType::SampleCondition),
        _ => None,
    }
}

// ==========================================
// ReferenceCatalogImpl
// ==========================================
pub struct ReferenceCatalogImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceCatalogImpl {
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

    // ==========================================
    // 写入（初始化 / 种子数据）
    // ==========================================

    pub fn insert_client(&self, client: &Client) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO client (uid, name, client_id) VALUES (?1, ?2, ?3)",
            params![client.uid, client.name, client.client_id],
        )?;
        Ok(())
    }

    pub fn insert_contact(&self, contact: &Contact) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO contact (uid, client_uid, fullname, email, cc_contact_uids_json)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                contact.uid,
                contact.client_uid,
                contact.fullname,
                contact.email,
                serde_json::to_string(&contact.cc_contact_uids)?,
            ],
        )?;
        Ok(())
    }

    pub fn insert_setup_item(
        &self,
        catalog: CatalogType,
        uid: &str,
        title: &str,
    ) -> RepositoryResult<()> {
        if setup_catalog(catalog.to_db_str()).is_none() {
            return Err(RepositoryError::FieldValueError {
                field: "portal_type".to_string(),
                message: format!("{} 不是通用设置项类型", catalog),
            });
        }
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO setup_item (uid, portal_type, title) VALUES (?1, ?2, ?3)",
            params![uid, catalog.to_db_str(), title],
        )?;
        Ok(())
    }

    pub fn insert_service(&self, service: &AnalysisService) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO analysis_service (uid, title, keyword) VALUES (?1, ?2, ?3)",
            params![service.uid, service.title, service.keyword],
        )?;
        Ok(())
    }

    /// 写入分析组合及其成员分析项（单事务）
    pub fn insert_profile(&self, profile: &AnalysisProfile) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO analysis_profile (uid, title, profile_key) VALUES (?1, ?2, ?3)",
            params![profile.uid, profile.title, profile.profile_key],
        )?;
        tx.execute(
            "DELETE FROM analysis_profile_service WHERE profile_uid = ?1",
            params![profile.uid],
        )?;
        for service_uid in &profile.service_uids {
            tx.execute(
                "INSERT INTO analysis_profile_service (profile_uid, service_uid) VALUES (?1, ?2)",
                params![profile.uid, service_uid],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 按种子写入全部参考数据
    pub fn seed(&self, seed: &ReferenceSeed) -> RepositoryResult<()> {
        for client in &seed.clients {
            self.insert_client(client)?;
        }
        for contact in &seed.contacts {
            self.insert_contact(contact)?;
        }
        for (type_name, items) in &seed.setup_items {
            let catalog = setup_catalog(type_name).ok_or_else(|| RepositoryError::FieldValueError {
                field: "setup_items".to_string(),
                message: format!("未知的设置项类型: {}", type_name),
            })?;
            for item in items {
                self.insert_setup_item(catalog, &item.uid, &item.title)?;
            }
        }
        for service in &seed.services {
            self.insert_service(service)?;
        }
        for profile in &seed.profiles {
            self.insert_profile(profile)?;
        }
        info!(
            clients = seed.clients.len(),
            contacts = seed.contacts.len(),
            services = seed.services.len(),
            profiles = seed.profiles.len(),
            "参考数据已写入"
        );
        Ok(())
    }

    /// 批次按 UID 查询
    pub fn find_batch(&self, uid: &str) -> RepositoryResult<Option<Batch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                r#"SELECT uid, client_uid, title, description, client_batch_id, batch_date, extra_fields_json
                   FROM batch WHERE uid = ?1"#,
                params![uid],
                map_batch,
            )
            .optional()?;
        Ok(batch)
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        catalog: CatalogType,
        value: &str,
    ) -> RepositoryResult<Vec<ReferenceRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map(params![value], |row| {
                Ok(ReferenceRecord {
                    uid: row.get(0)?,
                    catalog,
                    title: row.get(1)?,
                    keyword: row.get(2)?,
                    profile_key: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn map_batch(row: &rusqlite::Row<'_>) -> rusqlite::Result<Batch> {
    Ok(Batch {
        uid: row.get(0)?,
        client_uid: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        client_batch_id: row.get(4)?,
        batch_date: row.get(5)?,
        extra_fields: json_column(row, 6)?,
    })
}

fn map_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        uid: row.get(0)?,
        client_uid: row.get(1)?,
        fullname: row.get(2)?,
        email: row.get(3)?,
        cc_contact_uids: json_column(row, 4)?,
    })
}

impl ReferenceCatalog for ReferenceCatalogImpl {
    fn lookup(
        &self,
        catalog: CatalogType,
        key: LookupKey<'_>,
    ) -> RepositoryResult<Vec<ReferenceRecord>> {
        // (表, 标题列, 关键字列, 组合键列, 额外条件)
        let (table, title_col, keyword_col, profile_key_col, scoped) = match catalog {
            CatalogType::Client => ("client", "name", "NULL", "NULL", false),
            CatalogType::Contact => ("contact", "fullname", "NULL", "NULL", false),
            CatalogType::Batch => ("batch", "title", "NULL", "NULL", false),
            CatalogType::AnalysisService => ("analysis_service", "title", "keyword", "NULL", false),
            CatalogType::AnalysisProfile => {
                ("analysis_profile", "title", "NULL", "profile_key", false)
            }
            _ => ("setup_item", "title", "NULL", "NULL", true),
        };

        let key_col = match key {
            LookupKey::Title(_) => title_col,
            LookupKey::Uid(_) => "uid",
            LookupKey::Keyword(_) if keyword_col != "NULL" => keyword_col,
            LookupKey::ProfileKey(_) if profile_key_col != "NULL" => profile_key_col,
            _ => return Ok(Vec::new()),
        };

        let mut sql = format!(
            "SELECT uid, {title}, {keyword}, {profile_key} FROM {table} WHERE {key_col} = ?1",
            title = title_col,
            keyword = keyword_col,
            profile_key = profile_key_col,
            table = table,
            key_col = key_col,
        );
        if scoped {
            sql.push_str(&format!(" AND portal_type = '{}'", catalog.to_db_str()));
        }
        sql.push_str(" ORDER BY rowid");

        let conn = self.get_conn()?;
        Self::query_records(&conn, &sql, catalog, key.value())
    }

    fn find_client(&self, client_uid: &str) -> RepositoryResult<Option<Client>> {
        let conn = self.get_conn()?;
        let client = conn
            .query_row(
                "SELECT uid, name, client_id FROM client WHERE uid = ?1",
                params![client_uid],
                |row| {
                    Ok(Client {
                        uid: row.get(0)?,
                        name: row.get(1)?,
                        client_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(client)
    }

    fn list_contacts(&self, client_uid: &str) -> RepositoryResult<Vec<Contact>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT uid, client_uid, fullname, email, cc_contact_uids_json
               FROM contact WHERE client_uid = ?1 ORDER BY rowid"#,
        )?;
        let contacts = stmt
            .query_map(params![client_uid], map_contact)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    fn find_batch_by_title(&self, client_uid: &str, title: &str) -> RepositoryResult<Option<Batch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                r#"SELECT uid, client_uid, title, description, client_batch_id, batch_date, extra_fields_json
                   FROM batch WHERE client_uid = ?1 AND title = ?2
                   ORDER BY rowid LIMIT 1"#,
                params![client_uid, title],
                map_batch,
            )
            .optional()?;
        Ok(batch)
    }

    fn analysis_keywords(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT keyword FROM analysis_service ORDER BY rowid")?;
        let keywords = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keywords)
    }

    fn find_service(&self, key: LookupKey<'_>) -> RepositoryResult<Option<AnalysisService>> {
        let column = match key {
            LookupKey::Keyword(_) => "keyword",
            LookupKey::Title(_) => "title",
            LookupKey::Uid(_) => "uid",
            LookupKey::ProfileKey(_) => return Ok(None),
        };
        let sql = format!(
            "SELECT uid, title, keyword FROM analysis_service WHERE {} = ?1 ORDER BY rowid LIMIT 1",
            column
        );

        let conn = self.get_conn()?;
        let service = conn
            .query_row(&sql, params![key.value()], |row| {
                Ok(AnalysisService {
                    uid: row.get(0)?,
                    title: row.get(1)?,
                    keyword: row.get(2)?,
                })
            })
            .optional()?;
        Ok(service)
    }

    fn list_profiles(&self) -> RepositoryResult<Vec<AnalysisProfile>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT uid, title, profile_key FROM analysis_profile ORDER BY rowid")?;
        let mut profiles = stmt
            .query_map([], |row| {
                Ok(AnalysisProfile {
                    uid: row.get(0)?,
                    title: row.get(1)?,
                    profile_key: row.get(2)?,
                    service_uids: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut members = conn.prepare(
            "SELECT service_uid FROM analysis_profile_service WHERE profile_uid = ?1 ORDER BY rowid",
        )?;
        for profile in &mut profiles {
            profile.service_uids = members
                .query_map(params![profile.uid], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
        }
        Ok(profiles)
    }
}
