// ==========================================
// 样品导入系统 - 字段值强转
// ==========================================
// 职责: 按 FieldKind 把单元格字符串转成 FieldValue（物化期）
//       以及对已物化值的复核（校验期）
// 规则:
//   布尔: '' / '0' / 'no' / 'false' / 'none'（大小写不敏感）为假
//   引用: 物化期按标题→UID 查找; 校验期只按 UID 查找
//   日期: 日/月/年,可带 时:分[:秒]
//   文本: 原样
// ==========================================

use crate::config::ImportSettings;
use crate::domain::diagnostic::Diagnostic;
use crate::domain::sample_import::FieldValue;
use crate::domain::schema::{FieldKind, FieldSpec};
use crate::domain::types::CatalogType;
use crate::repository::error::RepositoryResult;
use crate::repository::reference_catalog::{LookupKey, ReferenceCatalog};
use chrono::{NaiveDate, NaiveDateTime};

/// 布尔假值集合
const FALSE_VALUES: [&str; 5] = ["", "0", "no", "false", "none"];

pub const MSG_TOO_SHORT: &str = "value is too short";
pub const MSG_INVALID: &str = "value is invalid";

/// 单个字段的强转结果: 成功值或行级诊断
pub type Coercion = Result<FieldValue, Diagnostic>;

/// 布尔/勾选判定
pub fn is_truthy(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    !FALSE_VALUES.contains(&normalized.as_str())
}

/// 按日期格式解析,允许附带时间
pub fn parse_datetime(value: &str, date_format: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for time_format in ["%H:%M:%S", "%H:%M"] {
        let format = format!("{} {}", date_format, time_format);
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, &format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, date_format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ==========================================
// FieldMunger
// ==========================================
pub struct FieldMunger<'a, C: ReferenceCatalog + ?Sized> {
    catalog: &'a C,
    settings: &'a ImportSettings,
}

impl<'a, C: ReferenceCatalog + ?Sized> FieldMunger<'a, C> {
    pub fn new(catalog: &'a C, settings: &'a ImportSettings) -> Self {
        Self { catalog, settings }
    }

    /// 物化期强转（调用方保证 raw 非空）
    pub fn munge(&self, row: usize, spec: &FieldSpec, raw: &str) -> RepositoryResult<Coercion> {
        let invalid = || Diagnostic::field(row, spec.name, raw, MSG_INVALID);

        match spec.kind {
            FieldKind::Boolean => Ok(Ok(FieldValue::Flag(is_truthy(raw)))),
            FieldKind::Reference {
                allowed,
                multi_valued,
                ..
            } => self.munge_reference(row, spec.name, allowed, multi_valued, raw),
            FieldKind::DateTime => Ok(parse_datetime(raw, &self.settings.date_input_format)
                .map(FieldValue::DateTime)
                .ok_or_else(invalid)),
            FieldKind::Text => Ok(Ok(FieldValue::Text(raw.to_string()))),
        }
    }

    fn munge_reference(
        &self,
        row: usize,
        field: &str,
        allowed: &[CatalogType],
        multi_valued: bool,
        raw: &str,
    ) -> RepositoryResult<Coercion> {
        let value = raw.trim();
        if value.chars().count() < self.settings.min_reference_length {
            return Ok(Err(Diagnostic::field(row, field, value, MSG_TOO_SHORT)));
        }

        let mut found = self.catalog.lookup_first(allowed, LookupKey::Title(value))?;
        if found.is_empty() {
            found = self.catalog.lookup_first(allowed, LookupKey::Uid(value))?;
        }

        let mut uids = found.into_iter().map(|r| r.uid);
        if multi_valued {
            let uids: Vec<String> = uids.collect();
            if uids.is_empty() {
                return Ok(Err(Diagnostic::field(row, field, value, MSG_INVALID)));
            }
            return Ok(Ok(FieldValue::Uids(uids)));
        }
        Ok(uids
            .next()
            .map(FieldValue::Uid)
            .ok_or_else(|| Diagnostic::field(row, field, value, MSG_INVALID)))
    }

    /// 校验期复核已物化的值;None 表示通过
    pub fn check(
        &self,
        row: usize,
        spec: &FieldSpec,
        value: Option<&FieldValue>,
    ) -> RepositoryResult<Option<Diagnostic>> {
        let invalid =
            |v: &FieldValue| Some(Diagnostic::field(row, spec.name, v.to_string(), MSG_INVALID));

        match spec.kind {
            FieldKind::Boolean => Ok(match value {
                None | Some(FieldValue::Flag(_)) | Some(FieldValue::Text(_)) => None,
                Some(other) => invalid(other),
            }),
            FieldKind::Reference {
                allowed, required, ..
            } => {
                let uids: Vec<&str> = match value {
                    None => Vec::new(),
                    Some(FieldValue::Uid(uid)) | Some(FieldValue::Text(uid)) => {
                        if uid.trim().is_empty() {
                            Vec::new()
                        } else {
                            vec![uid.as_str()]
                        }
                    }
                    Some(FieldValue::Uids(uids)) => uids.iter().map(String::as_str).collect(),
                    Some(other) => return Ok(invalid(other)),
                };

                if uids.is_empty() {
                    return Ok(required.then(|| {
                        Diagnostic::row(row, format!("{} field requires a value", spec.name))
                    }));
                }

                for uid in uids {
                    let uid = uid.trim();
                    if self.catalog.lookup_first(allowed, LookupKey::Uid(uid))?.is_empty() {
                        return Ok(Some(Diagnostic::field(row, spec.name, uid, MSG_INVALID)));
                    }
                }
                Ok(None)
            }
            FieldKind::DateTime => Ok(match value {
                None | Some(FieldValue::DateTime(_)) => None,
                Some(FieldValue::Text(text))
                    if parse_datetime(text, &self.settings.date_input_format).is_some() =>
                {
                    None
                }
                Some(other) => invalid(other),
            }),
            FieldKind::Text => Ok(None),
        }
    }
}
