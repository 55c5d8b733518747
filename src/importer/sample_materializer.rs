// ==========================================
// 样品导入系统 - 样品行物化器
// ==========================================
// 职责: 原始样品行 → SampleRow（字段强转 + 分析项/分析组合勾选）
// 规则:
//   - 声明样品数与实际行数不符 → 一条错误,本轮不物化任何行
//   - 声明样品数无法解析 → 本轮不物化（错误已由表头解析给出）
//   - 行内错误收集后统一返回,物化始终完成
// 红线: 未识别的列不报错,只记 debug 日志
// ==========================================

use crate::config::ImportSettings;
use crate::domain::diagnostic::{Diagnostic, Outcome};
use crate::domain::reference::AnalysisProfile;
use crate::domain::sample_import::{DeclaredCount, FieldValue, RawSampleRow, SampleRow};
use crate::domain::schema::{field_spec, TITLE_RESOLVED_COLUMNS};
use crate::importer::field_munger::{is_truthy, FieldMunger, MSG_INVALID};
use crate::importer::section_scanner::{SampleSection, SAMPLES_COLUMN};
use crate::repository::error::RepositoryResult;
use crate::repository::reference_catalog::{LookupKey, ReferenceCatalog};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// 行内"分析项/组合数"声明列
pub const ROW_TOTAL_COLUMN: &str = "Total number of Analyses or Profiles";
pub const NO_SAMPLE_DATA_ERROR: &str = "No sample data found";
const MSG_COUNT_MISMATCH: &str = "analysis/profile count mismatch";

/// 声明样品数与实际行数不符
pub fn count_mismatch(declared: usize, actual: usize) -> Diagnostic {
    Diagnostic::document(format!(
        "Number of samples declared ({}) does not match the number of sample rows ({})",
        declared, actual
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializedSamples {
    pub rows: Vec<SampleRow>,
    pub nr_samples: Option<usize>,
}

pub struct SampleMaterializer<'a, C: ReferenceCatalog + ?Sized> {
    catalog: &'a C,
    munger: FieldMunger<'a, C>,
}

impl<'a, C: ReferenceCatalog + ?Sized> SampleMaterializer<'a, C> {
    pub fn new(catalog: &'a C, settings: &'a ImportSettings) -> Self {
        Self {
            catalog,
            munger: FieldMunger::new(catalog, settings),
        }
    }

    #[instrument(skip(self, section))]
    pub fn materialize(
        &self,
        section: Option<SampleSection>,
        declared: DeclaredCount,
    ) -> RepositoryResult<Outcome<MaterializedSamples>> {
        let declared = match declared {
            DeclaredCount::Invalid(raw) => {
                debug!(raw = %raw, "声明样品数无法解析，放弃物化");
                return Ok(Outcome::clean(MaterializedSamples::default()));
            }
            DeclaredCount::Count(n) => Some(n),
            DeclaredCount::Undeclared => None,
        };

        let Some(section) = section else {
            return Ok(Outcome::new(
                MaterializedSamples {
                    rows: Vec::new(),
                    nr_samples: declared,
                },
                vec![Diagnostic::document(NO_SAMPLE_DATA_ERROR)],
            ));
        };

        let actual = section.rows.len();
        if let Some(declared) = declared {
            if declared != actual {
                debug!(declared, actual, "声明样品数与实际不符，放弃物化");
                return Ok(Outcome::new(
                    MaterializedSamples {
                        rows: Vec::new(),
                        nr_samples: Some(declared),
                    },
                    vec![count_mismatch(declared, actual)],
                ));
            }
        }

        let keywords: HashSet<String> = self.catalog.analysis_keywords()?.into_iter().collect();
        let profiles = self.catalog.list_profiles()?;

        let mut rows = Vec::with_capacity(actual);
        let mut diagnostics = Vec::new();
        for raw in section.rows {
            let row = self.materialize_row(raw, &keywords, &profiles, &mut diagnostics)?;
            rows.push(row);
        }

        debug!(rows = rows.len(), errors = diagnostics.len(), "样品行物化完成");
        Ok(Outcome::new(
            MaterializedSamples {
                rows,
                nr_samples: Some(declared.unwrap_or(actual)),
            },
            diagnostics,
        ))
    }

    fn materialize_row(
        &self,
        raw: RawSampleRow,
        keywords: &HashSet<String>,
        profiles: &[AnalysisProfile],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> RepositoryResult<SampleRow> {
        let row_number = raw.row_number;
        let mut cells = raw.cells;
        let mut take = |column: &str| -> Option<String> {
            let pos = cells.iter().position(|(k, _)| k == column)?;
            Some(cells.remove(pos).1)
        };

        let mut row = SampleRow::new(take(SAMPLES_COLUMN).unwrap_or_default());

        // ===== 按标题解析的列（查不到留空）=====
        for column in TITLE_RESOLVED_COLUMNS {
            let Some(value) = take(column.column).filter(|v| !v.is_empty()) else {
                continue;
            };
            if let Some(found) = self
                .catalog
                .lookup(column.catalog, LookupKey::Title(&value))?
                .into_iter()
                .next()
            {
                row.fields
                    .insert(column.field.to_string(), FieldValue::Uid(found.uid));
            } else {
                debug!(row = row_number, column = column.column, value = %value, "标题未解析，字段留空");
            }
        }

        // ===== 行内声明的勾选数 =====
        let mut expected_total = None;
        if let Some(value) = take(ROW_TOTAL_COLUMN).filter(|v| !v.is_empty()) {
            match value.parse::<usize>() {
                Ok(n) => expected_total = Some(n),
                Err(_) => {
                    diagnostics.push(Diagnostic::field(row_number, ROW_TOTAL_COLUMN, value, MSG_INVALID))
                }
            }
        }

        // ===== 目标字段 / 分析项 / 分析组合 =====
        let mut unconsumed = Vec::new();
        for (column, value) in cells {
            if let Some(spec) = field_spec(&column) {
                if value.is_empty() {
                    continue;
                }
                match self.munger.munge(row_number, spec, &value)? {
                    Ok(coerced) => {
                        row.fields.insert(column, coerced);
                    }
                    Err(diagnostic) => diagnostics.push(diagnostic),
                }
            } else if keywords.contains(&column) {
                if is_truthy(&value) {
                    row.analyses.push(column);
                }
            } else if profiles.iter().any(|p| p.selectors().any(|s| s == column)) {
                if is_truthy(&value) {
                    row.profiles.push(column);
                }
            } else {
                unconsumed.push(column);
            }
        }

        if !unconsumed.is_empty() {
            debug!(row = row_number, columns = ?unconsumed, "未识别的样品列");
        }

        if let Some(expected) = expected_total {
            let selected = row.selection_count();
            if selected != expected {
                diagnostics.push(Diagnostic::field(
                    row_number,
                    ROW_TOTAL_COLUMN,
                    format!("{} != {}", expected, selected),
                    MSG_COUNT_MISMATCH,
                ));
            }
        }

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CatalogType;
    use crate::importer::section_scanner::SectionScanner;
    use crate::importer::test_support::MemoryCatalog;

    fn section(text: &str) -> SampleSection {
        let rows = text
            .lines()
            .map(|line| Ok(line.split(',').map(|c| c.trim().to_string()).collect()));
        SectionScanner::scan(rows).unwrap().value.samples.unwrap()
    }

    const SAMPLES: &str = "\
Samples,ClientSampleID,DateSampled,SamplePoint,SampleMatrix,SampleType,ContainerType,ReportDryMatter,Total number of Analyses or Profiles,Price excl Tax,ECO,SAL,COL,TAS,MicroBio,Properties
Sample 1,HHS14001,3/9/2014,Toilet,Liquids,Water,Cup,0,1,10,,,,,1,
Sample 2,HHS14002,3/9/2014 10:30,Toilet,Liquids,Water,Cup,0,2,10,,,1,1,,";

    #[test]
    fn test_materialize_rows() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(SAMPLES)), DeclaredCount::Count(2))
            .unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);

        let samples = outcome.value;
        assert_eq!(samples.nr_samples, Some(2));
        assert_eq!(samples.rows.len(), 2);

        let first = &samples.rows[0];
        assert_eq!(first.sid, "Sample 1");
        assert_eq!(
            first.field("SampleType"),
            Some(&FieldValue::Uid(catalog.uid_of(CatalogType::SampleType, "Water")))
        );
        assert_eq!(
            first.field("SampleMatrix"),
            Some(&FieldValue::Uid(catalog.uid_of(CatalogType::SampleMatrix, "Liquids")))
        );
        assert_eq!(first.field("ReportDryMatter"), Some(&FieldValue::Flag(false)));
        assert_eq!(first.field("ClientSampleID"), Some(&FieldValue::Text("HHS14001".into())));
        assert!(first.field("Price excl Tax").is_none());
        assert!(first.analyses.is_empty());
        assert_eq!(first.profiles, vec!["MicroBio"]);

        let second = &samples.rows[1];
        assert_eq!(second.analyses, vec!["COL", "TAS"]);
        assert_eq!(second.field("DateSampled").unwrap().to_string(), "2014-09-03 10:30");
    }

    #[test]
    fn test_declared_count_mismatch_stops_materialization() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(SAMPLES)), DeclaredCount::Count(3))
            .unwrap();
        assert!(outcome.value.rows.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "Number of samples declared (3) does not match the number of sample rows (2)"
        );
    }

    #[test]
    fn test_undeclared_count_set_from_rows() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(SAMPLES)), DeclaredCount::Undeclared)
            .unwrap();
        assert_eq!(outcome.value.nr_samples, Some(2));
    }

    #[test]
    fn test_row_total_mismatch_keeps_row() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let text = "Samples,SampleType,Total number of Analyses or Profiles,ECO,SAL\nS1,Water,3,1,1";
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(text)), DeclaredCount::Undeclared)
            .unwrap();
        assert_eq!(outcome.value.rows.len(), 1);
        assert_eq!(outcome.value.rows[0].analyses, vec!["ECO", "SAL"]);
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "Row 1: analysis/profile count mismatch (Total number of Analyses or Profiles=3 != 2)"
        );
    }

    #[test]
    fn test_row_total_not_integer() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let text = "Samples,SampleType,Total number of Analyses or Profiles,ECO\nS1,Water,two,1";
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(text)), DeclaredCount::Undeclared)
            .unwrap();
        assert_eq!(
            outcome.diagnostics[0].to_string(),
            "Row 1: value is invalid (Total number of Analyses or Profiles=two)"
        );
    }

    #[test]
    fn test_false_and_blank_flags_not_selected() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let text = "Samples,SampleType,ECO,SAL,COL,TAS,PROPS\nS1,Water,no,FALSE,None,,yes";
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(text)), DeclaredCount::Undeclared)
            .unwrap();
        let row = &outcome.value.rows[0];
        assert!(row.analyses.is_empty());
        assert_eq!(row.profiles, vec!["PROPS"]);
    }

    #[test]
    fn test_field_errors_collected_per_row() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let text = "Samples,SampleType,SamplePoint,DateSampled,ECO\nS1,Water,Nowhere,soon,1\nS2,Water,X,,1";
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(text)), DeclaredCount::Undeclared)
            .unwrap();
        assert_eq!(outcome.value.rows.len(), 2);
        let messages: Vec<String> = outcome.diagnostics.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 1: value is invalid (SamplePoint=Nowhere)",
                "Row 1: value is invalid (DateSampled=soon)",
                "Row 2: value is too short (SamplePoint=X)",
            ]
        );
    }

    #[test]
    fn test_unknown_title_resolved_column_left_empty() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let text = "Samples,SampleType,SampleContainer,AnalysisSpecification,ContainerType,ECO\nS1,Water,Glass Bottle,Drinking Water,Bucket,1";
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(text)), DeclaredCount::Undeclared)
            .unwrap();
        assert!(outcome.is_clean());
        let row = &outcome.value.rows[0];
        assert_eq!(
            row.field("Container"),
            Some(&FieldValue::Uid(catalog.uid_of(CatalogType::Container, "Glass Bottle")))
        );
        assert_eq!(
            row.field("Specification"),
            Some(&FieldValue::Uid(catalog.uid_of(CatalogType::AnalysisSpec, "Drinking Water")))
        );
        assert!(row.field("ContainerType").is_none());
    }

    #[test]
    fn test_missing_samples_section() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(None, DeclaredCount::Count(4))
            .unwrap();
        assert!(outcome.value.rows.is_empty());
        assert_eq!(outcome.diagnostics[0].to_string(), NO_SAMPLE_DATA_ERROR);
    }

    #[test]
    fn test_invalid_declared_count_abandons_rows() {
        let catalog = MemoryCatalog::happy_hills();
        let settings = ImportSettings::default();
        let outcome = SampleMaterializer::new(&catalog, &settings)
            .materialize(Some(section(SAMPLES)), DeclaredCount::Invalid("four".into()))
            .unwrap();
        assert!(outcome.value.rows.is_empty());
        assert_eq!(outcome.value.nr_samples, None);
        assert!(outcome.is_clean());
    }
}
