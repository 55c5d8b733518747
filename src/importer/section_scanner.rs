// ==========================================
// 样品导入系统 - 分节扫描器
// ==========================================
// 职责: 非空行流 → {表头键值, 批次键值, 样品区}
// 规则: 第 0 列为分节标记（大小写不敏感,精确匹配）
//   header / header data / batch header / batch data / samples
// 红线: 分节不完整只记诊断,不中断扫描
// ==========================================

use crate::domain::diagnostic::{Diagnostic, Outcome};
use crate::domain::sample_import::RawSampleRow;
use crate::importer::error::ImportResult;
use tracing::debug;

pub const MARKER_HEADER: &str = "header";
pub const MARKER_HEADER_DATA: &str = "header data";
pub const MARKER_BATCH_HEADER: &str = "batch header";
pub const MARKER_BATCH_DATA: &str = "batch data";
pub const MARKER_SAMPLES: &str = "samples";

/// 样品区行标签列名
pub const SAMPLES_COLUMN: &str = "Samples";
/// 合计行标签前缀（小写比较）
const TOTALS_ROW_PREFIX: &str = "total analyses";

const DATE_SAMPLED: &str = "DateSampled";
const TIME_SAMPLED: &str = "TimeSampled";

pub const MISSING_HEADER_ERROR: &str = "File is missing header row or header data";
pub const MISSING_BATCH_ERROR: &str = "Missing batch headers or data";

// ==========================================
// SectionMap - 分节键值（保持首次出现顺序,重复键后者覆盖）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    entries: Vec<(String, String)>,
}

impl SectionMap {
    /// 键列与值列按位置配对;空键丢弃
    pub fn zip(keys: &[String], values: &[String]) -> Self {
        let mut map = SectionMap::default();
        for (key, value) in keys.iter().zip(values.iter()) {
            if key.is_empty() {
                continue;
            }
            map.insert(key.clone(), value.clone());
        }
        map
    }

    pub fn insert(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 取出并移除（消费）
    pub fn take(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn into_entries(self) -> Vec<(String, String)> {
        self.entries
    }
}

// ==========================================
// SampleSection - 样品区
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSection {
    pub columns: Vec<String>,
    pub rows: Vec<RawSampleRow>,
    pub totals: Option<RawSampleRow>,
}

// ==========================================
// ScannedFile - 扫描结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedFile {
    pub header: Option<SectionMap>,
    pub batch: Option<SectionMap>,
    pub samples: Option<SampleSection>,
}

// ==========================================
// SectionScanner
// ==========================================
pub struct SectionScanner;

impl SectionScanner {
    /// 单遍扫描;遇到 Samples 标记后,其余每个非空行都是样品数据行
    pub fn scan<I>(rows: I) -> ImportResult<Outcome<ScannedFile>>
    where
        I: IntoIterator<Item = ImportResult<Vec<String>>>,
    {
        let mut header_keys: Option<Vec<String>> = None;
        let mut header_values: Option<Vec<String>> = None;
        let mut batch_keys: Option<Vec<String>> = None;
        let mut batch_values: Option<Vec<String>> = None;
        let mut samples: Option<SampleSection> = None;
        let mut time_column: Option<usize> = None;
        let mut date_column: Option<usize> = None;

        for row in rows {
            let row = row?;
            if row.iter().all(|c| c.is_empty()) {
                continue;
            }

            if let Some(section) = samples.as_mut() {
                let cells = merge_time_sampled(row, date_column, time_column);
                push_sample_row(section, cells);
                continue;
            }

            let marker = row[0].to_lowercase();
            let rest = || row[1..].to_vec();
            match marker.as_str() {
                MARKER_HEADER => set_once(&mut header_keys, rest(), MARKER_HEADER),
                MARKER_HEADER_DATA => set_once(&mut header_values, rest(), MARKER_HEADER_DATA),
                MARKER_BATCH_HEADER => set_once(&mut batch_keys, rest(), MARKER_BATCH_HEADER),
                MARKER_BATCH_DATA => set_once(&mut batch_values, rest(), MARKER_BATCH_DATA),
                MARKER_SAMPLES => {
                    let mut columns = row;
                    columns[0] = SAMPLES_COLUMN.to_string();
                    date_column = columns.iter().position(|c| c == DATE_SAMPLED);
                    time_column = columns.iter().position(|c| c == TIME_SAMPLED);
                    if date_column.is_none() {
                        time_column = None;
                    }
                    if let Some(idx) = time_column {
                        columns.remove(idx);
                    }
                    samples = Some(SampleSection {
                        columns,
                        ..Default::default()
                    });
                }
                _ => debug!(marker = %row[0], "跳过分节外的行"),
            }
        }

        let mut diagnostics = Vec::new();
        let header = pair_section(header_keys, header_values, MISSING_HEADER_ERROR, &mut diagnostics);
        let batch = pair_section(batch_keys, batch_values, MISSING_BATCH_ERROR, &mut diagnostics);

        debug!(
            has_header = header.is_some(),
            has_batch = batch.is_some(),
            sample_rows = samples.as_ref().map(|s| s.rows.len()).unwrap_or(0),
            "分节扫描完成"
        );

        Ok(Outcome::new(
            ScannedFile {
                header,
                batch,
                samples,
            },
            diagnostics,
        ))
    }
}

/// 同一标记只取第一次出现的行
fn set_once(slot: &mut Option<Vec<String>>, cells: Vec<String>, marker: &str) {
    if slot.is_none() {
        *slot = Some(cells);
    } else {
        debug!(marker, "重复的分节标记行已忽略");
    }
}

/// 键行与值行配对;只有一半时记诊断并放弃该分节
fn pair_section(
    keys: Option<Vec<String>>,
    values: Option<Vec<String>>,
    missing_error: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<SectionMap> {
    match (keys, values) {
        (Some(keys), Some(values)) => Some(SectionMap::zip(&keys, &values)),
        (None, None) => None,
        _ => {
            diagnostics.push(Diagnostic::document(missing_error));
            None
        }
    }
}

/// TimeSampled 并入 DateSampled（空格连接）
fn merge_time_sampled(
    mut cells: Vec<String>,
    date_column: Option<usize>,
    time_column: Option<usize>,
) -> Vec<String> {
    let (Some(date_idx), Some(time_idx)) = (date_column, time_column) else {
        return cells;
    };
    if time_idx >= cells.len() {
        return cells;
    }
    let time = cells.remove(time_idx);
    // 日期列在时间列之后时,移除后索引左移一位
    let date_idx = if date_idx > time_idx { date_idx - 1 } else { date_idx };
    if let Some(date) = cells.get_mut(date_idx) {
        if !time.is_empty() {
            *date = format!("{} {}", date, time).trim().to_string();
        }
    }
    cells
}

fn push_sample_row(section: &mut SampleSection, cells: Vec<String>) {
    let label = cells.first().map(|c| c.to_lowercase()).unwrap_or_default();
    let mut paired: Vec<(String, String)> = section
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.clone(), cells.get(idx).cloned().unwrap_or_default()))
        .collect();
    paired.retain(|(column, _)| !column.is_empty());

    if label.starts_with(TOTALS_ROW_PREFIX) {
        section.totals = Some(RawSampleRow {
            row_number: 0,
            cells: paired,
        });
        return;
    }

    section.rows.push(RawSampleRow {
        row_number: section.rows.len() + 1,
        cells: paired,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(text: &str) -> Vec<ImportResult<Vec<String>>> {
        text.lines()
            .map(|line| Ok(line.split(',').map(|c| c.trim().to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_scan_all_sections() {
        let text = "\
Header,Client name,Client ID,Contact
Header Data,Happy Hills,HH,Rita Mohale
Batch Header,title,description,ClientBatchID
Batch Data,New Batch,Optional descr,CC 201506
Samples,ClientSampleID,SampleType,ECO
Sample 1,HHS14001,Water,1
Sample 2,HHS14002,Water,0";
        let outcome = SectionScanner::scan(rows(text)).unwrap();
        assert!(outcome.is_clean());
        let scanned = outcome.value;

        let header = scanned.header.unwrap();
        assert_eq!(header.get("Client name"), Some("Happy Hills"));
        assert_eq!(header.get("Contact"), Some("Rita Mohale"));

        let batch = scanned.batch.unwrap();
        assert_eq!(batch.get("title"), Some("New Batch"));
        assert_eq!(batch.get("ClientBatchID"), Some("CC 201506"));

        let samples = scanned.samples.unwrap();
        assert_eq!(samples.columns[0], "Samples");
        assert_eq!(samples.rows.len(), 2);
        assert_eq!(samples.rows[1].row_number, 2);
        assert_eq!(samples.rows[1].get("Samples"), Some("Sample 2"));
        assert_eq!(samples.rows[1].get("ECO"), Some("0"));
    }

    #[test]
    fn test_markers_case_insensitive() {
        let text = "HEADER,Client name\nheader data,Happy Hills\nSAMPLES,SampleType\nS1,Water";
        let scanned = SectionScanner::scan(rows(text)).unwrap().value;
        assert_eq!(scanned.header.unwrap().get("Client name"), Some("Happy Hills"));
        assert_eq!(scanned.samples.unwrap().rows.len(), 1);
    }

    #[test]
    fn test_header_without_data_reports_error() {
        let text = "Header,Client name\nSamples,SampleType\nS1,Water";
        let outcome = SectionScanner::scan(rows(text)).unwrap();
        assert!(outcome.value.header.is_none());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].to_string(), MISSING_HEADER_ERROR);
    }

    #[test]
    fn test_batch_data_without_keys_reports_error() {
        let text = "Batch Data,New Batch\nSamples,SampleType";
        let outcome = SectionScanner::scan(rows(text)).unwrap();
        assert!(outcome.value.batch.is_none());
        assert_eq!(outcome.diagnostics[0].to_string(), MISSING_BATCH_ERROR);
    }

    #[test]
    fn test_missing_sections_are_not_errors() {
        let outcome = SectionScanner::scan(rows("Samples,SampleType\nS1,Water")).unwrap();
        assert!(outcome.is_clean());
        assert!(outcome.value.header.is_none());
        assert!(outcome.value.batch.is_none());
    }

    #[test]
    fn test_duplicate_header_key_last_wins_and_empty_keys_dropped() {
        let text = "Header,Contact,,Contact\nHeader Data,First,ignored,Second";
        let header = SectionScanner::scan(rows(text)).unwrap().value.header.unwrap();
        assert_eq!(header.len(), 1);
        assert_eq!(header.get("Contact"), Some("Second"));
    }

    #[test]
    fn test_time_sampled_merged_into_date_sampled() {
        let text = "Samples,DateSampled,TimeSampled,SampleType\nS1,3/9/2014,10:30,Water\nS2,4/9/2014,,Water";
        let samples = SectionScanner::scan(rows(text)).unwrap().value.samples.unwrap();
        assert!(!samples.columns.iter().any(|c| c == "TimeSampled"));
        assert_eq!(samples.rows[0].get("DateSampled"), Some("3/9/2014 10:30"));
        assert_eq!(samples.rows[0].get("SampleType"), Some("Water"));
        assert_eq!(samples.rows[1].get("DateSampled"), Some("4/9/2014"));
    }

    #[test]
    fn test_totals_row_kept_aside() {
        let text = "Samples,ECO,SAL\nTotal Analyses or Profiles,,2\nS1,1,0\nS2,0,1";
        let samples = SectionScanner::scan(rows(text)).unwrap().value.samples.unwrap();
        assert_eq!(samples.rows.len(), 2);
        assert_eq!(samples.rows[0].get("Samples"), Some("S1"));
        assert_eq!(samples.rows[0].row_number, 1);
        assert_eq!(samples.totals.unwrap().get("SAL"), Some("2"));
    }

    #[test]
    fn test_short_rows_padded_with_empty_cells() {
        let text = "Samples,ClientSampleID,SampleType\nS1,HHS14001";
        let samples = SectionScanner::scan(rows(text)).unwrap().value.samples.unwrap();
        assert_eq!(samples.rows[0].get("SampleType"), Some(""));
    }
}
