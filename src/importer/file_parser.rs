// ==========================================
// 样品导入系统 - 文件解析器实现
// ==========================================
// 职责: 原始字节 → 逐行单元格（已 TRIM）
// 支持: CSV (.csv/.txt) / Excel (.xlsx/.xls 第一个工作表)
// 红线: 全空行在此层丢弃,上层只看到非空行
// ==========================================

use crate::domain::sample_import::OriginalFile;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::sample_importer_trait::{FileParser, RowStream};
use calamine::{open_workbook_auto_from_rs, Reader};
use csv::{ReaderBuilder, Trim};
use std::io::Cursor;

/// 是否整行空白
fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.is_empty())
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn rows<'a>(&self, file: &'a OriginalFile) -> ImportResult<RowStream<'a>> {
        let data = file.data();
        let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

        let reader = ReaderBuilder::new()
            .has_headers(false) // 分节文件没有统一表头
            .flexible(true) // 允许行长度不一致
            .trim(Trim::All)
            .from_reader(data);

        // 惰性逐行读取;非 UTF-8 字节按替换字符处理
        let rows = reader
            .into_byte_records()
            .map(|result| {
                result.map_err(ImportError::from).map(|record| {
                    record
                        .iter()
                        .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .filter(|row| !matches!(row, Ok(cells) if is_blank(cells)));

        Ok(Box::new(rows))
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn rows<'a>(&self, file: &'a OriginalFile) -> ImportResult<RowStream<'a>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(file.data().to_vec()))?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.to_string().trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|cells| !is_blank(cells))
            .collect();

        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn rows<'a>(&self, file: &'a OriginalFile) -> ImportResult<RowStream<'a>> {
        let ext = file
            .filename()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "txt" | "" => CsvParser.rows(file),
            "xlsx" | "xls" => ExcelParser.rows(file),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}
