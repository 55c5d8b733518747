// ==========================================
// 样品导入系统 - 诊断信息
// ==========================================
// 职责: 行级/字段级/单据级错误的统一表示
// 红线: 用户可见面只有 Display 后的字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Diagnostic - 单条诊断
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub row: Option<usize>,       // 行号（1 起,单据级为 None）
    pub field: Option<String>,    // 字段名
    pub value: Option<String>,    // 原始值
    pub message: String,          // 描述
}

impl Diagnostic {
    /// 单据级诊断
    pub fn document(message: impl Into<String>) -> Self {
        Self {
            row: None,
            field: None,
            value: None,
            message: message.into(),
        }
    }

    /// 行级诊断（不带字段）
    pub fn row(row: usize, message: impl Into<String>) -> Self {
        Self {
            row: Some(row),
            field: None,
            value: None,
            message: message.into(),
        }
    }

    /// 字段级诊断: "Row <n>: <message> (<field>=<value>)"
    pub fn field(
        row: usize,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row: Some(row),
            field: Some(field.into()),
            value: Some(value.into()),
            message: message.into(),
        }
    }

    pub fn is_row_scoped(&self) -> bool {
        self.row.is_some()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.row, &self.field) {
            (Some(row), Some(field)) => write!(
                f,
                "Row {}: {} ({}={})",
                row,
                self.message,
                field,
                self.value.as_deref().unwrap_or("")
            ),
            (Some(row), None) => write!(f, "Row {}: {}", row, self.message),
            (None, _) => write!(f, "{}", self.message),
        }
    }
}

// ==========================================
// Outcome - 步骤结果 + 诊断
// ==========================================
// 每个解析/校验步骤都返回 Outcome,由聚合根合并诊断
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// 无诊断的结果
    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_diagnostic_format() {
        let d = Diagnostic::field(3, "SamplePoint", "Nowhere", "value is invalid");
        assert_eq!(d.to_string(), "Row 3: value is invalid (SamplePoint=Nowhere)");
    }

    #[test]
    fn test_row_and_document_format() {
        assert_eq!(
            Diagnostic::row(2, "No valid analyses or profiles").to_string(),
            "Row 2: No valid analyses or profiles"
        );
        assert_eq!(
            Diagnostic::document("Unexpected header fields: a,b").to_string(),
            "Unexpected header fields: a,b"
        );
    }

    #[test]
    fn test_outcome_map_keeps_diagnostics() {
        let outcome = Outcome::new(2, vec![Diagnostic::document("x")]).map(|v| v * 2);
        assert_eq!(outcome.value, 4);
        assert_eq!(outcome.diagnostics.len(), 1);
    }
}
