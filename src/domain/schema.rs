// ==========================================
// 样品导入系统 - 目标单据字段表
// ==========================================
// 职责: 静态声明样品申请单 (AnalysisRequest) 的字段及类型
// 用途: 物化器/校验器/建单工厂共享同一张表
// 红线: 不在运行时探测目标单据 schema
// ==========================================

use crate::domain::types::CatalogType;

// ==========================================
// FieldKind - 字段类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 布尔: '' / '0' / 'no' / 'false' / 'none' 为假,其他为真
    Boolean,
    /// 引用: 按标题或 UID 在 allowed 目录中查找
    Reference {
        allowed: &'static [CatalogType],
        multi_valued: bool,
        required: bool,
    },
    /// 日期时间: 日/月/年
    DateTime,
    /// 文本: 原样保留
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn reference(allowed: &'static [CatalogType]) -> FieldKind {
    FieldKind::Reference {
        allowed,
        multi_valued: false,
        required: false,
    }
}

pub static REQUEST_SCHEMA: &[FieldSpec] = &[
    FieldSpec { name: "ClientSampleID", kind: FieldKind::Text },
    FieldSpec { name: "ClientReference", kind: FieldKind::Text },
    FieldSpec { name: "ClientOrderNumber", kind: FieldKind::Text },
    FieldSpec { name: "SamplingDate", kind: FieldKind::DateTime },
    FieldSpec { name: "DateSampled", kind: FieldKind::DateTime },
    FieldSpec { name: "Sampler", kind: FieldKind::Text },
    FieldSpec { name: "SamplePoint", kind: reference(&[CatalogType::SamplePoint]) },
    FieldSpec {
        name: "SampleType",
        kind: FieldKind::Reference {
            allowed: &[CatalogType::SampleType],
            multi_valued: false,
            required: true,
        },
    },
    FieldSpec { name: "SampleMatrix", kind: reference(&[CatalogType::SampleMatrix]) },
    FieldSpec { name: "ContainerType", kind: reference(&[CatalogType::ContainerType]) },
    FieldSpec { name: "Container", kind: reference(&[CatalogType::Container]) },
    FieldSpec { name: "Specification", kind: reference(&[CatalogType::AnalysisSpec]) },
    FieldSpec {
        name: "PublicationSpecification",
        kind: reference(&[CatalogType::AnalysisSpec]),
    },
    FieldSpec { name: "SampleCondition", kind: reference(&[CatalogType::SampleCondition]) },
    FieldSpec { name: "Priority", kind: FieldKind::Text },
    FieldSpec { name: "EnvironmentalConditions", kind: FieldKind::Text },
    FieldSpec { name: "ReportDryMatter", kind: FieldKind::Boolean },
    FieldSpec { name: "Composite", kind: FieldKind::Boolean },
    FieldSpec { name: "InvoiceExclude", kind: FieldKind::Boolean },
    FieldSpec { name: "Remarks", kind: FieldKind::Text },
    FieldSpec { name: "Batch", kind: reference(&[CatalogType::Batch]) },
    FieldSpec {
        name: "Contact",
        kind: FieldKind::Reference {
            allowed: &[CatalogType::Contact],
            multi_valued: false,
            required: true,
        },
    },
    FieldSpec {
        name: "CCContact",
        kind: FieldKind::Reference {
            allowed: &[CatalogType::Contact],
            multi_valued: true,
            required: false,
        },
    },
];

/// 按字段名查找字段定义（大小写敏感,精确匹配）
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    REQUEST_SCHEMA.iter().find(|spec| spec.name == name)
}

/// 由导入单（而非样品行）在提交时提供的字段
pub static DOCUMENT_FIELDS: &[&str] = &["Contact", "CCContact", "Batch"];

pub fn is_document_field(name: &str) -> bool {
    DOCUMENT_FIELDS.contains(&name)
}

// ==========================================
// 按标题解析的列
// ==========================================
// 这些列不走通用强转:标题查不到时字段留空,不报错
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleResolvedColumn {
    pub column: &'static str,
    pub field: &'static str,
    pub catalog: CatalogType,
}

pub static TITLE_RESOLVED_COLUMNS: &[TitleResolvedColumn] = &[
    TitleResolvedColumn {
        column: "ContainerType",
        field: "ContainerType",
        catalog: CatalogType::ContainerType,
    },
    TitleResolvedColumn {
        column: "SampleMatrix",
        field: "SampleMatrix",
        catalog: CatalogType::SampleMatrix,
    },
    TitleResolvedColumn {
        column: "SampleContainer",
        field: "Container",
        catalog: CatalogType::Container,
    },
    TitleResolvedColumn {
        column: "AnalysisSpecification",
        field: "Specification",
        catalog: CatalogType::AnalysisSpec,
    },
];
