// ==========================================
// 样品导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use std::error::Error;

/// 默认值（config_kv 缺失或格式错误时使用）
pub const DEFAULT_MIN_FILE_LINES: usize = 3;
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_DATE_INPUT_FORMAT: &str = "%d/%m/%Y";
pub const DEFAULT_MIN_REFERENCE_LENGTH: usize = 2;
pub const DEFAULT_CONTACT_FALLBACK: bool = true;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader: Send + Sync {
    /// 上传文件最少行数
    ///
    /// # 默认值
    /// - 3
    fn get_min_file_lines(&self) -> Result<usize, Box<dyn Error>>;

    /// 上传文件大小上限（字节）
    ///
    /// # 默认值
    /// - 10 MiB
    fn get_max_file_size_bytes(&self) -> Result<usize, Box<dyn Error>>;

    /// 样品日期列的输入格式（chrono 格式串,日/月/年）
    ///
    /// # 默认值
    /// - "%d/%m/%Y"
    fn get_date_input_format(&self) -> Result<String, Box<dyn Error>>;

    /// 引用字段值的最短长度
    ///
    /// # 默认值
    /// - 2
    fn get_min_reference_length(&self) -> Result<usize, Box<dyn Error>>;

    /// 指定联系人不存在时是否回退到客户的第一个联系人
    ///
    /// # 默认值
    /// - true
    fn get_contact_fallback(&self) -> Result<bool, Box<dyn Error>>;
}

// ==========================================
// ImportSettings - 单次动作使用的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub min_file_lines: usize,
    pub max_file_size_bytes: usize,
    pub date_input_format: String,
    pub min_reference_length: usize,
    pub contact_fallback: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            min_file_lines: DEFAULT_MIN_FILE_LINES,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            date_input_format: DEFAULT_DATE_INPUT_FORMAT.to_string(),
            min_reference_length: DEFAULT_MIN_REFERENCE_LENGTH,
            contact_fallback: DEFAULT_CONTACT_FALLBACK,
        }
    }
}

impl ImportSettings {
    /// 一次性读取全部导入配置
    pub fn load<C: ImportConfigReader + ?Sized>(config: &C) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            min_file_lines: config.get_min_file_lines()?,
            max_file_size_bytes: config.get_max_file_size_bytes()?,
            date_input_format: config.get_date_input_format()?,
            min_reference_length: config.get_min_reference_length()?,
            contact_fallback: config.get_contact_fallback()?,
        })
    }
}
