// ==========================================
// 样品导入系统 - 建单工厂 Trait
// ==========================================
// 职责: 新建批次、新建样品申请单（不包含实现）
// 红线: 导入核心对参考数据唯一的写入口
// ==========================================

use crate::domain::reference::{AnalysisRequest, Batch, NewAnalysisRequest, NewBatch};
use crate::repository::error::RepositoryResult;

// ==========================================
// RecordFactory Trait
// ==========================================
// 实现者: RecordFactoryImpl（使用 rusqlite）
pub trait RecordFactory: Send + Sync {
    /// 新建批次
    ///
    /// # 说明
    /// - fields 中的 description / ClientBatchID 落到对应列,其余存为扩展字段
    fn create_batch(&self, batch: NewBatch) -> RepositoryResult<Batch>;

    /// 新建样品申请单,并为每个分析项 UID 生成一条分析记录
    ///
    /// # 说明
    /// - 单条申请单在一个事务内写入
    /// - 失败直接返回错误,调用方不吞掉
    fn create_analysis_request(
        &self,
        request: NewAnalysisRequest,
    ) -> RepositoryResult<AnalysisRequest>;
}
