// ==========================================
// 样品导入系统 - 导入单工作流
// ==========================================
// 状态: draft / invalid / valid / imported / cancelled
// 动作:
//   validate: draft|invalid|valid → valid|invalid（守卫: 已上传非空文件）
//   import:   valid → imported（单向,终态）
//   cancel:   draft|invalid|valid → cancelled（终态）
// 红线: 状态只在此处改写
// ==========================================

use crate::domain::sample_import::SampleImport;
use crate::domain::types::{ImportState, Transition};
use crate::importer::error::{ImportError, ImportResult};
use chrono::Utc;
use tracing::info;

pub struct ImportWorkflow;

impl ImportWorkflow {
    /// 状态层面允许的动作（不含守卫）
    fn allowed_by_state(state: ImportState, transition: Transition) -> bool {
        use ImportState::*;
        match transition {
            Transition::Validate | Transition::Cancel => matches!(state, Draft | Invalid | Valid),
            Transition::Import => state == Valid,
        }
    }

    fn guard(doc: &SampleImport, transition: Transition) -> bool {
        match transition {
            Transition::Validate => doc.has_file_content(),
            Transition::Import | Transition::Cancel => true,
        }
    }

    /// 当前可执行的动作
    pub fn available_transitions(doc: &SampleImport) -> Vec<Transition> {
        [Transition::Validate, Transition::Import, Transition::Cancel]
            .into_iter()
            .filter(|t| Self::is_available(doc, *t))
            .collect()
    }

    pub fn is_available(doc: &SampleImport, transition: Transition) -> bool {
        Self::allowed_by_state(doc.state, transition) && Self::guard(doc, transition)
    }

    /// 动作前检查;不可用时返回类型化错误
    pub fn ensure_available(doc: &SampleImport, transition: Transition) -> ImportResult<()> {
        if !Self::allowed_by_state(doc.state, transition) {
            return Err(ImportError::TransitionNotAllowed {
                action: transition.to_string(),
                state: doc.state.to_string(),
            });
        }
        if !Self::guard(doc, transition) {
            return Err(ImportError::GuardRejected(format!(
                "{}: 导入单 {} 没有上传文件内容",
                transition, doc.id
            )));
        }
        Ok(())
    }

    /// 校验结束: Errors 为空 → valid,否则 invalid
    pub fn finish_validation(doc: &mut SampleImport) -> ImportState {
        let target = if doc.has_errors() {
            ImportState::Invalid
        } else {
            ImportState::Valid
        };
        Self::move_to(doc, target);
        doc.date_validated = Some(Utc::now());
        target
    }

    pub fn mark_imported(doc: &mut SampleImport) {
        Self::move_to(doc, ImportState::Imported);
        doc.date_imported = Some(Utc::now());
    }

    pub fn mark_cancelled(doc: &mut SampleImport) {
        Self::move_to(doc, ImportState::Cancelled);
    }

    /// 编辑保存后是否需要自动重新校验
    pub fn should_revalidate_after_edit(doc: &SampleImport) -> bool {
        matches!(doc.state, ImportState::Valid | ImportState::Invalid)
            && Self::is_available(doc, Transition::Validate)
    }

    fn move_to(doc: &mut SampleImport, target: ImportState) {
        if doc.state != target {
            info!(import_id = %doc.id, from = %doc.state, to = %target, "导入单状态变更");
        }
        doc.state = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample_import::OriginalFile;

    fn doc(data: &[u8], state: ImportState) -> SampleImport {
        let mut doc = SampleImport::new("imp-1", "t-1", "c-1", OriginalFile::new("t.csv", data.to_vec()));
        doc.state = state;
        doc
    }

    #[test]
    fn test_available_transitions_per_state() {
        use Transition::*;
        assert_eq!(
            ImportWorkflow::available_transitions(&doc(b"x", ImportState::Draft)),
            vec![Validate, Cancel]
        );
        assert_eq!(
            ImportWorkflow::available_transitions(&doc(b"x", ImportState::Valid)),
            vec![Validate, Import, Cancel]
        );
        assert!(ImportWorkflow::available_transitions(&doc(b"x", ImportState::Imported)).is_empty());
        assert!(ImportWorkflow::available_transitions(&doc(b"x", ImportState::Cancelled)).is_empty());
    }

    #[test]
    fn test_validate_guard_requires_file_content() {
        let empty = doc(b"", ImportState::Draft);
        assert!(!ImportWorkflow::is_available(&empty, Transition::Validate));
        assert!(matches!(
            ImportWorkflow::ensure_available(&empty, Transition::Validate),
            Err(ImportError::GuardRejected(_))
        ));
    }

    #[test]
    fn test_import_only_from_valid() {
        let invalid = doc(b"x", ImportState::Invalid);
        assert!(matches!(
            ImportWorkflow::ensure_available(&invalid, Transition::Import),
            Err(ImportError::TransitionNotAllowed { .. })
        ));
    }

    #[test]
    fn test_finish_validation_sets_state_and_date() {
        let mut d = doc(b"x", ImportState::Draft);
        assert_eq!(ImportWorkflow::finish_validation(&mut d), ImportState::Valid);
        assert!(d.date_validated.is_some());

        d.push_error("Row 1: No valid analyses or profiles");
        assert_eq!(ImportWorkflow::finish_validation(&mut d), ImportState::Invalid);
    }

    #[test]
    fn test_revalidate_after_edit_only_when_validated() {
        assert!(!ImportWorkflow::should_revalidate_after_edit(&doc(b"x", ImportState::Draft)));
        assert!(ImportWorkflow::should_revalidate_after_edit(&doc(b"x", ImportState::Invalid)));
        assert!(ImportWorkflow::should_revalidate_after_edit(&doc(b"x", ImportState::Valid)));
        assert!(!ImportWorkflow::should_revalidate_after_edit(&doc(b"x", ImportState::Imported)));
    }
}
