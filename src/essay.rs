use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EssayKind {
    /// Profile-only personal essay
    General,
    /// Essay tailored to the scholarship, its analysis and the match
    Specific,
}

impl EssayKind {
    pub fn label(self) -> &'static str {
        match self {
            EssayKind::General => "general",
            EssayKind::Specific => "specific",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssayDraft {
    pub kind: EssayKind,
    pub content: String,
    pub edited: bool,
}

impl EssayDraft {
    pub fn generated(kind: EssayKind, content: String) -> Self {
        Self {
            kind,
            content,
            edited: false,
        }
    }

    pub fn revise(&mut self, content: String) {
        if content != self.content {
            self.content = content;
            self.edited = true;
        }
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub id: Uuid,
    pub student_id: String,
    pub scholarship_id: String,
    pub kind: EssayKind,
    pub word_count: usize,
    pub edited: bool,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionReceipt {
    pub fn new(student_id: &str, scholarship_id: &str, draft: &EssayDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            scholarship_id: scholarship_id.to_string(),
            kind: draft.kind,
            word_count: draft.word_count(),
            edited: draft.edited,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revising_marks_draft_as_edited() {
        let mut draft = EssayDraft::generated(EssayKind::General, "I grew up".to_string());
        assert!(!draft.edited);

        draft.revise("I grew up".to_string());
        assert!(!draft.edited);

        draft.revise("I grew up in a farming town".to_string());
        assert!(draft.edited);
        assert_eq!(draft.word_count(), 7);
    }

    #[test]
    fn receipt_captures_draft_state() {
        let mut draft = EssayDraft::generated(EssayKind::Specific, "one two three".to_string());
        draft.revise("one two three four".to_string());

        let receipt = SubmissionReceipt::new("stu_001", "sch_001", &draft);
        assert_eq!(receipt.kind, EssayKind::Specific);
        assert_eq!(receipt.word_count, 4);
        assert!(receipt.edited);
        assert_eq!(receipt.id.get_version_num(), 4);

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["kind"], "specific");
    }
}
