use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use snippetquiz_core::AggregateId;
use snippetquiz_events::{EventDefinition, EventKind};

/// Lifecycle of a quiz while its questions are being generated and answered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizStatus {
    Prepare,
    InProgress,
    Ready,
    ReadyWithError,
}

impl QuizStatus {
    /// Whether question generation has finished (successfully or not).
    pub fn is_settled(self) -> bool {
        matches!(self, QuizStatus::Ready | QuizStatus::ReadyWithError)
    }
}

/// Domain event: a quiz was started from a content bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCreated {
    pub content_bank_id: AggregateId,
    pub bank_name: String,
    pub status: QuizStatus,
    pub created_at: NaiveDateTime,
}

impl EventDefinition for QuizCreated {
    const NAME: &'static str = "quiz.created";
    const KIND: EventKind = EventKind::Domain;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizStatusUpdated {
    pub status: QuizStatus,
}

impl EventDefinition for QuizStatusUpdated {
    const NAME: &'static str = "quiz.status.updated";
    const KIND: EventKind = EventKind::Domain;
}

/// The answer a user gave to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub question_id: i64,
    pub option_id: i64,
    pub is_correct: bool,
    pub correct_answer: String,
    pub response_time: String,
}

/// Domain event: an answer was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerMarked {
    pub quiz_question_response: QuestionResponse,
    pub is_all_questions_marked: bool,
}

impl EventDefinition for QuizAnswerMarked {
    const NAME: &'static str = "quiz.answer.marked";
    const KIND: EventKind = EventKind::Domain;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDeleted {}

impl EventDefinition for QuizDeleted {
    const NAME: &'static str = "quiz.deleted";
    const KIND: EventKind = EventKind::Domain;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressContentEntry {
    pub id: i64,
    pub name: String,
    pub word_count_analyzed: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    pub quiz_id: AggregateId,
    pub bank_id: AggregateId,
    pub total_content_entries: i32,
    pub total_content_entries_skipped: i32,
    pub current_content_entry_index: i32,
    pub questions_generated_so_far: i32,
    pub total_chunks: i32,
    pub current_chunk_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_entry: Option<ProgressContentEntry>,
}

impl GenerationProgress {
    /// The last chunk (or an empty generation) completes the quiz.
    pub fn is_last_chunk(&self) -> bool {
        self.total_chunks == 0 || self.current_chunk_index + 1 == self.total_chunks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCompleted {
    pub quiz_id: AggregateId,
}

/// Ephemeral progress update pushed to the user generating a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub progress: GenerationProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<QuizCompleted>,
}

impl QuizProgress {
    pub fn new(progress: GenerationProgress) -> Self {
        let completed = progress.is_last_chunk().then(|| QuizCompleted {
            quiz_id: progress.quiz_id,
        });
        Self {
            progress,
            completed,
        }
    }
}

impl EventDefinition for QuizProgress {
    const NAME: &'static str = "quiz.progress.ephemeral";
    const KIND: EventKind = EventKind::Ephemeral;
}
