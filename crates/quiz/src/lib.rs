//! Quiz context: quiz lifecycle and generation-progress events.

pub mod events;

/// Durable topic (and ephemeral channel prefix) for quiz events.
pub const AGGREGATE_TYPE: &str = "quiz-aggregate";

pub use events::{
    GenerationProgress, ProgressContentEntry, QuestionResponse, QuizAnswerMarked, QuizCompleted,
    QuizCreated, QuizDeleted, QuizProgress, QuizStatus, QuizStatusUpdated,
};
