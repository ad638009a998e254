//! Quiz projection: status and answer counts per quiz.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use snippetquiz_core::{AggregateId, UserId};
use snippetquiz_events::{AggregateSubscriber, Event};
use snippetquiz_quiz::{QuizAnswerMarked, QuizCreated, QuizStatus};

use crate::app_event::AppEvent;
use crate::read_model::UserStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizView {
    pub id: AggregateId,
    pub user_id: UserId,
    pub content_bank_id: AggregateId,
    pub bank_name: String,
    pub status: QuizStatus,
    pub questions_answered: u32,
    pub correct_answers: u32,
    /// Every question has an answer.
    pub finished: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub struct QuizProjection<S> {
    store: S,
}

impl<S> QuizProjection<S>
where
    S: UserStore<AggregateId, QuizView>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn apply(&self, event: &Event<AppEvent>) {
        let (quiz_id, user_id) = (event.aggregate_id(), event.user_id());

        match event.payload() {
            AppEvent::QuizCreated(e) => self.apply_created(quiz_id, user_id, e),
            AppEvent::QuizStatusUpdated(e) => {
                self.update(quiz_id, user_id, event.occurred_on(), |view| {
                    view.status = e.status;
                });
            }
            AppEvent::QuizAnswerMarked(e) => self.apply_answer(quiz_id, user_id, event, e),
            AppEvent::QuizDeleted(_) => {
                self.store.remove(user_id, &quiz_id);
            }
            _ => {}
        }
    }

    fn apply_created(&self, quiz_id: AggregateId, user_id: UserId, e: &QuizCreated) {
        let view = QuizView {
            id: quiz_id,
            user_id,
            content_bank_id: e.content_bank_id,
            bank_name: e.bank_name.clone(),
            status: e.status,
            questions_answered: 0,
            correct_answers: 0,
            finished: false,
            created_at: e.created_at,
            updated_at: e.created_at,
        };
        self.store.upsert(user_id, quiz_id, view);
    }

    fn apply_answer(
        &self,
        quiz_id: AggregateId,
        user_id: UserId,
        event: &Event<AppEvent>,
        e: &QuizAnswerMarked,
    ) {
        self.update(quiz_id, user_id, event.occurred_on(), |view| {
            view.questions_answered += 1;
            if e.quiz_question_response.is_correct {
                view.correct_answers += 1;
            }
            view.finished = e.is_all_questions_marked;
        });
    }

    fn update(
        &self,
        quiz_id: AggregateId,
        user_id: UserId,
        at: NaiveDateTime,
        change: impl FnOnce(&mut QuizView),
    ) {
        if let Some(mut view) = self.store.get(user_id, &quiz_id) {
            change(&mut view);
            view.updated_at = at;
            self.store.upsert(user_id, quiz_id, view);
        }
    }
}

impl<S> AggregateSubscriber<AppEvent> for QuizProjection<S>
where
    S: UserStore<AggregateId, QuizView>,
{
    fn name(&self) -> &'static str {
        "quiz_projection"
    }

    fn on(&self, event: &Event<AppEvent>) -> anyhow::Result<()> {
        self.apply(event);
        Ok(())
    }
}
