//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: Can be reconstructed from the durable topics
//! - **User-scoped**: Data is partitioned by owning user
//! - **Subscribers**: registered per aggregate topic in [`crate::bootstrap`]

pub mod content_banks;
pub mod quizzes;

pub use content_banks::ContentBankProjection;
pub use quizzes::{QuizProjection, QuizView};
