use crate::database::DbPool;
use crate::entities::{lesson_entity, LessonStatus};
use crate::error::AppResult;
use crate::external::StatusNotifier;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub started: u64,
    pub completed: u64,
}

/// Time-driven lesson status transitions. The sweep is stateless and
/// idempotent: its predicates only match lessons still in the
/// pre-transition state, so re-running with the same `now` is a no-op.
#[derive(Clone)]
pub struct StatusService {
    pool: DbPool,
    notifier: StatusNotifier,
}

impl StatusService {
    pub fn new(pool: DbPool, notifier: StatusNotifier) -> Self {
        Self { pool, notifier }
    }

    /// One sweep pass, optionally scoped to a single tutor. Start
    /// transitions run before completion ones so a lesson whose window has
    /// already closed ends up COMPLETED within the same sweep.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        tutor_id: Option<i64>,
    ) -> AppResult<SweepOutcome> {
        // SCHEDULED -> IN_PROGRESS while the window is open
        let mut start_query = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::Status.eq(LessonStatus::Scheduled))
            .filter(lesson_entity::Column::StartTime.lte(now))
            .filter(lesson_entity::Column::EndTime.gt(now));
        if let Some(tutor_id) = tutor_id {
            start_query = start_query.filter(lesson_entity::Column::TutorId.eq(tutor_id));
        }
        let starting = start_query.all(&*self.pool).await?;
        let started = self
            .transition(&starting, LessonStatus::Scheduled, LessonStatus::InProgress, now)
            .await?;

        // {SCHEDULED, IN_PROGRESS, RESCHEDULED} -> COMPLETED once the end
        // time has passed; a lesson the sweep never saw IN_PROGRESS still
        // completes here.
        let mut complete_query = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::Status.is_in([
                LessonStatus::Scheduled,
                LessonStatus::InProgress,
                LessonStatus::Rescheduled,
            ]))
            .filter(lesson_entity::Column::EndTime.lte(now));
        if let Some(tutor_id) = tutor_id {
            complete_query = complete_query.filter(lesson_entity::Column::TutorId.eq(tutor_id));
        }
        let completing = complete_query.all(&*self.pool).await?;
        let completed = self
            .complete(&completing, now)
            .await?;

        if started > 0 || completed > 0 {
            log::info!("Lesson status sweep: {started} started, {completed} completed");
        }

        Ok(SweepOutcome { started, completed })
    }

    async fn transition(
        &self,
        lessons: &[lesson_entity::Model],
        from: LessonStatus,
        to: LessonStatus,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        if lessons.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = lessons.iter().map(|l| l.id).collect();

        // 条件里重查状态，与并发修改竞争时以谓词为准
        let result = lesson_entity::Entity::update_many()
            .col_expr(lesson_entity::Column::Status, Expr::value(to.clone()))
            .col_expr(lesson_entity::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(lesson_entity::Column::Id.is_in(ids.clone()))
            .filter(lesson_entity::Column::Status.eq(from))
            .exec(&*self.pool)
            .await?;

        self.notify_transitioned(lessons, ids, to, result.rows_affected)
            .await?;

        Ok(result.rows_affected)
    }

    async fn complete(
        &self,
        lessons: &[lesson_entity::Model],
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        if lessons.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = lessons.iter().map(|l| l.id).collect();

        let result = lesson_entity::Entity::update_many()
            .col_expr(
                lesson_entity::Column::Status,
                Expr::value(LessonStatus::Completed),
            )
            .col_expr(lesson_entity::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(lesson_entity::Column::Id.is_in(ids.clone()))
            .filter(lesson_entity::Column::Status.is_in([
                LessonStatus::Scheduled,
                LessonStatus::InProgress,
                LessonStatus::Rescheduled,
            ]))
            .exec(&*self.pool)
            .await?;

        self.notify_transitioned(lessons, ids, LessonStatus::Completed, result.rows_affected)
            .await?;

        Ok(result.rows_affected)
    }

    /// Broadcast only what the guarded update actually committed. When the
    /// update matched fewer rows than were selected (a lesson was cancelled
    /// or rescheduled in between), re-read which of them landed in `status`
    /// and notify just those.
    async fn notify_transitioned(
        &self,
        lessons: &[lesson_entity::Model],
        ids: Vec<Uuid>,
        status: LessonStatus,
        rows_affected: u64,
    ) -> AppResult<()> {
        if rows_affected == lessons.len() as u64 {
            for lesson in lessons {
                self.notifier
                    .notify_status_change(lesson.id, status.clone(), lesson.tutor_id);
            }
            return Ok(());
        }

        let committed = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::Id.is_in(ids))
            .filter(lesson_entity::Column::Status.eq(status.clone()))
            .all(&*self.pool)
            .await?;
        for lesson in committed {
            self.notifier
                .notify_status_change(lesson.id, status.clone(), lesson.tutor_id);
        }
        Ok(())
    }
}
