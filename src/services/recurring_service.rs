use crate::database::DbPool;
use crate::entities::{lesson_entity, LessonStatus};
use crate::error::AppResult;
use crate::services::{LessonService, TutorLocks};
use crate::utils::schedule::{self, WEEK};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Maintenance job that keeps every active weekly series topped up to the
/// rolling three-month horizon. Safe to re-run: the anchor is the series'
/// latest persisted lesson and conflicting slots are skipped, so an
/// interrupted run just resumes where it left off.
#[derive(Clone)]
pub struct RecurringService {
    pool: DbPool,
    lessons: LessonService,
    locks: TutorLocks,
}

impl RecurringService {
    pub fn new(pool: DbPool, lessons: LessonService, locks: TutorLocks) -> Self {
        Self {
            pool,
            lessons,
            locks,
        }
    }

    /// Extend every series that still has SCHEDULED recurring lessons.
    /// Returns the total number of occurrences created; no active series is
    /// a no-op. The horizon is computed from `now`, not from the anchors.
    pub async fn extend_series(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let recurring = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::IsRecurring.eq(true))
            .filter(lesson_entity::Column::Status.eq(LessonStatus::Scheduled))
            .all(&*self.pool)
            .await?;

        if recurring.is_empty() {
            log::debug!("No recurring lessons to extend");
            return Ok(0);
        }

        // 按 tutor 分组，锁内处理该 tutor 的全部系列
        let mut by_tutor: BTreeMap<i64, BTreeSet<Uuid>> = BTreeMap::new();
        for lesson in &recurring {
            match lesson.series_id {
                Some(series_id) => {
                    by_tutor.entry(lesson.tutor_id).or_default().insert(series_id);
                }
                None => {
                    log::warn!("Recurring lesson {} has no series id, skipping", lesson.id);
                }
            }
        }

        let horizon = schedule::series_horizon(now);
        let mut total = 0u64;

        for (tutor_id, series_ids) in by_tutor {
            let _guard = self.locks.acquire(tutor_id).await;

            let mut staged = Vec::new();
            let mut staged_slots: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();

            for series_id in series_ids {
                // 取系列中最晚一课为锚点（含已取消/已完成，避免重复生成已覆盖的周）
                let anchor = lesson_entity::Entity::find()
                    .filter(lesson_entity::Column::SeriesId.eq(series_id))
                    .order_by_desc(lesson_entity::Column::StartTime)
                    .one(&*self.pool)
                    .await?;
                let Some(anchor) = anchor else {
                    continue;
                };

                let slots = schedule::weekly_slots(
                    anchor.start_time + WEEK,
                    anchor.end_time + WEEK,
                    horizon,
                );
                for (slot_start, slot_end) in slots {
                    if self
                        .lessons
                        .has_conflict(tutor_id, slot_start, slot_end, None)
                        .await?
                    {
                        continue;
                    }
                    // 同一批尚未落库的课程也要互查
                    if staged_slots
                        .iter()
                        .any(|&(s, e)| schedule::overlaps(s, e, slot_start, slot_end))
                    {
                        continue;
                    }

                    staged_slots.push((slot_start, slot_end));
                    // 只带结构字段，备注类字段不向后传播
                    staged.push(lesson_entity::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tutor_id: Set(tutor_id),
                        student_id: Set(anchor.student_id),
                        subject: Set(anchor.subject.clone()),
                        lesson_type: Set(anchor.lesson_type.clone()),
                        description: Set(None),
                        start_time: Set(slot_start),
                        end_time: Set(slot_end),
                        price: Set(anchor.price),
                        is_paid: Set(false),
                        status: Set(LessonStatus::Scheduled),
                        is_recurring: Set(true),
                        series_id: Set(Some(series_id)),
                        homework: Set(None),
                        notes: Set(None),
                        grade: Set(None),
                        ..Default::default()
                    });
                }
            }

            if staged.is_empty() {
                continue;
            }
            total += staged.len() as u64;
            lesson_entity::Entity::insert_many(staged)
                .exec(&*self.pool)
                .await?;
        }

        if total > 0 {
            log::info!("Extended recurring series: created {total} lessons");
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{LessonType, Subject};
    use crate::external::StatusNotifier;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn recurring_lesson(
        series_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> lesson_entity::Model {
        lesson_entity::Model {
            id: Uuid::new_v4(),
            tutor_id: 1,
            student_id: Uuid::new_v4(),
            subject: Subject::Physics,
            lesson_type: LessonType::Olympics,
            description: Some("seed notes stay on the seed".to_string()),
            start_time: start,
            end_time: end,
            price: Some(2000.0),
            is_paid: false,
            status: LessonStatus::Scheduled,
            is_recurring: true,
            series_id: Some(series_id),
            homework: None,
            notes: None,
            grade: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn service_with(db: sea_orm::DatabaseConnection) -> RecurringService {
        let db = std::sync::Arc::new(db);
        let locks = TutorLocks::new();
        let lessons = LessonService::new(db.clone(), StatusNotifier::new(16), locks.clone());
        RecurringService::new(db, lessons, locks)
    }

    #[tokio::test]
    async fn test_extend_without_recurring_lessons_is_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<lesson_entity::Model>::new()])
            .into_connection();
        let service = service_with(db);

        let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        assert_eq!(service.extend_series(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_extend_fills_up_to_horizon() {
        // now = anchor start = Jun 2; horizon Sep 2; new slots Jun 9 .. Sep 1 = 13
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let series_id = Uuid::new_v4();
        let anchor = recurring_lesson(series_id, now, now + chrono::Duration::hours(1));

        let mut mock = MockDatabase::new(DatabaseBackend::Postgres)
            // 所有 recurring SCHEDULED 课程
            .append_query_results([vec![anchor.clone()]])
            // 系列锚点查询
            .append_query_results([vec![anchor]]);
        // 13 个候选槽位全部空闲
        for _ in 0..13 {
            mock = mock.append_query_results([Vec::<lesson_entity::Model>::new()]);
        }
        let db = mock
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 13,
            }])
            .into_connection();

        let service = service_with(db);
        assert_eq!(service.extend_series(now).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn test_extend_skips_conflicting_week() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let series_id = Uuid::new_v4();
        let anchor = recurring_lesson(series_id, now, now + chrono::Duration::hours(1));
        let blocker = recurring_lesson(Uuid::new_v4(), now, now + chrono::Duration::hours(1));

        let mut mock = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![anchor.clone()]])
            .append_query_results([vec![anchor]]);
        // 第 3 个槽位被占，其余空闲
        for i in 0..13 {
            if i == 2 {
                mock = mock.append_query_results([vec![blocker.clone()]]);
            } else {
                mock = mock.append_query_results([Vec::<lesson_entity::Model>::new()]);
            }
        }
        let db = mock
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 12,
            }])
            .into_connection();

        let service = service_with(db);
        // 冲突周次被跳过，其余周次照常创建
        assert_eq!(service.extend_series(now).await.unwrap(), 12);
    }
}
