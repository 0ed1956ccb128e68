use crate::database::DbPool;
use crate::entities::{lesson_entity, student_entity, LessonStatus};
use crate::error::{AppError, AppResult};
use crate::external::StatusNotifier;
use crate::models::*;
use crate::services::TutorLocks;
use crate::utils::pagination::{PaginationInfo, PaginationParams};
use crate::utils::schedule;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct LessonService {
    pool: DbPool,
    notifier: StatusNotifier,
    locks: TutorLocks,
}

impl LessonService {
    pub fn new(pool: DbPool, notifier: StatusNotifier, locks: TutorLocks) -> Self {
        Self {
            pool,
            notifier,
            locks,
        }
    }

    /// Whether the tutor already has a non-cancelled lesson intersecting
    /// `[start, end)`. Cancelled lessons free their slot. Callers must have
    /// validated the interval (`start < end`) beforehand.
    pub async fn has_conflict(
        &self,
        tutor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_lesson_id: Option<Uuid>,
    ) -> AppResult<bool> {
        let mut query = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::Status.ne(LessonStatus::Cancelled))
            .filter(lesson_entity::Column::StartTime.lt(end))
            .filter(lesson_entity::Column::EndTime.gt(start));

        if let Some(exclude_id) = exclude_lesson_id {
            query = query.filter(lesson_entity::Column::Id.ne(exclude_id));
        }

        Ok(query.limit(1).one(&*self.pool).await?.is_some())
    }

    pub async fn list_lessons(
        &self,
        tutor_id: i64,
        query: LessonQuery,
    ) -> AppResult<LessonListResponse> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut find = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::TutorId.eq(tutor_id));

        if let Some(start_date) = query.start_date {
            find = find.filter(lesson_entity::Column::StartTime.gte(start_date));
        }
        if let Some(end_date) = query.end_date {
            find = find.filter(lesson_entity::Column::StartTime.lte(end_date));
        }
        if let Some(student_id) = query.student_id {
            find = find.filter(lesson_entity::Column::StudentId.eq(student_id));
        }
        if let Some(status) = &query.status {
            let statuses = parse_status_list(status)?;
            find = find.filter(lesson_entity::Column::Status.is_in(statuses));
        }

        let total = find.clone().count(&*self.pool).await? as i64;
        let lessons = find
            .order_by_desc(lesson_entity::Column::StartTime)
            .offset(params.get_offset() as u64)
            .limit(params.get_limit() as u64)
            .all(&*self.pool)
            .await?;

        let briefs = self.student_briefs(tutor_id, &lessons).await?;
        let lessons = lessons
            .into_iter()
            .map(|l| attach_student(l, &briefs))
            .collect();

        Ok(LessonListResponse {
            lessons,
            pagination: PaginationInfo::new(params.get_page(), params.get_limit(), total),
        })
    }

    pub async fn get_lesson(&self, tutor_id: i64, lesson_id: Uuid) -> AppResult<LessonResponse> {
        let lesson = self.find_owned(tutor_id, lesson_id).await?;
        let briefs = self
            .student_briefs(tutor_id, std::slice::from_ref(&lesson))
            .await?;
        Ok(attach_student(lesson, &briefs))
    }

    /// 未来的 SCHEDULED/RESCHEDULED 课程，按开始时间升序
    pub async fn get_upcoming_lessons(&self, tutor_id: i64) -> AppResult<Vec<LessonResponse>> {
        let lessons = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::StartTime.gte(Utc::now()))
            .filter(
                lesson_entity::Column::Status
                    .is_in([LessonStatus::Scheduled, LessonStatus::Rescheduled]),
            )
            .order_by_asc(lesson_entity::Column::StartTime)
            .all(&*self.pool)
            .await?;

        let briefs = self.student_briefs(tutor_id, &lessons).await?;
        Ok(lessons
            .into_iter()
            .map(|l| attach_student(l, &briefs))
            .collect())
    }

    /// Create a single lesson, or materialize a weekly series up to three
    /// calendar months ahead when `is_recurring` is set. Occurrences whose
    /// slot conflicts are silently skipped; a series where every slot
    /// conflicts fails as a whole and creates nothing.
    pub async fn create_lesson(
        &self,
        tutor_id: i64,
        req: CreateLessonRequest,
    ) -> AppResult<CreateLessonResponse> {
        validate_time_range(req.start_time, req.end_time)?;
        validate_not_in_past(req.start_time)?;
        validate_price(req.price)?;

        let student = self.find_owned_student(tutor_id, req.student_id).await?;
        let price = req.price.or(student.hourly_rate);

        // 锁住该 tutor，避免并发请求同时通过冲突检查
        let _guard = self.locks.acquire(tutor_id).await;

        if !req.is_recurring {
            if self
                .has_conflict(tutor_id, req.start_time, req.end_time, None)
                .await?
            {
                return Err(AppError::Conflict(
                    "Time slot conflicts with an existing lesson".to_string(),
                ));
            }

            let lesson = lesson_entity::ActiveModel {
                id: Set(Uuid::new_v4()),
                tutor_id: Set(tutor_id),
                student_id: Set(req.student_id),
                subject: Set(req.subject),
                lesson_type: Set(req.lesson_type),
                description: Set(req.description),
                start_time: Set(req.start_time),
                end_time: Set(req.end_time),
                price: Set(price),
                is_paid: Set(false),
                status: Set(LessonStatus::Scheduled),
                is_recurring: Set(false),
                series_id: Set(None),
                homework: Set(req.homework),
                notes: Set(req.notes),
                grade: Set(None),
                ..Default::default()
            }
            .insert(&*self.pool)
            .await?;

            self.notifier
                .notify_status_change(lesson.id, lesson.status.clone(), tutor_id);

            return Ok(CreateLessonResponse {
                lesson: LessonResponse::from(lesson).with_student(student.into()),
                created_count: 1,
            });
        }

        self.create_series(tutor_id, req, student, price).await
    }

    async fn create_series(
        &self,
        tutor_id: i64,
        req: CreateLessonRequest,
        student: student_entity::Model,
        price: Option<f64>,
    ) -> AppResult<CreateLessonResponse> {
        let series_id = Uuid::new_v4();
        let horizon = schedule::series_horizon(req.start_time);
        let slots = schedule::weekly_slots(req.start_time, req.end_time, horizon);

        let mut staged = Vec::new();
        let mut first_id = None;
        for (slot_start, slot_end) in slots {
            if self
                .has_conflict(tutor_id, slot_start, slot_end, None)
                .await?
            {
                // 冲突的周次直接跳过，不影响其余周次
                continue;
            }

            // 描述、作业、备注只属于种子课程，不向后续周次传播
            let is_seed_slot = slot_start == req.start_time;
            let id = Uuid::new_v4();
            if first_id.is_none() {
                first_id = Some(id);
            }

            staged.push(lesson_entity::ActiveModel {
                id: Set(id),
                tutor_id: Set(tutor_id),
                student_id: Set(req.student_id),
                subject: Set(req.subject.clone()),
                lesson_type: Set(req.lesson_type.clone()),
                description: Set(if is_seed_slot {
                    req.description.clone()
                } else {
                    None
                }),
                start_time: Set(slot_start),
                end_time: Set(slot_end),
                price: Set(price),
                is_paid: Set(false),
                status: Set(LessonStatus::Scheduled),
                is_recurring: Set(true),
                series_id: Set(Some(series_id)),
                homework: Set(if is_seed_slot {
                    req.homework.clone()
                } else {
                    None
                }),
                notes: Set(if is_seed_slot { req.notes.clone() } else { None }),
                grade: Set(None),
                ..Default::default()
            });
        }

        if staged.is_empty() {
            return Err(AppError::Conflict(
                "Cannot create recurring lessons: every weekly slot conflicts".to_string(),
            ));
        }

        let created_count = staged.len() as u64;
        lesson_entity::Entity::insert_many(staged)
            .exec(&*self.pool)
            .await?;

        let first_id = first_id.ok_or_else(|| {
            AppError::InternalError("Recurring series lost its first occurrence".to_string())
        })?;
        let first = self.find_owned(tutor_id, first_id).await?;

        self.notifier
            .notify_status_change(first.id, first.status.clone(), tutor_id);

        log::info!(
            "Created {created_count} recurring lessons for tutor {tutor_id} (series {series_id})"
        );

        Ok(CreateLessonResponse {
            lesson: LessonResponse::from(first).with_student(student.into()),
            created_count,
        })
    }

    pub async fn update_lesson(
        &self,
        tutor_id: i64,
        lesson_id: Uuid,
        req: UpdateLessonRequest,
    ) -> AppResult<LessonResponse> {
        let lesson = self.find_owned(tutor_id, lesson_id).await?;

        validate_price(req.price)?;
        validate_grade(req.grade)?;

        let time_changed = req.start_time.is_some() || req.end_time.is_some();
        let start = req.start_time.unwrap_or(lesson.start_time);
        let end = req.end_time.unwrap_or(lesson.end_time);

        let _guard = self.locks.acquire(tutor_id).await;

        if time_changed {
            validate_time_range(start, end)?;
            if self
                .has_conflict(tutor_id, start, end, Some(lesson_id))
                .await?
            {
                return Err(AppError::Conflict(
                    "Time slot conflicts with an existing lesson".to_string(),
                ));
            }
        }

        let mut am = lesson.into_active_model();
        if let Some(description) = req.description {
            am.description = Set(Some(description));
        }
        if time_changed {
            am.start_time = Set(start);
            am.end_time = Set(end);
        }
        if let Some(price) = req.price {
            am.price = Set(Some(price));
        }
        if let Some(is_paid) = req.is_paid {
            am.is_paid = Set(is_paid);
        }
        if let Some(homework) = req.homework {
            am.homework = Set(Some(homework));
        }
        if let Some(notes) = req.notes {
            am.notes = Set(Some(notes));
        }
        if let Some(grade) = req.grade {
            am.grade = Set(Some(grade));
        }
        am.updated_at = Set(Some(Utc::now()));

        let lesson = am.update(&*self.pool).await?;
        let briefs = self
            .student_briefs(tutor_id, std::slice::from_ref(&lesson))
            .await?;
        Ok(attach_student(lesson, &briefs))
    }

    /// Cancel frees the slot immediately for new bookings.
    pub async fn cancel_lesson(&self, tutor_id: i64, lesson_id: Uuid) -> AppResult<LessonResponse> {
        let lesson = self.find_owned(tutor_id, lesson_id).await?;
        if lesson.status == LessonStatus::Cancelled {
            return Err(AppError::ValidationError(
                "Lesson is already cancelled".to_string(),
            ));
        }

        let lesson = self
            .set_status(lesson, LessonStatus::Cancelled, tutor_id)
            .await?;
        Ok(lesson.into())
    }

    /// Restore re-checks the slot: another lesson may have been booked into
    /// it while this one was cancelled.
    pub async fn restore_lesson(
        &self,
        tutor_id: i64,
        lesson_id: Uuid,
    ) -> AppResult<LessonResponse> {
        let lesson = self.find_owned(tutor_id, lesson_id).await?;
        if lesson.status != LessonStatus::Cancelled {
            return Err(AppError::ValidationError(
                "Only a cancelled lesson can be restored".to_string(),
            ));
        }

        let _guard = self.locks.acquire(tutor_id).await;

        if self
            .has_conflict(tutor_id, lesson.start_time, lesson.end_time, Some(lesson_id))
            .await?
        {
            return Err(AppError::Conflict(
                "Time slot was taken while the lesson was cancelled".to_string(),
            ));
        }

        let lesson = self
            .set_status(lesson, LessonStatus::Scheduled, tutor_id)
            .await?;
        Ok(lesson.into())
    }

    pub async fn reschedule_lesson(
        &self,
        tutor_id: i64,
        lesson_id: Uuid,
        req: RescheduleLessonRequest,
    ) -> AppResult<LessonResponse> {
        let lesson = self.find_owned(tutor_id, lesson_id).await?;
        if matches!(
            lesson.status,
            LessonStatus::Cancelled | LessonStatus::Completed
        ) {
            return Err(AppError::ValidationError(
                "A cancelled or completed lesson cannot be rescheduled".to_string(),
            ));
        }

        validate_time_range(req.start_time, req.end_time)?;

        let _guard = self.locks.acquire(tutor_id).await;

        if self
            .has_conflict(tutor_id, req.start_time, req.end_time, Some(lesson_id))
            .await?
        {
            return Err(AppError::Conflict(
                "Time slot conflicts with an existing lesson".to_string(),
            ));
        }

        let mut am = lesson.into_active_model();
        am.start_time = Set(req.start_time);
        am.end_time = Set(req.end_time);
        am.status = Set(LessonStatus::Rescheduled);
        am.updated_at = Set(Some(Utc::now()));
        let lesson = am.update(&*self.pool).await?;

        self.notifier
            .notify_status_change(lesson.id, lesson.status.clone(), tutor_id);

        Ok(lesson.into())
    }

    /// Delete one lesson; with `delete_all_future` on a recurring lesson,
    /// delete every not-yet-finished occurrence of its series from this
    /// lesson onward. Returns the number of rows deleted.
    pub async fn delete_lesson(
        &self,
        tutor_id: i64,
        lesson_id: Uuid,
        delete_all_future: bool,
    ) -> AppResult<u64> {
        let lesson = self.find_owned(tutor_id, lesson_id).await?;

        if delete_all_future && lesson.is_recurring {
            if let Some(series_id) = lesson.series_id {
                let result = lesson_entity::Entity::delete_many()
                    .filter(lesson_entity::Column::TutorId.eq(tutor_id))
                    .filter(lesson_entity::Column::SeriesId.eq(series_id))
                    .filter(lesson_entity::Column::StartTime.gte(lesson.start_time))
                    .filter(
                        lesson_entity::Column::Status
                            .is_not_in([LessonStatus::Cancelled, LessonStatus::Completed]),
                    )
                    .exec(&*self.pool)
                    .await?;
                return Ok(result.rows_affected);
            }
        }

        let result = lesson_entity::Entity::delete_many()
            .filter(lesson_entity::Column::Id.eq(lesson_id))
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .exec(&*self.pool)
            .await?;
        Ok(result.rows_affected)
    }

    async fn set_status(
        &self,
        lesson: lesson_entity::Model,
        status: LessonStatus,
        tutor_id: i64,
    ) -> AppResult<lesson_entity::Model> {
        let id = lesson.id;
        let mut am = lesson.into_active_model();
        am.status = Set(status.clone());
        am.updated_at = Set(Some(Utc::now()));
        let lesson = am.update(&*self.pool).await?;

        self.notifier.notify_status_change(id, status, tutor_id);
        Ok(lesson)
    }

    /// Scoped lookup: a lesson belonging to another tutor is reported as
    /// not found, never as forbidden.
    async fn find_owned(&self, tutor_id: i64, lesson_id: Uuid) -> AppResult<lesson_entity::Model> {
        lesson_entity::Entity::find()
            .filter(lesson_entity::Column::Id.eq(lesson_id))
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))
    }

    async fn find_owned_student(
        &self,
        tutor_id: i64,
        student_id: Uuid,
    ) -> AppResult<student_entity::Model> {
        student_entity::Entity::find()
            .filter(student_entity::Column::Id.eq(student_id))
            .filter(student_entity::Column::TutorId.eq(tutor_id))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }

    async fn student_briefs(
        &self,
        tutor_id: i64,
        lessons: &[lesson_entity::Model],
    ) -> AppResult<HashMap<Uuid, StudentBrief>> {
        let ids: Vec<Uuid> = lessons.iter().map(|l| l.student_id).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let students = student_entity::Entity::find()
            .filter(student_entity::Column::TutorId.eq(tutor_id))
            .filter(student_entity::Column::Id.is_in(ids))
            .all(&*self.pool)
            .await?;
        Ok(students.into_iter().map(|s| (s.id, s.into())).collect())
    }
}

fn attach_student(
    lesson: lesson_entity::Model,
    briefs: &HashMap<Uuid, StudentBrief>,
) -> LessonResponse {
    let student = briefs.get(&lesson.student_id).cloned();
    let response = LessonResponse::from(lesson);
    match student {
        Some(student) => response.with_student(student),
        None => response,
    }
}

fn parse_status_list(raw: &str) -> AppResult<Vec<LessonStatus>> {
    raw.split(',')
        .map(|s| {
            LessonStatus::try_from_value(&s.trim().to_string())
                .map_err(|_| AppError::ValidationError(format!("Unknown lesson status: {s}")))
        })
        .collect()
}

fn validate_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if start >= end {
        return Err(AppError::ValidationError(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}

fn validate_not_in_past(start: DateTime<Utc>) -> AppResult<()> {
    // 按分钟截断，几秒前拼好的请求不会被拒
    if start < schedule::truncate_to_minute(Utc::now()) {
        return Err(AppError::ValidationError(
            "Start time must be in the future".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: Option<f64>) -> AppResult<()> {
    if let Some(price) = price {
        if price < 0.0 {
            return Err(AppError::ValidationError(
                "Price must not be negative".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_grade(grade: Option<i32>) -> AppResult<()> {
    if let Some(grade) = grade {
        if !(1..=5).contains(&grade) {
            return Err(AppError::ValidationError(
                "Grade must be between 1 and 5".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{LessonType, Subject};
    use chrono::{Duration, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn notifier() -> StatusNotifier {
        StatusNotifier::new(16)
    }

    fn lesson_fixture(tutor_id: i64) -> lesson_entity::Model {
        lesson_entity::Model {
            id: Uuid::new_v4(),
            tutor_id,
            student_id: Uuid::new_v4(),
            subject: Subject::Mathematics,
            lesson_type: LessonType::Ege,
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap(),
            price: Some(1500.0),
            is_paid: false,
            status: LessonStatus::Scheduled,
            is_recurring: false,
            series_id: None,
            homework: None,
            notes: None,
            grade: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn service_with(db: sea_orm::DatabaseConnection) -> LessonService {
        LessonService::new(std::sync::Arc::new(db), notifier(), TutorLocks::new())
    }

    fn student_fixture(tutor_id: i64) -> student_entity::Model {
        student_entity::Model {
            id: Uuid::new_v4(),
            tutor_id,
            name: "Ivan Sidorov".to_string(),
            email: None,
            phone: None,
            notes: None,
            hourly_rate: Some(1500.0),
            grade: Some(9),
            created_at: None,
            updated_at: None,
        }
    }

    fn series_request(start: DateTime<Utc>, student_id: Uuid) -> CreateLessonRequest {
        CreateLessonRequest {
            subject: Subject::Mathematics,
            lesson_type: LessonType::Ege,
            description: Some("seed".to_string()),
            start_time: start,
            end_time: start + Duration::hours(1),
            price: Some(1500.0),
            student_id,
            homework: None,
            notes: None,
            is_recurring: true,
        }
    }

    #[tokio::test]
    async fn test_has_conflict_detects_overlap() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![lesson_fixture(1)]])
            .into_connection();
        let service = service_with(db);

        let start = Utc.with_ymd_and_hms(2025, 6, 2, 10, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 11, 30, 0).unwrap();
        assert!(service.has_conflict(1, start, end, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_has_conflict_free_slot() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<lesson_entity::Model>::new()])
            .into_connection();
        let service = service_with(db);

        let start = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 13, 0, 0).unwrap();
        assert!(!service.has_conflict(1, start, end, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_lesson_rejects_inverted_interval() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service_with(db);

        let start = Utc::now() + Duration::days(1);
        let req = CreateLessonRequest {
            subject: Subject::Physics,
            lesson_type: LessonType::Oge,
            description: None,
            start_time: start,
            end_time: start - Duration::hours(1),
            price: None,
            student_id: Uuid::new_v4(),
            homework: None,
            notes: None,
            is_recurring: false,
        };

        let err = service.create_lesson(1, req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_lesson_rejects_past_start() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service_with(db);

        let start = Utc::now() - Duration::hours(2);
        let req = CreateLessonRequest {
            subject: Subject::Physics,
            lesson_type: LessonType::Oge,
            description: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            price: None,
            student_id: Uuid::new_v4(),
            homework: None,
            notes: None,
            is_recurring: false,
        };

        let err = service.create_lesson(1, req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_lesson_rejects_negative_price() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service_with(db);

        let start = Utc::now() + Duration::days(1);
        let req = CreateLessonRequest {
            subject: Subject::Mathematics,
            lesson_type: LessonType::School,
            description: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            price: Some(-100.0),
            student_id: Uuid::new_v4(),
            homework: None,
            notes: None,
            is_recurring: false,
        };

        let err = service.create_lesson(1, req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_restore_requires_cancelled_status() {
        // fixture 是 SCHEDULED，restore 应被拒绝
        let fixture = lesson_fixture(1);
        let id = fixture.id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![fixture]])
            .into_connection();
        let service = service_with(db);

        let err = service.restore_lesson(1, id).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_cancel_rejects_already_cancelled() {
        let mut fixture = lesson_fixture(1);
        fixture.status = LessonStatus::Cancelled;
        let id = fixture.id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![fixture]])
            .into_connection();
        let service = service_with(db);

        let err = service.cancel_lesson(1, id).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_series_fails_when_every_slot_conflicts() {
        // 每个周次槽位都被占：整体失败，不落库任何课程
        let start = schedule::truncate_to_minute(Utc::now() + Duration::days(1));
        let slots = schedule::weekly_slots(
            start,
            start + Duration::hours(1),
            schedule::series_horizon(start),
        );

        let student = student_fixture(1);
        let student_id = student.id;
        let mut mock = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![student]]);
        for _ in 0..slots.len() {
            mock = mock.append_query_results([vec![lesson_fixture(1)]]);
        }
        let service = service_with(mock.into_connection());

        let err = service
            .create_lesson(1, series_request(start, student_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_series_skips_conflicting_slot() {
        // 第 3 周被占：该周跳过，其余周次照常创建
        let start = schedule::truncate_to_minute(Utc::now() + Duration::days(1));
        let slots = schedule::weekly_slots(
            start,
            start + Duration::hours(1),
            schedule::series_horizon(start),
        );

        let student = student_fixture(1);
        let student_id = student.id;
        let mut mock = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![student]]);
        for i in 0..slots.len() {
            if i == 2 {
                mock = mock.append_query_results([vec![lesson_fixture(1)]]);
            } else {
                mock = mock.append_query_results([Vec::<lesson_entity::Model>::new()]);
            }
        }
        let expected = slots.len() as u64 - 1;
        let mut seed = lesson_fixture(1);
        seed.is_recurring = true;
        seed.series_id = Some(Uuid::new_v4());
        let db = mock
            .append_query_results([vec![seed]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: expected,
            }])
            .into_connection();
        let service = service_with(db);

        let response = service
            .create_lesson(1, series_request(start, student_id))
            .await
            .unwrap();
        assert_eq!(response.created_count, expected);
        assert!(response.lesson.is_recurring);
    }

    #[tokio::test]
    async fn test_reschedule_rejects_conflicting_slot() {
        // 目标时段已被占：报冲突，原课程保持不变（无 update 语句）
        let fixture = lesson_fixture(1);
        let id = fixture.id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![fixture]])
            .append_query_results([vec![lesson_fixture(1)]])
            .into_connection();
        let service = service_with(db);

        let start = Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
        let err = service
            .reschedule_lesson(
                1,
                id,
                RescheduleLessonRequest {
                    start_time: start,
                    end_time: start + Duration::hours(1),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cancel_scheduled_lesson_broadcasts() {
        let fixture = lesson_fixture(1);
        let id = fixture.id;
        let mut cancelled = fixture.clone();
        cancelled.status = LessonStatus::Cancelled;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![fixture]])
            .append_query_results([vec![cancelled]])
            .into_connection();

        let notifier = notifier();
        let mut rx = notifier.subscribe();
        let service =
            LessonService::new(std::sync::Arc::new(db), notifier, TutorLocks::new());

        let response = service.cancel_lesson(1, id).await.unwrap();
        assert_eq!(response.status, LessonStatus::Cancelled);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.lesson_id, id);
        assert_eq!(event.status, LessonStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_conflict_query_ignores_cancelled_lessons() {
        // 已取消的课程让出时段：冲突查询按状态过滤
        let db = std::sync::Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<lesson_entity::Model>::new()])
                .into_connection(),
        );
        let service = LessonService::new(db.clone(), notifier(), TutorLocks::new());

        let start = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let free = !service
            .has_conflict(1, start, start + Duration::hours(1), None)
            .await
            .unwrap();
        assert!(free);

        drop(service);
        let Ok(db) = std::sync::Arc::try_unwrap(db) else {
            panic!("connection still shared");
        };
        let log = db.into_transaction_log();
        assert!(format!("{:?}", log[0]).contains("CANCELLED"));
    }

    #[tokio::test]
    async fn test_lesson_not_found_is_scoped_by_tutor() {
        // 其他 tutor 的课程查不到，返回 NotFound 而不是泄露存在性
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<lesson_entity::Model>::new()])
            .into_connection();
        let service = service_with(db);

        let err = service.get_lesson(99, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_parse_status_list() {
        let statuses = parse_status_list("SCHEDULED, RESCHEDULED").unwrap();
        assert_eq!(
            statuses,
            vec![LessonStatus::Scheduled, LessonStatus::Rescheduled]
        );
        assert!(parse_status_list("NOT_A_STATUS").is_err());
    }

    #[test]
    fn test_validate_grade_range() {
        assert!(validate_grade(None).is_ok());
        assert!(validate_grade(Some(1)).is_ok());
        assert!(validate_grade(Some(5)).is_ok());
        assert!(validate_grade(Some(0)).is_err());
        assert!(validate_grade(Some(6)).is_err());
    }
}
