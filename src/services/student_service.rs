use crate::database::DbPool;
use crate::entities::{lesson_entity, student_entity};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::validate_email;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct StudentService {
    pool: DbPool,
}

impl StudentService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_students(&self, tutor_id: i64) -> AppResult<Vec<StudentResponse>> {
        let students = student_entity::Entity::find()
            .filter(student_entity::Column::TutorId.eq(tutor_id))
            .order_by_asc(student_entity::Column::Name)
            .all(&*self.pool)
            .await?;
        if students.is_empty() {
            return Ok(Vec::new());
        }

        // 每个学生的课程总数，一次分组查询取齐
        let counts: Vec<(Uuid, i64)> = lesson_entity::Entity::find()
            .select_only()
            .column(lesson_entity::Column::StudentId)
            .column_as(lesson_entity::Column::Id.count(), "lesson_count")
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .group_by(lesson_entity::Column::StudentId)
            .into_tuple()
            .all(&*self.pool)
            .await?;
        let counts: HashMap<Uuid, u64> = counts
            .into_iter()
            .map(|(id, n)| (id, n.max(0) as u64))
            .collect();

        Ok(students
            .into_iter()
            .map(|s| {
                let count = counts.get(&s.id).copied().unwrap_or(0);
                let mut response = StudentResponse::from(s);
                response.lessons_count = Some(count);
                response
            })
            .collect())
    }

    /// Student card with the full lesson history, newest first.
    pub async fn get_student(
        &self,
        tutor_id: i64,
        student_id: Uuid,
    ) -> AppResult<StudentDetailResponse> {
        let student = self.find_owned(tutor_id, student_id).await?;
        let lessons = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::StudentId.eq(student_id))
            .order_by_desc(lesson_entity::Column::StartTime)
            .all(&*self.pool)
            .await?;
        Ok(StudentDetailResponse {
            student: student.into(),
            lessons: lessons.into_iter().map(LessonResponse::from).collect(),
        })
    }

    pub async fn create_student(
        &self,
        tutor_id: i64,
        request: CreateStudentRequest,
    ) -> AppResult<StudentResponse> {
        if request.name.trim().is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        if let Some(email) = &request.email {
            validate_email(email)?;
        }
        validate_hourly_rate(request.hourly_rate)?;
        validate_student_grade(request.grade)?;

        let student = student_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            tutor_id: Set(tutor_id),
            name: Set(request.name),
            email: Set(request.email),
            phone: Set(request.phone),
            notes: Set(request.notes),
            hourly_rate: Set(request.hourly_rate),
            grade: Set(request.grade),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!("Tutor {} created student {}", tutor_id, student.id);
        Ok(student.into())
    }

    pub async fn update_student(
        &self,
        tutor_id: i64,
        student_id: Uuid,
        request: UpdateStudentRequest,
    ) -> AppResult<StudentResponse> {
        let student = self.find_owned(tutor_id, student_id).await?;

        if let Some(email) = &request.email {
            validate_email(email)?;
        }
        validate_hourly_rate(request.hourly_rate)?;
        validate_student_grade(request.grade)?;

        let mut active: student_entity::ActiveModel = student.into();
        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(AppError::ValidationError("Name is required".to_string()));
            }
            active.name = Set(name);
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(rate) = request.hourly_rate {
            active.hourly_rate = Set(Some(rate));
        }
        if let Some(grade) = request.grade {
            active.grade = Set(Some(grade));
        }

        let updated = active.update(&*self.pool).await?;
        Ok(updated.into())
    }

    /// Deleting a student cascades to their lessons at the database level.
    pub async fn delete_student(&self, tutor_id: i64, student_id: Uuid) -> AppResult<()> {
        let student = self.find_owned(tutor_id, student_id).await?;
        student.delete(&*self.pool).await?;
        log::info!("Tutor {} deleted student {}", tutor_id, student_id);
        Ok(())
    }

    // 归属校验：别的 tutor 的学生一律按不存在处理
    async fn find_owned(&self, tutor_id: i64, student_id: Uuid) -> AppResult<student_entity::Model> {
        student_entity::Entity::find_by_id(student_id)
            .filter(student_entity::Column::TutorId.eq(tutor_id))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }
}

fn validate_hourly_rate(rate: Option<f64>) -> AppResult<()> {
    if let Some(rate) = rate {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AppError::ValidationError(
                "Hourly rate must be a non-negative number".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_student_grade(grade: Option<i32>) -> AppResult<()> {
    if let Some(grade) = grade {
        if !(1..=11).contains(&grade) {
            return Err(AppError::ValidationError(
                "Grade must be between 1 and 11".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::BTreeMap;

    fn student_fixture(tutor_id: i64) -> student_entity::Model {
        student_entity::Model {
            id: Uuid::new_v4(),
            tutor_id,
            name: "Ivan Sidorov".to_string(),
            email: Some("ivan@example.com".to_string()),
            phone: None,
            notes: None,
            hourly_rate: Some(1500.0),
            grade: Some(9),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_grade() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = StudentService::new(std::sync::Arc::new(db));

        let err = service
            .create_student(
                1,
                CreateStudentRequest {
                    name: "Ivan".to_string(),
                    email: None,
                    phone: None,
                    notes: None,
                    hourly_rate: None,
                    grade: Some(12),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_negative_hourly_rate() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = StudentService::new(std::sync::Arc::new(db));

        let err = service
            .create_student(
                1,
                CreateStudentRequest {
                    name: "Ivan".to_string(),
                    email: None,
                    phone: None,
                    notes: None,
                    hourly_rate: Some(-10.0),
                    grade: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_get_student_of_other_tutor_is_not_found() {
        // tutor 过滤在查询里，Mock 返回空集模拟归属不符
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<student_entity::Model>::new()])
            .into_connection();
        let service = StudentService::new(std::sync::Arc::new(db));

        let err = service.get_student(2, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_students_maps_models() {
        let fixture = student_fixture(1);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![fixture.clone()]])
            // 尚无课程，分组计数为空
            .append_query_results([Vec::<BTreeMap<&str, sea_orm::Value>>::new()])
            .into_connection();
        let service = StudentService::new(std::sync::Arc::new(db));

        let students = service.list_students(1).await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].id, fixture.id);
        assert_eq!(students[0].hourly_rate, Some(1500.0));
        assert_eq!(students[0].lessons_count, Some(0));
    }

    #[tokio::test]
    async fn test_list_students_empty_roster() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<student_entity::Model>::new()])
            .into_connection();
        let service = StudentService::new(std::sync::Arc::new(db));

        assert!(service.list_students(1).await.unwrap().is_empty());
    }
}
