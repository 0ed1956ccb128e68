use crate::entities::student_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateStudentRequest {
    #[schema(example = "Ivan Sidorov")]
    pub name: String,
    #[schema(example = "student@example.com")]
    pub email: Option<String>,
    #[schema(example = "+79001234567")]
    pub phone: Option<String>,
    pub notes: Option<String>,
    /// 默认课时费
    #[schema(example = 1500.0)]
    pub hourly_rate: Option<f64>,
    /// 学生年级 1-11
    #[schema(example = 9)]
    pub grade: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub hourly_rate: Option<f64>,
    pub grade: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub hourly_rate: Option<f64>,
    pub grade: Option<i32>,
    /// 该学生的课程总数，仅在列表接口返回
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lessons_count: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentDetailResponse {
    #[serde(flatten)]
    pub student: StudentResponse,
    /// 该学生的全部课程，按开始时间倒序
    pub lessons: Vec<crate::models::lesson::LessonResponse>,
}

/// 嵌在课程响应里的学生摘要
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentBrief {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

impl From<student_entity::Model> for StudentResponse {
    fn from(student: student_entity::Model) -> Self {
        Self {
            id: student.id,
            name: student.name,
            email: student.email,
            phone: student.phone,
            notes: student.notes,
            hourly_rate: student.hourly_rate,
            grade: student.grade,
            lessons_count: None,
            created_at: student.created_at,
        }
    }
}

impl From<student_entity::Model> for StudentBrief {
    fn from(student: student_entity::Model) -> Self {
        Self {
            id: student.id,
            name: student.name,
            email: student.email,
        }
    }
}
