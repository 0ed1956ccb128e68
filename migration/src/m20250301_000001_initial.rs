use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    Name,
    PasswordHash,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Students {
    Table,
    Id,
    TutorId,
    Name,
    Email,
    Phone,
    Notes,
    HourlyRate,
    Grade,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Lessons {
    Table,
    Id,
    TutorId,
    StudentId,
    Subject,
    LessonType,
    Description,
    StartTime,
    EndTime,
    Price,
    IsPaid,
    Status,
    IsRecurring,
    Homework,
    Notes,
    Grade,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Students::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Students::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Students::TutorId).big_integer().not_null())
                    .col(ColumnDef::new(Students::Name).string().not_null())
                    .col(ColumnDef::new(Students::Email).string().null())
                    .col(ColumnDef::new(Students::Phone).string().null())
                    .col(ColumnDef::new(Students::Notes).text().null())
                    .col(ColumnDef::new(Students::HourlyRate).double().null())
                    .col(ColumnDef::new(Students::Grade).integer().null())
                    .col(
                        ColumnDef::new(Students::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Students::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_students_tutor")
                            .from(Students::Table, Students::TutorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Lessons::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Lessons::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Lessons::TutorId).big_integer().not_null())
                    .col(ColumnDef::new(Lessons::StudentId).uuid().not_null())
                    .col(ColumnDef::new(Lessons::Subject).string().not_null())
                    .col(ColumnDef::new(Lessons::LessonType).string().not_null())
                    .col(ColumnDef::new(Lessons::Description).text().null())
                    .col(
                        ColumnDef::new(Lessons::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Lessons::EndTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Lessons::Price).double().null())
                    .col(
                        ColumnDef::new(Lessons::IsPaid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Lessons::Status)
                            .string()
                            .not_null()
                            .default("SCHEDULED"),
                    )
                    .col(
                        ColumnDef::new(Lessons::IsRecurring)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Lessons::Homework).text().null())
                    .col(ColumnDef::new(Lessons::Notes).text().null())
                    .col(ColumnDef::new(Lessons::Grade).integer().null())
                    .col(
                        ColumnDef::new(Lessons::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Lessons::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lessons_tutor")
                            .from(Lessons::Table, Lessons::TutorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lessons_student")
                            .from(Lessons::Table, Lessons::StudentId)
                            .to(Students::Table, Students::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 扫描与冲突查询都按 (tutor, 时间) 过滤
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lessons_tutor_start")
                    .table(Lessons::Table)
                    .col(Lessons::TutorId)
                    .col(Lessons::StartTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lessons_status_end")
                    .table(Lessons::Table)
                    .col(Lessons::Status)
                    .col(Lessons::EndTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Lessons::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Students::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
