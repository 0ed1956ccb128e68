use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Lessons {
    Table,
    SeriesId,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 规律课程改用显式 series_id 分组，替代按时间模式推断
        manager
            .alter_table(
                Table::alter()
                    .table(Lessons::Table)
                    .add_column(ColumnDef::new(Lessons::SeriesId).uuid().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lessons_series")
                    .table(Lessons::Table)
                    .col(Lessons::SeriesId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_lessons_series").table(Lessons::Table).to_owned())
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Lessons::Table)
                    .drop_column(Lessons::SeriesId)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
