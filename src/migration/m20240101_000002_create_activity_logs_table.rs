use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActivityLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivityLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActivityLogs::UserId).big_integer().null())
                    .col(ColumnDef::new(ActivityLogs::Action).string_len(32).not_null())
                    .col(ColumnDef::new(ActivityLogs::ModelType).string_len(32).null())
                    .col(ColumnDef::new(ActivityLogs::ModelId).big_integer().null())
                    .col(ColumnDef::new(ActivityLogs::Description).text().null())
                    .col(ColumnDef::new(ActivityLogs::IpAddress).text().null())
                    .col(ColumnDef::new(ActivityLogs::UserAgent).text().null())
                    .col(ColumnDef::new(ActivityLogs::Metadata).json().not_null())
                    .col(
                        ColumnDef::new(ActivityLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_logs_user_action_created")
                    .table(ActivityLogs::Table)
                    .col(ActivityLogs::UserId)
                    .col(ActivityLogs::Action)
                    .col(ActivityLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_logs_model")
                    .table(ActivityLogs::Table)
                    .col(ActivityLogs::ModelType)
                    .col(ActivityLogs::ModelId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ActivityLogs {
    Table,
    Id,
    UserId,
    Action,
    ModelType,
    ModelId,
    Description,
    IpAddress,
    UserAgent,
    Metadata,
    CreatedAt,
}
