use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActiveSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActiveSessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActiveSessions::SessionId)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ActiveSessions::UserId).big_integer().null())
                    .col(ColumnDef::new(ActiveSessions::IpAddress).text().not_null())
                    .col(ColumnDef::new(ActiveSessions::UserAgent).text().null())
                    .col(ColumnDef::new(ActiveSessions::Location).json().null())
                    .col(ColumnDef::new(ActiveSessions::PageUrl).text().null())
                    .col(
                        ColumnDef::new(ActiveSessions::LastActivity)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActiveSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Presence counts and evictions both range-scan on last_activity
        manager
            .create_index(
                Index::create()
                    .name("idx_active_sessions_last_activity")
                    .table(ActiveSessions::Table)
                    .col(ActiveSessions::LastActivity)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_active_sessions_user_id_last_activity")
                    .table(ActiveSessions::Table)
                    .col(ActiveSessions::UserId)
                    .col(ActiveSessions::LastActivity)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActiveSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ActiveSessions {
    Table,
    Id,
    SessionId,
    UserId,
    IpAddress,
    UserAgent,
    Location,
    PageUrl,
    LastActivity,
    CreatedAt,
}
