use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AdminNotifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AdminNotifications::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AdminNotifications::Type).string_len(16).not_null())
                    .col(
                        ColumnDef::new(AdminNotifications::Priority)
                            .string_len(16)
                            .not_null()
                            .default("medium"),
                    )
                    .col(ColumnDef::new(AdminNotifications::Title).text().not_null())
                    .col(ColumnDef::new(AdminNotifications::Message).text().not_null())
                    .col(ColumnDef::new(AdminNotifications::Data).json().null())
                    .col(ColumnDef::new(AdminNotifications::ActionUrl).text().null())
                    .col(
                        ColumnDef::new(AdminNotifications::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AdminNotifications::UserId).big_integer().null())
                    .col(
                        ColumnDef::new(AdminNotifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AdminNotifications::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, col) in [
            ("idx_admin_notifications_type_created", AdminNotifications::Type),
            ("idx_admin_notifications_priority_created", AdminNotifications::Priority),
            ("idx_admin_notifications_is_read_created", AdminNotifications::IsRead),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(AdminNotifications::Table)
                        .col(col)
                        .col(AdminNotifications::CreatedAt)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AdminNotifications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AdminNotifications {
    Table,
    Id,
    Type,
    Priority,
    Title,
    Message,
    Data,
    ActionUrl,
    IsRead,
    UserId,
    CreatedAt,
    UpdatedAt,
}
