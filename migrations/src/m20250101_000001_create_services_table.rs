use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Services::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Services::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Services::Name).string().not_null())
                    .col(ColumnDef::new(Services::Description).text().not_null())
                    .col(ColumnDef::new(Services::Category).string().not_null())
                    .col(ColumnDef::new(Services::Price).decimal().not_null())
                    .col(
                        ColumnDef::new(Services::Currency)
                            .string()
                            .not_null()
                            .default("INR"),
                    )
                    .col(
                        ColumnDef::new(Services::BillingType)
                            .string()
                            .not_null()
                            .default("one-time"),
                    )
                    .col(ColumnDef::new(Services::Features).json().null())
                    .col(ColumnDef::new(Services::Requirements).json().null())
                    .col(ColumnDef::new(Services::Deliverables).json().null())
                    .col(ColumnDef::new(Services::Duration).string().null())
                    .col(
                        ColumnDef::new(Services::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Services::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Services::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_services_category")
                    .table(Services::Table)
                    .col(Services::Category)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Services::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Services {
    Table,
    Id,
    Name,
    Description,
    Category,
    Price,
    Currency,
    BillingType,
    Features,
    Requirements,
    Deliverables,
    Duration,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
