use sea_orm_migration::prelude::*;

use crate::m20250101_000002_create_orders_table::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderDocuments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderDocuments::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderDocuments::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(OrderDocuments::FileName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderDocuments::ContentType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderDocuments::SizeBytes)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderDocuments::StorageKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderDocuments::UploadedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(OrderDocuments::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_documents_order")
                            .from(OrderDocuments::Table, OrderDocuments::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_documents_order_id")
                    .table(OrderDocuments::Table)
                    .col(OrderDocuments::OrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderDocuments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OrderDocuments {
    Table,
    Id,
    OrderId,
    FileName,
    ContentType,
    SizeBytes,
    StorageKey,
    UploadedBy,
    CreatedAt,
}
