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
                    .table(OrderTimeline::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderTimeline::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderTimeline::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderTimeline::Message).text().not_null())
                    .col(ColumnDef::new(OrderTimeline::Actor).string().not_null())
                    .col(
                        ColumnDef::new(OrderTimeline::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_timeline_order")
                            .from(OrderTimeline::Table, OrderTimeline::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_timeline_order_id")
                    .table(OrderTimeline::Table)
                    .col(OrderTimeline::OrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderTimeline::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OrderTimeline {
    Table,
    Id,
    OrderId,
    Message,
    Actor,
    CreatedAt,
}
