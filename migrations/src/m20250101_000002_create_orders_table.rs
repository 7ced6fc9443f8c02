use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Orders::OrderNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::ClientId).uuid().not_null())
                    .col(ColumnDef::new(Orders::ClientName).string().not_null())
                    .col(ColumnDef::new(Orders::ClientEmail).string().not_null())
                    .col(ColumnDef::new(Orders::ServiceId).uuid().not_null())
                    .col(ColumnDef::new(Orders::ServiceName).string().not_null())
                    .col(ColumnDef::new(Orders::Amount).decimal().not_null())
                    .col(
                        ColumnDef::new(Orders::Currency)
                            .string()
                            .not_null()
                            .default("INR"),
                    )
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Orders::PaymentStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Orders::PaymentVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Orders::GatewayOrderId).string().null())
                    .col(ColumnDef::new(Orders::GatewayPaymentId).string().null())
                    .col(ColumnDef::new(Orders::AssignedTo).uuid().null())
                    .col(ColumnDef::new(Orders::CancellationReason).text().null())
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Orders::UpdatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Orders::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_client_id")
                    .table(Orders::Table)
                    .col(Orders::ClientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_gateway_order_id")
                    .table(Orders::Table)
                    .col(Orders::GatewayOrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    OrderNumber,
    ClientId,
    ClientName,
    ClientEmail,
    ServiceId,
    ServiceName,
    Amount,
    Currency,
    Status,
    PaymentStatus,
    PaymentVerified,
    GatewayOrderId,
    GatewayPaymentId,
    AssignedTo,
    CancellationReason,
    CreatedAt,
    UpdatedAt,
    Version,
}
