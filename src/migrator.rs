use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_purchase_requests_table::Migration),
            Box::new(m20240601_000002_create_request_items_table::Migration),
            Box::new(m20240601_000003_create_approvals_table::Migration),
            Box::new(m20240601_000004_create_purchase_orders_table::Migration),
            Box::new(m20240601_000005_create_receipts_table::Migration),
        ]
    }
}

mod m20240601_000001_create_purchase_requests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_purchase_requests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::Title).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseRequests::Description)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Amount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::CreatedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::ApprovedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::ProformaKey)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::PurchaseOrderId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchase_requests_status")
                        .table(PurchaseRequests::Table)
                        .col(PurchaseRequests::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum PurchaseRequests {
        Table,
        Id,
        Title,
        Description,
        Amount,
        Status,
        CreatedBy,
        ApprovedBy,
        ProformaKey,
        PurchaseOrderId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_request_items_table {
    use sea_orm_migration::prelude::*;

    use super::m20240601_000001_create_purchase_requests_table::PurchaseRequests;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_request_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RequestItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequestItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequestItems::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequestItems::Description)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequestItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(RequestItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_items_purchase_request")
                                .from(RequestItems::Table, RequestItems::PurchaseRequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RequestItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RequestItems {
        Table,
        Id,
        PurchaseRequestId,
        Description,
        Quantity,
        UnitPrice,
    }
}

mod m20240601_000003_create_approvals_table {
    use sea_orm_migration::prelude::*;

    use super::m20240601_000001_create_purchase_requests_table::PurchaseRequests;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_approvals_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Approvals::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Approvals::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Approvals::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Approvals::Approver).uuid().not_null())
                        .col(ColumnDef::new(Approvals::Level).small_integer().not_null())
                        .col(ColumnDef::new(Approvals::Approved).boolean().not_null())
                        .col(ColumnDef::new(Approvals::Comments).text().null())
                        .col(
                            ColumnDef::new(Approvals::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_approvals_purchase_request")
                                .from(Approvals::Table, Approvals::PurchaseRequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One approval per level per request; concurrent duplicates hit
            // this constraint and surface as Conflict.
            manager
                .create_index(
                    Index::create()
                        .name("uq_approvals_request_level")
                        .table(Approvals::Table)
                        .col(Approvals::PurchaseRequestId)
                        .col(Approvals::Level)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Approvals::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Approvals {
        Table,
        Id,
        PurchaseRequestId,
        Approver,
        Level,
        Approved,
        Comments,
        CreatedAt,
    }
}

mod m20240601_000004_create_purchase_orders_table {
    use sea_orm_migration::prelude::*;

    use super::m20240601_000001_create_purchase_requests_table::PurchaseRequests;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_purchase_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::PurchaseRequestId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::PoNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Vendor).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::ItemSnapshot)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::DocumentKey).string().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_purchase_request")
                                .from(PurchaseOrders::Table, PurchaseOrders::PurchaseRequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        PurchaseRequestId,
        PoNumber,
        Vendor,
        ItemSnapshot,
        TotalAmount,
        DocumentKey,
        CreatedAt,
    }
}

mod m20240601_000005_create_receipts_table {
    use sea_orm_migration::prelude::*;

    use super::m20240601_000001_create_purchase_requests_table::PurchaseRequests;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_receipts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Receipts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::UploadedBy).uuid().not_null())
                        .col(ColumnDef::new(Receipts::FileKey).string().not_null())
                        .col(ColumnDef::new(Receipts::ExtractedData).json().null())
                        .col(
                            ColumnDef::new(Receipts::Validated)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Receipts::Discrepancies).json().not_null())
                        .col(
                            ColumnDef::new(Receipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_purchase_request")
                                .from(Receipts::Table, Receipts::PurchaseRequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Receipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Receipts {
        Table,
        Id,
        PurchaseRequestId,
        UploadedBy,
        FileKey,
        ExtractedData,
        Validated,
        Discrepancies,
        CreatedAt,
    }
}
