use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub invoice_number: String,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub status: String,
    pub issue_date: DateTimeWithTimeZone,
    pub due_date: DateTimeWithTimeZone,
    pub paid_date: Option<DateTimeWithTimeZone>,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
    pub seller_name: String,
    pub seller_email: String,
    pub seller_address: Option<String>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SellerId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::invoice_items::Entity")]
    InvoiceItems,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::invoice_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
