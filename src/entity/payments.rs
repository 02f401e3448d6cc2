use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub payment_number: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
    pub payment_provider: String,
    pub status: String,
    pub provider_payment_id: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub client_secret: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
    #[sea_orm(has_many = "super::payment_refunds::Entity")]
    PaymentRefunds,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::payment_refunds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentRefunds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
