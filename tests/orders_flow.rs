use std::sync::Arc;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::cart::{AddCartItemRequest, CheckoutRequest},
    dto::orders::UpdateOrderStatusRequest,
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        products::Entity as Products, users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    providers::ProviderRegistry,
    routes::params::{OrderListQuery, Pagination},
    services::{cart_service, checkout_service, order_service},
    state::AppState,
};
use uuid::Uuid;

// Integration flow: a buyer orders one seller's product, and the orders
// surface scopes by role — the selling seller sees and may move the
// order, an unrelated seller sees nothing and is refused.
#[tokio::test]
async fn seller_scoped_orders_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let seller_id = create_user(&state, "seller", "seller@example.com").await?;
    let other_seller_id = create_user(&state, "seller", "other-seller@example.com").await?;
    let buyer_id = create_user(&state, "user", "buyer@example.com").await?;
    let product = create_product(&state, seller_id, "Scoped Widget", 1_000, 10).await?;

    let buyer = AuthUser {
        user_id: buyer_id,
        role: "user".into(),
    };
    let seller = AuthUser {
        user_id: seller_id,
        role: "seller".into(),
    };
    let other_seller = AuthUser {
        user_id: other_seller_id,
        role: "seller".into(),
    };

    cart_service::add_item(
        &state,
        &buyer,
        AddCartItemRequest {
            product_id: product,
            quantity: 2,
        },
    )
    .await?;
    let placed = checkout_service::checkout(
        &state,
        &buyer,
        CheckoutRequest {
            payment_method: "bank_transfer".into(),
            payment_provider: "manual".into(),
            shipping_address: "1 Test Street".into(),
            billing_address: None,
            shipping_notes: None,
        },
    )
    .await?
    .data
    .unwrap();

    // The selling seller finds the order in their listing.
    let listed = order_service::list_orders(&state, &seller, list_query())
        .await?
        .data
        .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].id, placed.order.id);

    // A seller with no product on the order sees an empty listing.
    let listed = order_service::list_orders(&state, &other_seller, list_query())
        .await?
        .data
        .unwrap();
    assert!(listed.items.is_empty());

    // The buyer still sees only their own orders.
    let listed = order_service::list_orders(&state, &buyer, list_query())
        .await?
        .data
        .unwrap();
    assert_eq!(listed.items.len(), 1);

    // An unrelated seller may not move the order.
    let err = order_service::update_status(
        &state,
        &other_seller,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "confirmed".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // The selling seller may cancel the pending order through the
    // status endpoint, and the stock comes back.
    let cancelled = order_service::update_status(
        &state,
        &seller,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.status, "cancelled");

    let stocked = Products::find_by_id(product).one(&state.orm).await?.unwrap();
    assert_eq!(stocked.stock, 10);

    Ok(())
}

fn list_query() -> OrderListQuery {
    OrderListQuery {
        pagination: Pagination {
            page: None,
            per_page: None,
        },
        status: None,
        payment_status: None,
        sort_order: None,
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE invoice_items, invoices, payment_refunds, payments, payment_methods, \
         order_items, orders, cart_items, carts, audit_logs, products, categories, users \
         RESTART IDENTITY CASCADE",
    ))
    .await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        tax_rate_bps: 1000,
        shipping_cost: 1000,
        currency: "USD".into(),
        payment_simulation: true,
        manual_auto_approve: true,
    };
    let providers = Arc::new(ProviderRegistry::from_config(&config));

    Ok(AppState {
        pool,
        orm,
        config,
        providers,
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        username: Set(email.split('@').next().unwrap_or(email).to_string()),
        password_hash: Set("dummy".into()),
        full_name: Set("Test User".into()),
        phone_number: Set(None),
        address: Set(None),
        role: Set(role.into()),
        is_active: Set(true),
        is_verified: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_product(
    state: &AppState,
    seller_id: Uuid,
    title: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Category for {title}")),
        description: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        category_id: Set(category.id),
        title: Set(title.to_string()),
        description: Set(Some("A product for testing".into())),
        price: Set(price),
        stock: Set(stock),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
