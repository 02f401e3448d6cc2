use std::sync::Arc;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::products::InventoryAdjustRequest,
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        products::Entity as Products, users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    providers::ProviderRegistry,
    routes::params::{Pagination, ProductQuery},
    services::product_service,
    state::AppState,
};
use uuid::Uuid;

// Integration flow: inventory adjustments refuse to cross zero, and
// inactive products stay hidden from everyone but their owner and
// admins.
#[tokio::test]
async fn inventory_and_visibility_flow() -> anyhow::Result<()> {
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
    let product = create_product(&state, seller_id, "Adjustable Widget", 1_000, 5).await?;

    let seller = AuthUser {
        user_id: seller_id,
        role: "seller".into(),
    };
    let other_seller = AuthUser {
        user_id: other_seller_id,
        role: "seller".into(),
    };

    // A restock lands.
    let adjusted = product_service::adjust_inventory(
        &state,
        &seller,
        product,
        InventoryAdjustRequest { delta: 3 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(adjusted.stock, 8);

    // A correction past zero is refused and the stock is untouched.
    let err = product_service::adjust_inventory(
        &state,
        &seller,
        product,
        InventoryAdjustRequest { delta: -9 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    let stocked = Products::find_by_id(product).one(&state.orm).await?.unwrap();
    assert_eq!(stocked.stock, 8);

    // Deactivating hides the product from the public listing.
    product_service::delete_product(&state, &seller, product).await?;
    let listed = product_service::list_products(&state, None, product_query(false))
        .await?
        .data
        .unwrap();
    assert!(listed.items.is_empty());

    // The owning seller sees it again by opting in to inactive items.
    let listed = product_service::list_products(&state, Some(&seller), product_query(true))
        .await?
        .data
        .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].id, product);

    // Another seller's opt-in does not expose it.
    let listed = product_service::list_products(&state, Some(&other_seller), product_query(true))
        .await?
        .data
        .unwrap();
    assert!(listed.items.is_empty());

    // An admin's opt-in does.
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };
    let listed = product_service::list_products(&state, Some(&admin), product_query(true))
        .await?
        .data
        .unwrap();
    assert_eq!(listed.items.len(), 1);

    Ok(())
}

fn product_query(include_inactive: bool) -> ProductQuery {
    ProductQuery {
        pagination: Pagination {
            page: None,
            per_page: None,
        },
        q: None,
        category_id: None,
        min_price: None,
        max_price: None,
        sort_by: None,
        sort_order: None,
        include_inactive: Some(include_inactive),
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
