use std::sync::Arc;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, PaginatorTrait, Set, Statement};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::cart::{AddCartItemRequest, CheckoutRequest},
    entity::{
        categories::ActiveModel as CategoryActive, orders::Entity as Orders,
        products::ActiveModel as ProductActive, products::Entity as Products,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    providers::ProviderRegistry,
    services::{cart_service, order_service, payment_service},
    state::AppState,
};
use uuid::Uuid;

// Integration flow: user fills the cart, checks out with the manual
// provider, confirms the payment, then cancels a second order and gets
// the stock back.
#[tokio::test]
async fn checkout_confirm_and_cancel_flow() -> anyhow::Result<()> {
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
    let user_id = create_user(&state, "user", "buyer@example.com").await?;
    let product = create_product(&state, seller_id, "Test Widget", 1_000, 10).await?;

    let buyer = AuthUser {
        user_id,
        role: "user".into(),
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

    // Adding the same product merges into one line.
    let cart = cart_service::add_item(
        &state,
        &buyer,
        AddCartItemRequest {
            product_id: product,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.cart.total_price, 3_000);

    let checkout = cart_service::checkout_summary(&state, &buyer).await?.data.unwrap();
    assert_eq!(checkout.subtotal, 3_000);
    assert_eq!(checkout.tax_amount, 300);
    assert_eq!(checkout.shipping_cost, 1_000);
    assert_eq!(checkout.total, 4_300);

    let placed = storefront_api::services::checkout_service::checkout(
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

    assert_eq!(placed.order.status, "pending");
    assert_eq!(placed.order.payment_status, "pending");
    assert_eq!(placed.order.total_amount, 4_300);
    assert_eq!(placed.items.len(), 1);

    // Stock is decremented inside the checkout transaction.
    let stocked = Products::find_by_id(product).one(&state.orm).await?.unwrap();
    assert_eq!(stocked.stock, 7);

    // The cart is emptied.
    let cart = cart_service::get_cart(&state, &buyer).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.cart.total_price, 0);

    // Manual provider with auto-approve opened a confirmable intent.
    let payment = placed.payment.expect("payment intent");
    assert_eq!(payment.status, "processing");
    let intent_id = payment.provider_payment_id.clone().expect("intent id");

    let confirmed = payment_service::confirm_payment(
        &state,
        &buyer,
        storefront_api::dto::payments::ConfirmPaymentRequest {
            payment_intent_id: intent_id,
            payment_method_id: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.status, "completed");

    let settled = order_service::get_order(&state, &buyer, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(settled.order.payment_status, "paid");
    assert_eq!(settled.order.status, "confirmed");

    // A second order, then cancel it: the stock comes back.
    cart_service::add_item(
        &state,
        &buyer,
        AddCartItemRequest {
            product_id: product,
            quantity: 5,
        },
    )
    .await?;
    let second = storefront_api::services::checkout_service::checkout(
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

    let stocked = Products::find_by_id(product).one(&state.orm).await?.unwrap();
    assert_eq!(stocked.stock, 2);

    order_service::cancel_order(&state, &buyer, second.order.id).await?;
    let stocked = Products::find_by_id(product).one(&state.orm).await?.unwrap();
    assert_eq!(stocked.stock, 7);

    // A cancelled order cannot be cancelled twice.
    let err = order_service::cancel_order(&state, &buyer, second.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Asking for more than the shelf holds is rejected at the cart.
    let scarce = create_product(&state, seller_id, "Scarce Widget", 1_000, 2).await?;
    let err = cart_service::add_item(
        &state,
        &buyer,
        AddCartItemRequest {
            product_id: scarce,
            quantity: 3,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Stock that shrinks after the cart was filled aborts the checkout
    // itself, and no order is written.
    cart_service::add_item(
        &state,
        &buyer,
        AddCartItemRequest {
            product_id: scarce,
            quantity: 2,
        },
    )
    .await?;
    let mut shrink: ProductActive = Products::find_by_id(scarce)
        .one(&state.orm)
        .await?
        .unwrap()
        .into();
    shrink.stock = Set(1);
    shrink.update(&state.orm).await?;

    let orders_before = Orders::find().count(&state.orm).await?;
    let err = storefront_api::services::checkout_service::checkout(
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
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(Orders::find().count(&state.orm).await?, orders_before);

    Ok(())
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
