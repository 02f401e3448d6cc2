use std::sync::Arc;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::orders::{CreateOrderRequest, OrderLineRequest},
    dto::payments::{ConfirmPaymentRequest, CreateIntentRequest, CreateRefundRequest},
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    providers::ProviderRegistry,
    services::{order_service, payment_service},
    state::AppState,
};
use uuid::Uuid;

// Intent ↔ refund lifecycle against the mock Stripe gateway: amount
// checks, stale-intent cancellation, partial then full refund.
#[tokio::test]
async fn intent_confirm_and_refund_flow() -> anyhow::Result<()> {
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
    let seller_id = create_user(&state, "seller", "pseller@example.com").await?;
    let user_id = create_user(&state, "user", "pbuyer@example.com").await?;
    let product = create_product(&state, seller_id, "Refundable Widget", 2_000, 10).await?;

    let buyer = AuthUser {
        user_id,
        role: "user".into(),
    };

    let order = order_service::create_order(
        &state,
        &buyer,
        CreateOrderRequest {
            items: vec![OrderLineRequest {
                product_id: product,
                quantity: 2,
            }],
            shipping_address: "2 Test Street".into(),
            billing_address: None,
            shipping_notes: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;
    // 4000 subtotal + 400 tax + 1000 shipping
    assert_eq!(order.total_amount, 5_400);

    // Wrong amount is rejected before the gateway is called.
    let err = payment_service::create_intent(
        &state,
        &buyer,
        CreateIntentRequest {
            order_id: order.id,
            amount: 1,
            currency: None,
            payment_method: "card".into(),
            payment_provider: "stripe".into(),
            customer_email: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let first = payment_service::create_intent(
        &state,
        &buyer,
        CreateIntentRequest {
            order_id: order.id,
            amount: order.total_amount,
            currency: None,
            payment_method: "card".into(),
            payment_provider: "stripe".into(),
            customer_email: Some("pbuyer@example.com".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(first.payment.client_secret.is_some());

    // Opening a second intent cancels the first.
    let second = payment_service::create_intent(
        &state,
        &buyer,
        CreateIntentRequest {
            order_id: order.id,
            amount: order.total_amount,
            currency: None,
            payment_method: "card".into(),
            payment_provider: "stripe".into(),
            customer_email: None,
        },
    )
    .await?
    .data
    .unwrap();
    let stale = payment_service::get_payment(&state, &buyer, first.payment.id)
        .await?
        .data
        .unwrap();
    assert_eq!(stale.status, "cancelled");

    let confirmed = payment_service::confirm_payment(
        &state,
        &buyer,
        ConfirmPaymentRequest {
            payment_intent_id: second.payment.provider_payment_id.clone().unwrap(),
            payment_method_id: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.status, "completed");

    let paid = order_service::get_order(&state, &buyer, order.id).await?.data.unwrap();
    assert_eq!(paid.order.payment_status, "paid");

    // Partial refund.
    let partial = payment_service::create_refund(
        &state,
        &buyer,
        CreateRefundRequest {
            payment_id: confirmed.id,
            amount: Some(2_000),
            reason: "one widget came back".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(partial.refund.amount, 2_000);
    assert_eq!(partial.payment.status, "partially_refunded");

    // Over-refunding the remainder is rejected.
    let err = payment_service::create_refund(
        &state,
        &buyer,
        CreateRefundRequest {
            payment_id: confirmed.id,
            amount: Some(4_000),
            reason: "too much".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Refund the remainder; the order flips to refunded.
    let full = payment_service::create_refund(
        &state,
        &buyer,
        CreateRefundRequest {
            payment_id: confirmed.id,
            amount: None,
            reason: "the rest came back too".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(full.refund.amount, 3_400);
    assert_eq!(full.payment.status, "refunded");

    let refunded = order_service::get_order(&state, &buyer, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(refunded.order.payment_status, "refunded");

    let refunds = payment_service::list_refunds(&state, &buyer, confirmed.id)
        .await?
        .data
        .unwrap();
    assert_eq!(refunds.items.len(), 2);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

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
        description: Set(None),
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
