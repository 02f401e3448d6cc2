use storefront_api::{config::AppConfig, db::create_pool, services::auth_service};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin", "admin123", "admin").await?;
    let seller_id =
        ensure_user(&pool, "seller@example.com", "seller", "seller123", "seller").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user", "user123", "user").await?;

    seed_catalog(&pool, seller_id).await?;

    println!("Seed completed. Admin: {admin_id}, Seller: {seller_id}, User: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    username: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash =
        auth_service::hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, password_hash, full_name, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(username)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    // Every account gets its cart up front.
    sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(pool)
        .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    let categories = vec![
        ("Apparel", "Clothing and wearables"),
        ("Drinkware", "Mugs and bottles"),
        ("Books", "Paper and digital"),
    ];

    let mut category_ids = Vec::new();
    for (name, desc) in categories {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .fetch_optional(pool)
        .await?;
        let id = match row {
            Some((id,)) => id,
            None => {
                let existing: (Uuid,) = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
                    .bind(name)
                    .fetch_one(pool)
                    .await?;
                existing.0
            }
        };
        category_ids.push(id);
    }

    let products = vec![
        ("Async Hoodie", "Warm hoodie for late deploys", 5_500, 50, 0),
        ("Crab Mug", "Coffee tastes better with a crab", 1_200, 100, 1),
        ("Sticker Pack", "Decorate your laptop", 500, 200, 0),
        ("E-book: Ownership", "Borrowing explained once and for all", 2_500, 75, 2),
    ];

    for (title, desc, price, stock, cat) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, category_id, title, description, price, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(category_ids[cat])
        .bind(title)
        .bind(desc)
        .bind(price as i64)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
