use chrono::Utc;
use printforge_core::{
    generate_tracking_code, CartLine, CartStore, CatalogStore, Category, JobStatus, JobStore,
    JobPriority, Money, Order, OrderLine, OrderStatus, OrderStore, PrintForgeError, PrintJob,
    Product, Role, User, UserStore,
};
use printforge_store::StoreDb;
use tempfile::TempDir;
use uuid::Uuid;

fn open_store() -> (StoreDb, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = StoreDb::open_at(dir.path()).unwrap();
    (store, dir)
}

fn sample_category() -> Category {
    Category {
        id: Uuid::new_v4(),
        name: "Filament".into(),
        slug: "filament".into(),
        parent_id: None,
        sort_order: 1,
    }
}

fn sample_product(category_id: Uuid, slug: &str) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        category_id,
        name: format!("Product {}", slug),
        slug: slug.into(),
        description: "A printable thing".into(),
        material: "PLA".into(),
        price: Money::from_cents(1999),
        stock_quantity: 10,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn product_crud_and_slug_lookup() {
    let (store, _dir) = open_store();
    let category = sample_category();
    store.add_category(category.clone()).await.unwrap();

    let product = sample_product(category.id, "benchy");
    store.add_product(product.clone()).await.unwrap();

    let by_slug = store.get_product_by_slug("benchy").await.unwrap().unwrap();
    assert_eq!(by_slug.id, product.id);

    // Duplicate slug rejected
    let dup = sample_product(category.id, "benchy");
    assert!(matches!(
        store.add_product(dup).await,
        Err(PrintForgeError::InvalidOperation(_))
    ));

    let listed = store
        .list_products_in_category(category.id, false)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    store.remove_product(product.id).await.unwrap();
    assert!(store.get_product_by_slug("benchy").await.unwrap().is_none());
    assert!(store
        .list_products_in_category(category.id, false)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn category_update_and_guarded_delete() {
    let (store, _dir) = open_store();
    let mut category = sample_category();
    store.add_category(category.clone()).await.unwrap();

    category.name = "Filament & Resin".into();
    category.slug = "filament-resin".into();
    store.update_category(category.clone()).await.unwrap();
    let reloaded = store.get_category(category.id).await.unwrap().unwrap();
    assert_eq!(reloaded.slug, "filament-resin");

    // Occupied categories refuse deletion
    let product = sample_product(category.id, "spool-red");
    store.add_product(product.clone()).await.unwrap();
    assert!(matches!(
        store.remove_category(category.id).await,
        Err(PrintForgeError::InvalidOperation(_))
    ));

    store.remove_product(product.id).await.unwrap();
    store.remove_category(category.id).await.unwrap();
    assert!(store.get_category(category.id).await.unwrap().is_none());
}

#[tokio::test]
async fn inactive_products_hidden_unless_requested() {
    let (store, _dir) = open_store();
    let category = sample_category();
    store.add_category(category.clone()).await.unwrap();

    let mut product = sample_product(category.id, "hidden");
    product.active = false;
    store.add_product(product).await.unwrap();

    assert!(store.list_products(false).await.unwrap().is_empty());
    assert_eq!(store.list_products(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stock_decrement_is_checked() {
    let (store, _dir) = open_store();
    let category = sample_category();
    store.add_category(category.clone()).await.unwrap();
    let product = sample_product(category.id, "spool");
    store.add_product(product.clone()).await.unwrap();

    store.decrement_stock(product.id, 4).await.unwrap();
    let reloaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock_quantity, 6);

    let err = store.decrement_stock(product.id, 7).await.unwrap_err();
    assert!(matches!(err, PrintForgeError::InvalidOperation(_)));
    // Unchanged after the failed decrement
    let reloaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock_quantity, 6);
}

#[tokio::test]
async fn user_email_is_unique_and_case_insensitive() {
    let (store, _dir) = open_store();
    let user = User {
        id: Uuid::new_v4(),
        email: "Bob@Example.com".into(),
        password_hash: "hash".into(),
        display_name: "Bob".into(),
        role: Role::Customer,
        created_at: Utc::now(),
    };
    store.create_user(user.clone()).await.unwrap();

    let found = store.get_user_by_email("bob@example.com").await.unwrap();
    assert_eq!(found.unwrap().id, user.id);

    let dup = User {
        id: Uuid::new_v4(),
        email: "bob@example.COM".into(),
        password_hash: "hash2".into(),
        display_name: "Bob 2".into(),
        role: Role::Customer,
        created_at: Utc::now(),
    };
    assert!(store.create_user(dup).await.is_err());
}

#[tokio::test]
async fn cart_lines_upsert_and_clear() {
    let (store, _dir) = open_store();
    let user_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    let cart = store
        .put_cart_line(
            user_id,
            CartLine {
                product_id,
                quantity: 1,
                unit_price: Money::from_cents(500),
            },
        )
        .await
        .unwrap();
    assert_eq!(cart.lines.len(), 1);

    // Same product replaces the line rather than appending
    let cart = store
        .put_cart_line(
            user_id,
            CartLine {
                product_id,
                quantity: 3,
                unit_price: Money::from_cents(500),
            },
        )
        .await
        .unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, 3);

    let cart = store.remove_cart_line(user_id, product_id).await.unwrap();
    assert!(cart.lines.is_empty());

    store.clear_cart(user_id).await.unwrap();
    assert!(store.get_cart(user_id).await.unwrap().lines.is_empty());
}

#[tokio::test]
async fn orders_listed_newest_first() {
    let (store, _dir) = open_store();
    let user_id = Uuid::new_v4();

    for i in 0..3u32 {
        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            lines: vec![OrderLine {
                product_id: Uuid::new_v4(),
                product_name: format!("item {}", i),
                quantity: 1,
                unit_price: Money::from_cents(100),
            }],
            subtotal: Money::from_cents(100),
            total: Money::from_cents(100),
            status: OrderStatus::Placed,
            placed_at: Utc::now() + chrono::Duration::seconds(i as i64),
        };
        store.create_order(order).await.unwrap();
    }

    let orders = store.list_orders_for_user(user_id).await.unwrap();
    assert_eq!(orders.len(), 3);
    assert!(orders.windows(2).all(|w| w[0].placed_at >= w[1].placed_at));
}

#[tokio::test]
async fn job_tracking_code_lookup() {
    let (store, _dir) = open_store();
    let code = generate_tracking_code();
    let job = PrintJob::new(Uuid::new_v4(), code.clone(), "PLA", JobPriority::Normal);
    store.insert_job(job.clone()).await.unwrap();

    let found = store.get_job_by_tracking_code(&code).await.unwrap().unwrap();
    assert_eq!(found.id, job.id);
    assert_eq!(found.status, JobStatus::Pending);

    // Reusing a tracking code is refused
    let clash = PrintJob::new(Uuid::new_v4(), code, "PETG", JobPriority::Normal);
    assert!(store.insert_job(clash).await.is_err());

    let pending = store.list_jobs_by_status(JobStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 1);
}
