use crate::{
    Cart, CartLine, Category, CategoryId, JobId, JobStatus, Order, OrderId, OrderStatus,
    PrintJob, Product, ProductId, Result, TrackingCode, User, UserId,
};
use async_trait::async_trait;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn add_category(&self, category: Category) -> Result<()>;
    async fn update_category(&self, category: Category) -> Result<()>;
    /// Fails while products are still filed under the category.
    async fn remove_category(&self, id: CategoryId) -> Result<()>;
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn add_product(&self, product: Product) -> Result<()>;
    async fn update_product(&self, product: Product) -> Result<()>;
    async fn remove_product(&self, id: ProductId) -> Result<()>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;
    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>>;
    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>>;
    async fn list_products_in_category(
        &self,
        category_id: CategoryId,
        include_inactive: bool,
    ) -> Result<Vec<Product>>;

    /// Checked decrement: fails with `InvalidOperation` when stock is
    /// insufficient, leaving the count untouched.
    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, user_id: UserId) -> Result<Cart>;
    async fn put_cart_line(&self, user_id: UserId, line: CartLine) -> Result<Cart>;
    async fn remove_cart_line(&self, user_id: UserId, product_id: ProductId) -> Result<Cart>;
    async fn clear_cart(&self, user_id: UserId) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: Order) -> Result<()>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: PrintJob) -> Result<()>;
    async fn update_job(&self, job: PrintJob) -> Result<()>;
    async fn get_job(&self, id: JobId) -> Result<Option<PrintJob>>;
    async fn get_job_by_tracking_code(&self, code: &TrackingCode) -> Result<Option<PrintJob>>;
    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<PrintJob>>;
    async fn list_jobs(&self) -> Result<Vec<PrintJob>>;
}
