use async_trait::async_trait;
use printforge_core::{Order, OrderId, OrderStatus, OrderStore, PrintForgeError, Result, UserId};
use uuid::Uuid;

use crate::db::{user_order_key, user_order_prefix, StoreDb, ORDERS_CF};

#[async_trait]
impl OrderStore for StoreDb {
    async fn create_order(&self, order: Order) -> Result<()> {
        self.put_with_indices(
            ORDERS_CF,
            order.id.as_bytes(),
            &order,
            &[(
                user_order_key(&order.user_id, &order.id),
                order.id.as_bytes().to_vec(),
            )],
            &[],
        )
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.get_record(ORDERS_CF, id.as_bytes())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let id_values = self.scan_index_prefix(&user_order_prefix(&user_id))?;
        let mut orders = Vec::with_capacity(id_values.len());
        for bytes in id_values {
            let id = Uuid::from_slice(&bytes)
                .map_err(|_| PrintForgeError::Storage("corrupt order index".into()))?;
            if let Some(order) = self.get_order(id).await? {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        Ok(orders)
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut order = self
            .get_order(id)
            .await?
            .ok_or_else(|| PrintForgeError::NotFound(format!("order {}", id)))?;
        order.status = status;
        self.put_record(ORDERS_CF, id.as_bytes(), &order)
    }
}
