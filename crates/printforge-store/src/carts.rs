use async_trait::async_trait;
use chrono::Utc;
use printforge_core::{Cart, CartLine, CartStore, ProductId, Result, UserId};

use crate::db::{StoreDb, CARTS_CF};

#[async_trait]
impl CartStore for StoreDb {
    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        Ok(self
            .get_record(CARTS_CF, user_id.as_bytes())?
            .unwrap_or_else(|| Cart::empty(user_id)))
    }

    async fn put_cart_line(&self, user_id: UserId, line: CartLine) -> Result<Cart> {
        let mut cart = self.get_cart(user_id).await?;
        match cart
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            Some(existing) => *existing = line,
            None => cart.lines.push(line),
        }
        cart.updated_at = Utc::now();
        self.put_record(CARTS_CF, user_id.as_bytes(), &cart)?;
        Ok(cart)
    }

    async fn remove_cart_line(&self, user_id: UserId, product_id: ProductId) -> Result<Cart> {
        let mut cart = self.get_cart(user_id).await?;
        cart.lines.retain(|l| l.product_id != product_id);
        cart.updated_at = Utc::now();
        self.put_record(CARTS_CF, user_id.as_bytes(), &cart)?;
        Ok(cart)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        self.delete_record(CARTS_CF, user_id.as_bytes())
    }
}
