use async_trait::async_trait;
use printforge_core::{
    CatalogStore, Category, CategoryId, PrintForgeError, Product, ProductId, Result,
};
use uuid::Uuid;

use crate::db::{
    category_member_key, category_member_prefix, slug_index_key, StoreDb, CATEGORIES_CF,
    PRODUCTS_CF,
};

fn category_slug_key(slug: &str) -> Vec<u8> {
    format!("cslug:{}", slug).into_bytes()
}

impl StoreDb {
    fn product_ids_from_index(&self, values: Vec<Vec<u8>>) -> Vec<ProductId> {
        values
            .into_iter()
            .filter_map(|bytes| Uuid::from_slice(&bytes).ok())
            .collect()
    }
}

#[async_trait]
impl CatalogStore for StoreDb {
    async fn add_category(&self, category: Category) -> Result<()> {
        if self.get_index(&category_slug_key(&category.slug))?.is_some() {
            return Err(PrintForgeError::InvalidOperation(format!(
                "category slug '{}' already exists",
                category.slug
            )));
        }
        self.put_with_indices(
            CATEGORIES_CF,
            category.id.as_bytes(),
            &category,
            &[(
                category_slug_key(&category.slug),
                category.id.as_bytes().to_vec(),
            )],
            &[],
        )
    }

    async fn update_category(&self, category: Category) -> Result<()> {
        let existing: Category = self
            .get_record(CATEGORIES_CF, category.id.as_bytes())?
            .ok_or_else(|| PrintForgeError::NotFound(format!("category {}", category.id)))?;

        let mut index_puts = Vec::new();
        let mut index_deletes = Vec::new();
        if existing.slug != category.slug {
            if self.get_index(&category_slug_key(&category.slug))?.is_some() {
                return Err(PrintForgeError::InvalidOperation(format!(
                    "category slug '{}' already exists",
                    category.slug
                )));
            }
            index_deletes.push(category_slug_key(&existing.slug));
            index_puts.push((
                category_slug_key(&category.slug),
                category.id.as_bytes().to_vec(),
            ));
        }
        self.put_with_indices(
            CATEGORIES_CF,
            category.id.as_bytes(),
            &category,
            &index_puts,
            &index_deletes,
        )
    }

    async fn remove_category(&self, id: CategoryId) -> Result<()> {
        let existing: Category = self
            .get_record(CATEGORIES_CF, id.as_bytes())?
            .ok_or_else(|| PrintForgeError::NotFound(format!("category {}", id)))?;
        if !self.scan_index_prefix(&category_member_prefix(&id))?.is_empty() {
            return Err(PrintForgeError::InvalidOperation(format!(
                "category '{}' still has products",
                existing.name
            )));
        }
        self.delete_with_indices(
            CATEGORIES_CF,
            id.as_bytes(),
            &[category_slug_key(&existing.slug)],
        )
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        self.get_record(CATEGORIES_CF, id.as_bytes())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self.scan_records(CATEGORIES_CF)?;
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(categories)
    }

    async fn add_product(&self, product: Product) -> Result<()> {
        if self.get_index(&slug_index_key(&product.slug))?.is_some() {
            return Err(PrintForgeError::InvalidOperation(format!(
                "product slug '{}' already exists",
                product.slug
            )));
        }
        if self.get_category(product.category_id).await?.is_none() {
            return Err(PrintForgeError::NotFound(format!(
                "category {}",
                product.category_id
            )));
        }
        self.put_with_indices(
            PRODUCTS_CF,
            product.id.as_bytes(),
            &product,
            &[
                (
                    slug_index_key(&product.slug),
                    product.id.as_bytes().to_vec(),
                ),
                (
                    category_member_key(&product.category_id, &product.id),
                    product.id.as_bytes().to_vec(),
                ),
            ],
            &[],
        )?;
        self.product_cache.insert(product.id, product);
        Ok(())
    }

    async fn update_product(&self, product: Product) -> Result<()> {
        let existing: Product = self
            .get_record(PRODUCTS_CF, product.id.as_bytes())?
            .ok_or_else(|| PrintForgeError::NotFound(format!("product {}", product.id)))?;

        let mut index_puts = Vec::new();
        let mut index_deletes = Vec::new();

        if existing.slug != product.slug {
            if self.get_index(&slug_index_key(&product.slug))?.is_some() {
                return Err(PrintForgeError::InvalidOperation(format!(
                    "product slug '{}' already exists",
                    product.slug
                )));
            }
            index_deletes.push(slug_index_key(&existing.slug));
            index_puts.push((
                slug_index_key(&product.slug),
                product.id.as_bytes().to_vec(),
            ));
        }
        if existing.category_id != product.category_id {
            if self.get_category(product.category_id).await?.is_none() {
                return Err(PrintForgeError::NotFound(format!(
                    "category {}",
                    product.category_id
                )));
            }
            index_deletes.push(category_member_key(&existing.category_id, &existing.id));
            index_puts.push((
                category_member_key(&product.category_id, &product.id),
                product.id.as_bytes().to_vec(),
            ));
        }

        self.put_with_indices(
            PRODUCTS_CF,
            product.id.as_bytes(),
            &product,
            &index_puts,
            &index_deletes,
        )?;
        self.product_cache.insert(product.id, product);
        Ok(())
    }

    async fn remove_product(&self, id: ProductId) -> Result<()> {
        let existing: Product = self
            .get_record(PRODUCTS_CF, id.as_bytes())?
            .ok_or_else(|| PrintForgeError::NotFound(format!("product {}", id)))?;

        self.delete_with_indices(
            PRODUCTS_CF,
            id.as_bytes(),
            &[
                slug_index_key(&existing.slug),
                category_member_key(&existing.category_id, &id),
            ],
        )?;
        self.product_cache.remove(&id);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        if let Some(cached) = self.product_cache.get(&id) {
            return Ok(Some(cached.clone()));
        }
        let product: Option<Product> = self.get_record(PRODUCTS_CF, id.as_bytes())?;
        if let Some(ref p) = product {
            self.product_cache.insert(id, p.clone());
        }
        Ok(product)
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        match self.get_index(&slug_index_key(slug))? {
            Some(id_bytes) => {
                let id = Uuid::from_slice(&id_bytes)
                    .map_err(|_| PrintForgeError::Storage("corrupt slug index".into()))?;
                self.get_product(id).await
            }
            None => Ok(None),
        }
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self
            .scan_records::<Product>(PRODUCTS_CF)?
            .into_iter()
            .filter(|p| include_inactive || p.active)
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn list_products_in_category(
        &self,
        category_id: CategoryId,
        include_inactive: bool,
    ) -> Result<Vec<Product>> {
        let ids =
            self.product_ids_from_index(self.scan_index_prefix(&category_member_prefix(&category_id))?);
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(product) = self.get_product(id).await? {
                if include_inactive || product.active {
                    products.push(product);
                }
            }
        }
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<()> {
        let _guard = self.stock_lock.lock();
        let mut product: Product = self
            .get_record(PRODUCTS_CF, id.as_bytes())?
            .ok_or_else(|| PrintForgeError::NotFound(format!("product {}", id)))?;

        if product.stock_quantity < quantity {
            return Err(PrintForgeError::InvalidOperation(format!(
                "insufficient stock for '{}': {} requested, {} available",
                product.name, quantity, product.stock_quantity
            )));
        }
        product.stock_quantity -= quantity;
        product.updated_at = chrono::Utc::now();
        self.put_record(PRODUCTS_CF, id.as_bytes(), &product)?;
        self.product_cache.insert(id, product);
        Ok(())
    }
}
