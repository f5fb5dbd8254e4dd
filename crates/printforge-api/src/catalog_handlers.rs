use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use printforge_core::{CatalogStore, Category, Money, Product};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize)]
pub struct ProductListQuery {
    pub category: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: usize,
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.store.list_categories().await?))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListQuery>,
) -> ApiResult<Json<ProductListResponse>> {
    let products = match params.category {
        Some(category_id) => {
            state
                .store
                .list_products_in_category(category_id, false)
                .await?
        }
        None => state.store.list_products(false).await?,
    };
    Ok(Json(ProductListResponse {
        total: products.len(),
        products,
    }))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Product>> {
    let product = state
        .store
        .get_product_by_slug(&slug)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| ApiError::NotFound(format!("product '{}'", slug)))?;
    Ok(Json(product))
}

// -------- Admin catalog management --------

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub material: String,
    pub price_cents: i64,
    pub stock_quantity: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub material: Option<String>,
    pub price_cents: Option<i64>,
    pub stock_quantity: Option<u32>,
    pub active: Option<bool>,
}

fn validate_slug(slug: &str) -> ApiResult<()> {
    let valid = !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "slug '{}' must be lowercase letters, digits, and hyphens",
            slug
        )))
    }
}

fn validate_material(state: &AppState, material: &str) -> ApiResult<()> {
    if state.quoter.materials().get(material).is_none() {
        return Err(ApiError::Validation(format!(
            "unknown material '{}'; available: {}",
            material,
            state.quoter.materials().names().join(", ")
        )));
    }
    Ok(())
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(request): Json<CreateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    validate_slug(&request.slug)?;
    let category = Category {
        id: Uuid::new_v4(),
        name: request.name,
        slug: request.slug,
        parent_id: request.parent_id,
        sort_order: request.sort_order,
    };
    state.store.add_category(category.clone()).await?;
    Ok(Json(category))
}

#[derive(Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    let mut category = state
        .store
        .get_category(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("category {}", id)))?;

    if let Some(slug) = request.slug {
        validate_slug(&slug)?;
        category.slug = slug;
    }
    if let Some(name) = request.name {
        category.name = name;
    }
    if let Some(parent_id) = request.parent_id {
        category.parent_id = Some(parent_id);
    }
    if let Some(sort_order) = request.sort_order {
        category.sort_order = sort_order;
    }

    state.store.update_category(category.clone()).await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.store.remove_category(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> ApiResult<Json<Product>> {
    validate_slug(&request.slug)?;
    validate_material(&state, &request.material)?;
    if request.price_cents < 0 {
        return Err(ApiError::Validation("price must not be negative".into()));
    }

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4(),
        category_id: request.category_id,
        name: request.name,
        slug: request.slug,
        description: request.description,
        material: request.material,
        price: Money::from_cents(request.price_cents),
        stock_quantity: request.stock_quantity,
        active: request.active,
        created_at: now,
        updated_at: now,
    };
    state.store.add_product(product.clone()).await?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    let mut product = state
        .store
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product {}", id)))?;

    if let Some(slug) = request.slug {
        validate_slug(&slug)?;
        product.slug = slug;
    }
    if let Some(material) = request.material {
        validate_material(&state, &material)?;
        product.material = material;
    }
    if let Some(price_cents) = request.price_cents {
        if price_cents < 0 {
            return Err(ApiError::Validation("price must not be negative".into()));
        }
        product.price = Money::from_cents(price_cents);
    }
    if let Some(category_id) = request.category_id {
        product.category_id = category_id;
    }
    if let Some(name) = request.name {
        product.name = name;
    }
    if let Some(description) = request.description {
        product.description = description;
    }
    if let Some(stock_quantity) = request.stock_quantity {
        product.stock_quantity = stock_quantity;
    }
    if let Some(active) = request.active {
        product.active = active;
    }
    product.updated_at = Utc::now();

    state.store.update_product(product.clone()).await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.store.remove_product(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
