use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use printforge_core::{
    generate_tracking_code, AuthContext, Cart, CartLine, CartStore, CatalogStore, JobPriority,
    Money, Order, OrderLine, OrderStatus, OrderStore, PrintForgeError, PrintJob, TrackingCode,
};
use printforge_monitor::metrics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
}

fn cart_response(cart: Cart) -> ApiResult<CartResponse> {
    let subtotal = cart
        .subtotal()
        .ok_or_else(|| ApiError::Internal("cart subtotal overflow".into()))?;
    Ok(CartResponse {
        lines: cart.lines,
        subtotal,
    })
}

pub async fn get_cart(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<CartResponse>> {
    let cart = state.store.get_cart(ctx.user_id).await?;
    Ok(Json(cart_response(cart)?))
}

pub async fn add_cart_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<AddCartItemRequest>,
) -> ApiResult<Json<CartResponse>> {
    if request.quantity == 0 {
        return Err(ApiError::Validation("quantity must be at least 1".into()));
    }
    let product = state
        .store
        .get_product(request.product_id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| ApiError::NotFound(format!("product {}", request.product_id)))?;
    if product.stock_quantity < request.quantity {
        return Err(ApiError::Validation(format!(
            "only {} of '{}' in stock",
            product.stock_quantity, product.name
        )));
    }

    let cart = state
        .store
        .put_cart_line(
            ctx.user_id,
            CartLine {
                product_id: product.id,
                quantity: request.quantity,
                unit_price: product.price,
            },
        )
        .await?;
    Ok(Json(cart_response(cart)?))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Json<CartResponse>> {
    let cart = state.store.remove_cart_line(ctx.user_id, product_id).await?;
    Ok(Json(cart_response(cart)?))
}

#[derive(Deserialize, Default)]
pub struct CheckoutRequest {
    pub priority: Option<JobPriority>,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub tracking_codes: Vec<TrackingCode>,
}

/// Turn the cart into an order: validate stock, decrement it, persist the
/// order, enqueue one print job per line, clear the cart.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let cart = state.store.get_cart(ctx.user_id).await?;
    if cart.lines.is_empty() {
        return Err(ApiError::Validation("cart is empty".into()));
    }

    // Validate everything up front so a mid-checkout failure cannot leave
    // half the stock decremented.
    let mut products = Vec::with_capacity(cart.lines.len());
    for line in &cart.lines {
        let product = state
            .store
            .get_product(line.product_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| {
                ApiError::Validation(format!(
                    "product {} is no longer available",
                    line.product_id
                ))
            })?;
        if product.stock_quantity < line.quantity {
            return Err(ApiError::Core(PrintForgeError::InvalidOperation(format!(
                "insufficient stock for '{}': {} requested, {} available",
                product.name, line.quantity, product.stock_quantity
            ))));
        }
        products.push(product);
    }

    for (line, product) in cart.lines.iter().zip(&products) {
        state.store.decrement_stock(product.id, line.quantity).await?;
    }

    let subtotal = cart
        .subtotal()
        .ok_or_else(|| ApiError::Internal("cart subtotal overflow".into()))?;
    let order = Order {
        id: Uuid::new_v4(),
        user_id: ctx.user_id,
        lines: cart
            .lines
            .iter()
            .zip(&products)
            .map(|(line, product)| OrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect(),
        subtotal,
        total: subtotal,
        status: OrderStatus::Placed,
        placed_at: Utc::now(),
    };
    state.store.create_order(order.clone()).await?;

    let priority = request.priority.unwrap_or(JobPriority::Normal);
    let mut tracking_codes = Vec::with_capacity(products.len());
    for product in &products {
        let job = PrintJob::new(
            order.id,
            generate_tracking_code(),
            product.material.clone(),
            priority,
        );
        let submitted = state.queue.submit(job).await?;
        tracking_codes.push(submitted.tracking_code);
    }

    state.store.clear_cart(ctx.user_id).await?;
    metrics::ORDERS_PLACED_TOTAL.inc();

    Ok(Json(CheckoutResponse {
        order,
        tracking_codes,
    }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.store.list_orders_for_user(ctx.user_id).await?))
}
