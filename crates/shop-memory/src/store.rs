//! # In-Memory Account Service
//!
//! `AccountService` backed by process memory. Users, carts, verification
//! codes, orders and per-size stock live behind a single `RwLock`; the
//! product catalog is immutable after startup.

use crate::catalog::{DiscountCode, Product, ProductCatalog};
use crate::password::{hash_password, verify_password};
use async_trait::async_trait;
use serde_json::{json, Value};
use shop_core::{
    AccountService, CartMutation, CheckoutOutcome, Credentials, DomainError, LoginOutcome,
    QuantityUpdate, ServiceError, ServiceResult, Subject, TokenCodec,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CartLine {
    product_id: i64,
    size: String,
    quantity: u32,
}

#[derive(Debug, Clone)]
struct UserRecord {
    id: i64,
    email: String,
    password_hash: String,
    verified: bool,
    cart: Vec<CartLine>,
    discount: Option<DiscountCode>,
}

impl UserRecord {
    fn cart_line_mut(&mut self, product_id: i64, size: &str) -> Option<&mut CartLine> {
        self.cart
            .iter_mut()
            .find(|l| l.product_id == product_id && l.size == size)
    }

    fn cart_count(&self) -> u32 {
        self.cart.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderStatus {
    Placed,
    Cancelled,
}

#[derive(Debug, Clone)]
struct OrderRecord {
    user_id: i64,
    lines: Vec<CartLine>,
    status: OrderStatus,
}

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<i64, UserRecord>,
    emails: HashMap<String, i64>,
    codes: HashMap<String, String>,
    /// Keyed by order id; ids increase, so iteration order is placement order
    orders: BTreeMap<i64, OrderRecord>,
    stock: HashMap<(i64, String), u32>,
    next_user_id: i64,
    next_order_id: i64,
}

impl StoreState {
    fn user(&self, user_id: i64) -> Result<&UserRecord, DomainError> {
        self.users
            .get(&user_id)
            .ok_or_else(|| DomainError::not_found("User not found."))
    }

    fn user_mut(&mut self, user_id: i64) -> Result<&mut UserRecord, DomainError> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| DomainError::not_found("User not found."))
    }

    fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.emails.get(email).and_then(|id| self.users.get(id))
    }

    fn stock_of(&self, product_id: i64, size: &str) -> u32 {
        self.stock
            .get(&(product_id, size.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Account service holding all state in memory
pub struct MemoryAccountService {
    catalog: ProductCatalog,
    tokens: TokenCodec,
    state: RwLock<StoreState>,
}

impl MemoryAccountService {
    pub fn new(catalog: ProductCatalog, tokens: TokenCodec) -> Self {
        let stock = catalog
            .products
            .iter()
            .flat_map(|p| p.sizes.iter().map(move |s| ((p.id, s.size.clone()), s.stock)))
            .collect();

        Self {
            catalog,
            tokens,
            state: RwLock::new(StoreState {
                stock,
                next_user_id: 1,
                next_order_id: 1,
                ..StoreState::default()
            }),
        }
    }

    /// Attach a catalog discount code to the user's cart.
    ///
    /// Registration attaches the catalog's welcome discount on its own; no
    /// route attaches other codes.
    pub async fn apply_discount(&self, user_id: i64, code_name: &str) -> ServiceResult<()> {
        let discount = self
            .catalog
            .discount(code_name)
            .cloned()
            .ok_or_else(|| DomainError::not_found("Discount code not found."))?;

        let mut state = self.state.write().await;
        state.user_mut(user_id)?.discount = Some(discount);
        Ok(())
    }

    fn product(&self, product_id: &str) -> Result<&Product, DomainError> {
        product_id
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|id| self.catalog.get(id))
            .ok_or_else(|| DomainError::not_found("Product not found."))
    }

    fn issue_token(&self, user: &UserRecord) -> ServiceResult<String> {
        let subject = Subject::new(user.id)
            .with_field("email", user.email.clone())
            .with_field("verified", user.verified);
        self.tokens.issue(&subject).map_err(ServiceError::unexpected)
    }

    fn cart_view(&self, user: &UserRecord) -> Value {
        let items: Vec<Value> = user
            .cart
            .iter()
            .filter_map(|line| {
                let product = self.catalog.get(line.product_id)?;
                Some(json!({
                    "product_id": product.id,
                    "name": product.name,
                    "size": line.size,
                    "quantity": line.quantity,
                    "price": product.price,
                    "subtotal": product.price * i64::from(line.quantity),
                }))
            })
            .collect();

        let subtotal = self.subtotal(&user.cart);
        let total = apply_percent(subtotal, user.discount.as_ref());

        json!({
            "items": items,
            "subtotal": subtotal,
            "discount": user.discount,
            "total": total,
        })
    }

    fn subtotal(&self, lines: &[CartLine]) -> i64 {
        lines
            .iter()
            .filter_map(|l| {
                self.catalog
                    .get(l.product_id)
                    .map(|p| p.price * i64::from(l.quantity))
            })
            .sum()
    }
}

fn apply_percent(amount: i64, discount: Option<&DiscountCode>) -> i64 {
    match discount {
        Some(d) => amount - amount * i64::from(d.percent) / 100,
        None => amount,
    }
}

fn user_data(user: &UserRecord) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "verified": user.verified,
        "cart_count": user.cart_count(),
    })
}

/// Trimmed, non-empty value or the given domain error
fn required(value: Option<String>, message: &str) -> Result<String, DomainError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::bad_request(message))
}

/// Passwords are compared untrimmed
fn password_field(value: Option<String>) -> Result<String, DomainError> {
    value
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DomainError::bad_request("Email and password are required."))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty_field(details: &Value, key: &str) -> bool {
    details
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|v| !v.trim().is_empty())
}

#[async_trait]
impl AccountService for MemoryAccountService {
    async fn login(&self, credentials: Credentials) -> ServiceResult<LoginOutcome> {
        let email = required(credentials.email, "Email and password are required.")?;
        let password = password_field(credentials.password)?;

        let state = self.state.read().await;
        let user = state
            .user_by_email(&normalize_email(&email))
            .filter(|u| verify_password(&password, &u.password_hash))
            .ok_or_else(|| DomainError::unauthorized("Incorrect email or password."))?;

        info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome {
            token: self.issue_token(user)?,
            user: user_data(user),
        })
    }

    async fn register(&self, credentials: Credentials) -> ServiceResult<()> {
        let email = required(credentials.email, "Email and password are required.")?;
        let password = password_field(credentials.password)?;

        let email = normalize_email(&email);
        if !email.contains('@') {
            return Err(DomainError::bad_request("Invalid email address.").into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::bad_request(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LEN
            ))
            .into());
        }

        let password_hash = hash_password(&password).map_err(ServiceError::unexpected)?;

        let mut state = self.state.write().await;
        if state.emails.contains_key(&email) {
            return Err(DomainError::conflict("An account with this email already exists.").into());
        }

        let id = state.next_user_id;
        state.next_user_id += 1;
        state.emails.insert(email.clone(), id);
        state.users.insert(
            id,
            UserRecord {
                id,
                email,
                password_hash,
                verified: false,
                cart: Vec::new(),
                discount: self.catalog.welcome_discount().cloned(),
            },
        );

        info!(user_id = id, "Account registered");
        Ok(())
    }

    async fn find_user(&self, email: Option<String>) -> ServiceResult<Value> {
        let email = normalize_email(&required(email, "Email is required.")?);
        let state = self.state.read().await;
        let user = state
            .user_by_email(&email)
            .ok_or_else(|| DomainError::not_found("User not found."))?;
        Ok(user_data(user))
    }

    async fn send_code(&self, email: Option<String>, code: String) -> ServiceResult<()> {
        let email = normalize_email(&required(email, "Email is required.")?);
        let mut state = self.state.write().await;
        if state.user_by_email(&email).is_none() {
            return Err(DomainError::not_found("User not found.").into());
        }

        debug!(email = %email, "Verification code issued");
        state.codes.insert(email, code);
        Ok(())
    }

    async fn verify_email(
        &self,
        email: Option<String>,
        code: Option<String>,
    ) -> ServiceResult<()> {
        let email = normalize_email(&required(email, "Email and code are required.")?);
        let code = required(code, "Email and code are required.")?;

        let mut state = self.state.write().await;
        let user_id = *state
            .emails
            .get(&email)
            .ok_or_else(|| DomainError::not_found("User not found."))?;

        match state.codes.get(&email) {
            None => {
                return Err(DomainError::bad_request("No verification code was requested.").into())
            }
            Some(expected) if *expected != code => {
                return Err(DomainError::bad_request("Incorrect verification code.").into())
            }
            Some(_) => {}
        }

        state.codes.remove(&email);
        state.user_mut(user_id)?.verified = true;
        info!(user_id, "Email verified");
        Ok(())
    }

    async fn get_cart(&self, user_id: i64) -> ServiceResult<Value> {
        let state = self.state.read().await;
        Ok(self.cart_view(state.user(user_id)?))
    }

    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: &str,
        size: &str,
        quantity: i64,
    ) -> ServiceResult<CartMutation> {
        let product = self.product(product_id)?;
        if !product.has_size(size) {
            return Err(DomainError::not_found("Size not found.").into());
        }
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| DomainError::bad_request("Quantity must be at least 1."))?;

        let mut state = self.state.write().await;
        let available = state.stock_of(product.id, size);
        let user = state.user_mut(user_id)?;

        let in_cart = user
            .cart_line_mut(product.id, size)
            .map(|l| l.quantity)
            .unwrap_or(0);
        if in_cart.saturating_add(quantity) > available {
            return Err(DomainError::bad_request("Not enough stock.").into());
        }

        match user.cart_line_mut(product.id, size) {
            Some(line) => line.quantity += quantity,
            None => user.cart.push(CartLine {
                product_id: product.id,
                size: size.to_string(),
                quantity,
            }),
        }

        Ok(CartMutation {
            token: self.issue_token(user)?,
            user_data: user_data(user),
        })
    }

    async fn update_item_quantity(
        &self,
        user_id: i64,
        product_id: &str,
        size: &str,
        quantity: i64,
    ) -> ServiceResult<QuantityUpdate> {
        let product = self.product(product_id)?;

        let mut state = self.state.write().await;
        let available = state.stock_of(product.id, size);
        let user = state.user_mut(user_id)?;

        if user.cart_line_mut(product.id, size).is_none() {
            return Err(DomainError::not_found("Item is not in your cart.").into());
        }

        // Requests above stock are clamped and reported as invalid
        let wanted = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        let valid = wanted <= available;
        let applied = wanted.min(available);

        if applied == 0 {
            user.cart
                .retain(|l| !(l.product_id == product.id && l.size == size));
        } else if let Some(line) = user.cart_line_mut(product.id, size) {
            line.quantity = applied;
        }

        Ok(QuantityUpdate {
            token: self.issue_token(user)?,
            cart: self.cart_view(user),
            user_data: user_data(user),
            valid,
        })
    }

    async fn checkout_cart(
        &self,
        user_id: i64,
        order_details: Value,
    ) -> ServiceResult<CheckoutOutcome> {
        let mut state = self.state.write().await;
        let user = state.user(user_id)?;

        if user.cart.is_empty() {
            return Err(DomainError::bad_request("Your cart is empty.").into());
        }
        if !non_empty_field(&order_details, "name") || !non_empty_field(&order_details, "address")
        {
            return Err(DomainError::bad_request("Order details are incomplete.").into());
        }

        let unavailable: Vec<Value> = user
            .cart
            .iter()
            .filter_map(|l| {
                let available = state.stock_of(l.product_id, &l.size);
                (l.quantity > available).then(|| {
                    json!({
                        "product_id": l.product_id,
                        "size": l.size,
                        "requested": l.quantity,
                        "available": available,
                    })
                })
            })
            .collect();

        if !unavailable.is_empty() {
            let message = "Some items in your cart are no longer available.";
            return Err(DomainError::conflict(message)
                .with_data(json!({ "message": message, "unavailable": unavailable }))
                .into());
        }

        let lines = user.cart.clone();
        let total = apply_percent(self.subtotal(&lines), user.discount.as_ref());

        for line in &lines {
            if let Some(stock) = state.stock.get_mut(&(line.product_id, line.size.clone())) {
                *stock -= line.quantity;
            }
        }

        let order_id = state.next_order_id;
        state.next_order_id += 1;
        state.orders.insert(
            order_id,
            OrderRecord {
                user_id,
                lines,
                status: OrderStatus::Placed,
            },
        );

        let user = state.user_mut(user_id)?;
        user.cart.clear();
        user.discount = None;

        info!(user_id, order_id, total, "Order placed");
        Ok(CheckoutOutcome {
            token: self.issue_token(user)?,
            id: json!(order_id),
        })
    }

    async fn remove_discount(&self, user_id: i64) -> ServiceResult<()> {
        let mut state = self.state.write().await;
        state.user_mut(user_id)?.discount = None;
        Ok(())
    }

    async fn cancel_order(&self, order_id: &str, user_id: i64) -> ServiceResult<()> {
        let not_found = || DomainError::not_found("Order not found.");
        let order_id = order_id.trim().parse::<i64>().map_err(|_| not_found())?;

        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .filter(|o| o.user_id == user_id)
            .ok_or_else(not_found)?;

        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::bad_request("Order has already been cancelled.").into());
        }
        order.status = OrderStatus::Cancelled;
        let lines = order.lines.clone();

        for line in lines {
            *state
                .stock
                .entry((line.product_id, line.size))
                .or_insert(0) += line.quantity;
        }

        info!(user_id, order_id, "Order cancelled");
        Ok(())
    }

    async fn buy_it_again(&self, user_id: i64, limit: i64) -> ServiceResult<Value> {
        let limit = usize::try_from(limit)
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| DomainError::bad_request("Limit must be a positive number."))?;

        let state = self.state.read().await;
        state.user(user_id)?;

        let mut seen = HashSet::new();
        let products: Vec<&Product> = state
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == user_id && o.status == OrderStatus::Placed)
            .flat_map(|o| o.lines.iter())
            .filter(|l| seen.insert(l.product_id))
            .filter_map(|l| self.catalog.get(l.product_id))
            .take(limit)
            .collect();

        serde_json::to_value(products).map_err(ServiceError::unexpected)
    }
}

impl std::fmt::Debug for MemoryAccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAccountService")
            .field("products", &self.catalog.products.len())
            .finish_non_exhaustive()
    }
}
