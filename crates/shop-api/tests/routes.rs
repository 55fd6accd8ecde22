//! Router tests against a scripted `AccountService`.

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::Extension;
use axum_test::{TestResponse, TestServer};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use shop_api::{create_router, AppConfig, AppState};
use shop_core::{
    AccountService, CartMutation, CheckoutOutcome, Credentials, DomainError, LoginOutcome,
    QuantityUpdate, ServiceError, ServiceResult, Subject,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

const SECRET: &str = "route-test-secret";
const REFRESHED: &str = "refreshed-token";

/// Records every call and answers from a script
#[derive(Default)]
struct ScriptedService {
    fail: Option<DomainError>,
    unexpected: bool,
    valid: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedService {
    fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    fn failing(err: DomainError) -> Self {
        Self {
            fail: Some(err),
            ..Self::default()
        }
    }

    fn record(&self, call: String) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.unexpected {
            return Err(ServiceError::unexpected("connection reset"));
        }
        match &self.fail {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountService for ScriptedService {
    async fn login(&self, credentials: Credentials) -> ServiceResult<LoginOutcome> {
        self.record(format!(
            "login {:?} {:?}",
            credentials.email, credentials.password
        ))?;
        Ok(LoginOutcome {
            token: "login-token".into(),
            user: json!({ "id": 1, "email": credentials.email }),
        })
    }

    async fn register(&self, credentials: Credentials) -> ServiceResult<()> {
        self.record(format!("register {:?}", credentials.email))
    }

    async fn find_user(&self, email: Option<String>) -> ServiceResult<Value> {
        self.record(format!("find {:?}", email))?;
        Ok(json!({ "id": 1, "email": email }))
    }

    async fn send_code(&self, email: Option<String>, code: String) -> ServiceResult<()> {
        self.record(format!("send_code {:?} {}", email, code))
    }

    async fn verify_email(
        &self,
        email: Option<String>,
        code: Option<String>,
    ) -> ServiceResult<()> {
        self.record(format!("verify {:?} {:?}", email, code))
    }

    async fn get_cart(&self, user_id: i64) -> ServiceResult<Value> {
        self.record(format!("get_cart {}", user_id))?;
        Ok(json!({ "items": [], "total": 0 }))
    }

    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: &str,
        size: &str,
        quantity: i64,
    ) -> ServiceResult<CartMutation> {
        self.record(format!("add {} {} {} {}", user_id, product_id, size, quantity))?;
        Ok(CartMutation {
            token: REFRESHED.into(),
            user_data: json!({ "cart_count": quantity }),
        })
    }

    async fn update_item_quantity(
        &self,
        user_id: i64,
        product_id: &str,
        size: &str,
        quantity: i64,
    ) -> ServiceResult<QuantityUpdate> {
        self.record(format!(
            "update {} {} {} {}",
            user_id, product_id, size, quantity
        ))?;
        Ok(QuantityUpdate {
            token: REFRESHED.into(),
            cart: json!({ "items": [{ "quantity": quantity }] }),
            user_data: json!({ "cart_count": quantity }),
            valid: self.valid,
        })
    }

    async fn checkout_cart(
        &self,
        user_id: i64,
        order_details: Value,
    ) -> ServiceResult<CheckoutOutcome> {
        self.record(format!("checkout {} {}", user_id, order_details))?;
        Ok(CheckoutOutcome {
            token: REFRESHED.into(),
            id: json!(17),
        })
    }

    async fn remove_discount(&self, user_id: i64) -> ServiceResult<()> {
        self.record(format!("remove_discount {}", user_id))
    }

    async fn cancel_order(&self, order_id: &str, user_id: i64) -> ServiceResult<()> {
        self.record(format!("cancel {} {}", order_id, user_id))
    }

    async fn buy_it_again(&self, user_id: i64, limit: i64) -> ServiceResult<Value> {
        self.record(format!("buy_again {} {}", user_id, limit))?;
        Ok(json!([{ "id": 3, "name": "Trail Runner" }]))
    }
}

fn config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        jwt_secret: SECRET.into(),
        token_ttl_hours: 3,
        cookie_secure: false,
        send_code_limit: 500,
        send_code_window_secs: 300,
    }
}

/// Every request arrives from `peer`, as if served with connect info
fn server_from(service: Arc<ScriptedService>, config: AppConfig, peer: SocketAddr) -> TestServer {
    let state = AppState::new(config, service);
    let app = create_router(state)
        .unwrap()
        .layer(Extension(ConnectInfo(peer)));
    TestServer::new(app).unwrap()
}

fn server_with(service: Arc<ScriptedService>, config: AppConfig) -> TestServer {
    server_from(service, config, SocketAddr::from(([192, 0, 2, 10], 40000)))
}

fn server(service: Arc<ScriptedService>) -> TestServer {
    server_with(service, config())
}

fn auth_header(user_id: i64) -> (HeaderName, HeaderValue) {
    let token = config()
        .token_codec()
        .issue(&Subject::new(user_id).with_field("email", "ada@example.com"))
        .unwrap();
    (
        header::COOKIE,
        HeaderValue::from_str(&format!("auth_token={}", token)).unwrap(),
    )
}

fn set_cookie(response: &TestResponse) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

fn cookie_expiry(cookie: &str) -> DateTime<Utc> {
    let expires = cookie
        .split(';')
        .find_map(|part| part.trim().strip_prefix("Expires="))
        .expect("Expires attribute");
    DateTime::parse_from_rfc2822(expires)
        .unwrap()
        .with_timezone(&Utc)
}

fn assert_plain(response: &TestResponse, status: StatusCode, body: &str) {
    assert_eq!(response.status_code(), status);
    assert_eq!(response.text(), body);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"), "{}", content_type);
}

// =============================================================================
// Login / session
// =============================================================================

#[tokio::test]
async fn login_sets_short_cookie_by_default() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());

    let response = server
        .post("/login")
        .json(&json!({ "email": "ada@example.com", "password": "pw" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["email"], "ada@example.com");

    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("auth_token=login-token;"));
    assert!(cookie.contains("HttpOnly"));
    let delta = cookie_expiry(&cookie) - (Utc::now() + Duration::hours(3));
    assert!(delta.num_seconds().abs() <= 5, "{}", cookie);
}

#[tokio::test]
async fn login_remember_me_sets_day_long_cookie() {
    let server = server(Arc::new(ScriptedService::ok()));

    let response = server
        .post("/login")
        .json(&json!({ "email": "a@b.c", "password": "pw", "remember_me": true }))
        .await;

    let delta = cookie_expiry(&set_cookie(&response)) - (Utc::now() + Duration::hours(24));
    assert!(delta.num_seconds().abs() <= 5);
}

#[tokio::test]
async fn login_remember_me_accepts_non_boolean_flags() {
    let server = server(Arc::new(ScriptedService::ok()));

    for (flag, hours) in [(json!(1), 24), (json!("yes"), 24), (json!(0), 3), (json!(""), 3)] {
        let response = server
            .post("/login")
            .json(&json!({ "email": "a@b.c", "password": "pw", "remember_me": flag }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK, "{}", flag);
        let delta = cookie_expiry(&set_cookie(&response)) - (Utc::now() + Duration::hours(hours));
        assert!(delta.num_seconds().abs() <= 5, "{}", flag);
    }
}

#[tokio::test]
async fn login_reproduces_domain_error_verbatim() {
    let service = Arc::new(ScriptedService::failing(DomainError::unauthorized(
        "Incorrect email or password.",
    )));
    let server = server(service.clone());

    let response = server.post("/login").json(&json!({})).await;

    assert_plain(&response, StatusCode::UNAUTHORIZED, "Incorrect email or password.");
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    // Missing fields are passed through for the service to judge
    assert_eq!(service.calls(), vec!["login None None"]);
}

#[tokio::test]
async fn jwt_login_returns_subject() {
    let server = server(Arc::new(ScriptedService::ok()));
    let (name, value) = auth_header(42);

    let response = server.get("/jwt-login").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "id": 42, "email": "ada@example.com" })
    );
}

#[tokio::test]
async fn protected_routes_require_token() {
    let server = server(Arc::new(ScriptedService::ok()));

    let response = server.get("/cart").await;
    assert_plain(&response, StatusCode::UNAUTHORIZED, "Authentication token is missing.");

    let response = server
        .get("/cart")
        .add_header(header::COOKIE, HeaderValue::from_static("auth_token=garbage"))
        .await;
    assert_plain(
        &response,
        StatusCode::UNAUTHORIZED,
        "Authentication token is invalid or expired.",
    );
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let token = config().token_codec().issue(&Subject::new(9)).unwrap();

    let response = server
        .get("/cart")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(service.calls(), vec!["get_cart 9"]);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let server = server(Arc::new(ScriptedService::ok()));
    let (name, value) = auth_header(1);

    let response = server.get("/logout").add_header(name, value).await;

    assert_plain(&response, StatusCode::OK, "Logged out successfully.");
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("auth_token=;"));
    assert!(cookie_expiry(&cookie) < Utc::now());
}

// =============================================================================
// Registration / verification
// =============================================================================

#[tokio::test]
async fn register_returns_created() {
    let server = server(Arc::new(ScriptedService::ok()));
    let response = server
        .post("/register")
        .json(&json!({ "email": "a@b.c", "password": "longenough" }))
        .await;
    assert_plain(&response, StatusCode::CREATED, "Account created successfully.");
}

#[tokio::test]
async fn register_conflict_passes_through() {
    let server = server(Arc::new(ScriptedService::failing(DomainError::conflict(
        "An account with this email already exists.",
    ))));
    let response = server
        .post("/register")
        .json(&json!({ "email": "a@b.c", "password": "longenough" }))
        .await;
    assert_plain(
        &response,
        StatusCode::CONFLICT,
        "An account with this email already exists.",
    );
}

#[tokio::test]
async fn find_returns_user_json() {
    let server = server(Arc::new(ScriptedService::ok()));
    let response = server.post("/find").json(&json!({ "email": "a@b.c" })).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["email"], "a@b.c");
}

#[tokio::test]
async fn send_code_returns_generated_code() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());

    let response = server
        .post("/send-code")
        .json(&json!({ "email": "test@example.com" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let code = response.text();
    assert_eq!(code.len(), 4);
    assert!(code.chars().all(|c| ('1'..='9').contains(&c)), "{}", code);
    assert_eq!(
        service.calls(),
        vec![format!("send_code Some(\"test@example.com\") {}", code)]
    );
}

#[tokio::test]
async fn send_code_is_rate_limited() {
    let config = AppConfig {
        send_code_limit: 2,
        ..config()
    };
    let service = Arc::new(ScriptedService::ok());
    let server = server_with(service.clone(), config);
    let body = json!({ "email": "test@example.com" });

    for _ in 0..2 {
        let response = server.post("/send-code").json(&body).await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let response = server.post("/send-code").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());
    assert_eq!(service.calls().len(), 2);

    // Other routes are not limited
    let response = server.post("/find").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn send_code_budget_ignores_forwarded_for() {
    let config = AppConfig {
        send_code_limit: 2,
        ..config()
    };
    let service = Arc::new(ScriptedService::ok());
    let server = server_with(service.clone(), config);
    let body = json!({ "email": "test@example.com" });

    let mut allowed = 0;
    for i in 0..10 {
        let response = server
            .post("/send-code")
            .add_header(
                HeaderName::from_static("x-forwarded-for"),
                HeaderValue::from_str(&format!("10.0.0.{}", i)).unwrap(),
            )
            .json(&body)
            .await;
        if response.status_code() == StatusCode::CREATED {
            allowed += 1;
        } else {
            assert_plain(&response, StatusCode::TOO_MANY_REQUESTS, "Too many requests.");
        }
    }

    assert_eq!(allowed, 2);
    assert_eq!(service.calls().len(), 2);
}

#[tokio::test]
async fn verify_email_confirms() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let response = server
        .post("/verify-email")
        .json(&json!({ "email": "a@b.c", "code": "1234" }))
        .await;
    assert_plain(&response, StatusCode::OK, "Email verified.");
    assert_eq!(service.calls(), vec!["verify Some(\"a@b.c\") Some(\"1234\")"]);
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn add_to_cart_refreshes_cookie() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let (name, value) = auth_header(5);

    let response = server.post("/cart/12/M/2").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "cart_count": 2 }));
    assert_eq!(service.calls(), vec!["add 5 12 M 2"]);

    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("auth_token=refreshed-token;"));
    let delta = cookie_expiry(&cookie) - (Utc::now() + Duration::hours(3));
    assert!(delta.num_seconds().abs() <= 5);
}

#[tokio::test]
async fn non_numeric_quantity_is_rejected() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());

    for (method, path) in [
        ("POST", "/cart/12/M/abc"),
        ("PUT", "/cart/anything/XL/abc"),
        ("DELETE", "/cart/1/9/1.5"),
    ] {
        let (name, value) = auth_header(5);
        let request = match method {
            "POST" => server.post(path),
            "PUT" => server.put(path),
            _ => server.delete(path),
        };
        let response = request.add_header(name, value).await;
        assert_plain(&response, StatusCode::BAD_REQUEST, "Invalid quantity.");
    }

    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn add_to_cart_domain_error() {
    let server = server(Arc::new(ScriptedService::failing(DomainError::not_found(
        "Product not found.",
    ))));
    let (name, value) = auth_header(5);
    let response = server.post("/cart/99/M/1").add_header(name, value).await;
    assert_plain(&response, StatusCode::NOT_FOUND, "Product not found.");
}

#[tokio::test]
async fn update_quantity_valid() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let (name, value) = auth_header(5);

    let response = server.put("/cart/12/M/3").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({
            "cart": { "items": [{ "quantity": 3 }] },
            "user_data": { "cart_count": 3 }
        })
    );
    assert_eq!(service.calls(), vec!["update 5 12 M 3"]);
}

#[tokio::test]
async fn update_quantity_invalid_still_refreshes() {
    let service = Arc::new(ScriptedService {
        valid: false,
        ..ScriptedService::default()
    });
    let server = server(service.clone());
    let (name, value) = auth_header(5);

    let response = server.put("/cart/12/M/30").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["cart"]["items"][0]["quantity"], 30);
    assert_eq!(body["user_data"]["cart_count"], 30);
    assert!(set_cookie(&response).starts_with("auth_token=refreshed-token;"));
}

#[tokio::test]
async fn delete_cart_line_uses_update_handler() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let (name, value) = auth_header(5);

    let response = server.delete("/cart/12/M/0").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(service.calls(), vec!["update 5 12 M 0"]);
}

#[tokio::test]
async fn get_cart_returns_json() {
    let server = server(Arc::new(ScriptedService::ok()));
    let (name, value) = auth_header(5);
    let response = server.get("/cart").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["total"], 0);
}

// =============================================================================
// Checkout / orders
// =============================================================================

#[tokio::test]
async fn checkout_returns_order_id() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let (name, value) = auth_header(5);

    let response = server
        .post("/cart/checkout")
        .add_header(name, value)
        .json(&json!({ "name": "Ada", "address": "1 Main St" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>(), json!({ "id": 17 }));
    assert!(set_cookie(&response).starts_with("auth_token=refreshed-token;"));
    let calls = service.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("checkout 5 {"));
    assert!(calls[0].contains(r#""address":"1 Main St""#));
}

#[tokio::test]
async fn checkout_error_with_payload_is_json() {
    let payload = json!({ "message": "Out of stock.", "unavailable": [{ "product_id": 1 }] });
    let server = server(Arc::new(ScriptedService::failing(
        DomainError::conflict("Out of stock.").with_data(payload.clone()),
    )));
    let (name, value) = auth_header(5);

    let response = server
        .post("/cart/checkout")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>(), payload);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn checkout_error_without_payload_is_text() {
    let server = server(Arc::new(ScriptedService::failing(DomainError::bad_request(
        "Your cart is empty.",
    ))));
    let (name, value) = auth_header(5);

    let response = server
        .post("/cart/checkout")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    assert_plain(&response, StatusCode::BAD_REQUEST, "Your cart is empty.");
}

#[tokio::test]
async fn payload_is_ignored_outside_checkout() {
    let server = server(Arc::new(ScriptedService::failing(
        DomainError::conflict("Nope.").with_data(json!({ "detail": 1 })),
    )));
    let (name, value) = auth_header(5);
    let response = server.get("/cart").add_header(name, value).await;
    assert_plain(&response, StatusCode::CONFLICT, "Nope.");
}

#[tokio::test]
async fn remove_discount_ignores_code_name() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let (name, value) = auth_header(8);

    let response = server.delete("/discount/SPRING10").add_header(name, value).await;

    assert_plain(&response, StatusCode::OK, "Discount code was removed.");
    assert_eq!(service.calls(), vec!["remove_discount 8"]);
}

#[tokio::test]
async fn cancel_order_passes_order_and_user() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());
    let (name, value) = auth_header(8);

    let response = server.delete("/cancel-order/31").add_header(name, value).await;

    assert_plain(&response, StatusCode::OK, "Order was successfully cancelled.");
    assert_eq!(service.calls(), vec!["cancel 31 8"]);
}

#[tokio::test]
async fn buy_it_again_limit_handling() {
    let service = Arc::new(ScriptedService::ok());
    let server = server(service.clone());

    let (name, value) = auth_header(8);
    let response = server.get("/buy-it-again").add_header(name, value).await;
    assert_plain(&response, StatusCode::BAD_REQUEST, "Limit is not specified.");

    let (name, value) = auth_header(8);
    let response = server
        .get("/buy-it-again")
        .add_query_param("limit", "")
        .add_header(name, value)
        .await;
    assert_plain(&response, StatusCode::BAD_REQUEST, "Limit is not specified.");

    let (name, value) = auth_header(8);
    let response = server
        .get("/buy-it-again")
        .add_query_param("limit", "abc")
        .add_header(name, value)
        .await;
    assert_plain(&response, StatusCode::BAD_REQUEST, "'limit' is not a number.");

    assert!(service.calls().is_empty());

    let (name, value) = auth_header(8);
    let response = server
        .get("/buy-it-again")
        .add_query_param("limit", "5")
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!([{ "id": 3, "name": "Trail Runner" }])
    );
    assert_eq!(service.calls(), vec!["buy_again 8 5"]);
}

#[tokio::test]
async fn unexpected_service_failure_is_500() {
    let server = server(Arc::new(ScriptedService {
        unexpected: true,
        ..ScriptedService::default()
    }));
    let (name, value) = auth_header(8);
    let response = server.get("/cart").add_header(name, value).await;
    assert_plain(
        &response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error.",
    );
}

#[tokio::test]
async fn health_check() {
    let server = server(Arc::new(ScriptedService::ok()));
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "healthy");
}
