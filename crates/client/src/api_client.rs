//! HTTP API client with bearer credentials and centralized error handling.

use std::sync::Arc;

use getyourshare_shared::{
    ActionResponse, AffiliateRequest, AffiliateResponse, ApiError, ContactForm, ErrorClass,
    GeneratedLinkResponse, LoginRequest, LoginResponse, PaymentMethodUpdate, PaymentStatus, Product, ProductEnvelope,
    ProductFilter, ProductListResponse, ReviewDraft, ReviewsEnvelope, Role, RoleProfile, User,
    ValidateStatsResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::auth_session::AuthSession;
use crate::http::{HttpRequest, HttpTransport, Method, ReqwestTransport};
use crate::routes::{Navigator, Route};

/// HTTP client for the GetYourShare REST API.
///
/// Every request carries the session's bearer token when there is one. A 401
/// answer tears the session down and sends the user to the login view
/// (unless they are already there). All errors are returned to the caller,
/// which decides what the user sees.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    auth: Option<Arc<AuthSession>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth.as_ref().map(|a| a.token().is_some()))
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client backed by `reqwest`
    pub fn new() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
            base_url: String::new(),
            auth: None,
            navigator: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Attach the session whose token is sent and which a 401 clears
    pub fn with_session(mut self, auth: Arc<AuthSession>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Navigator used for the session-expired redirect
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Send one request and decode the JSON answer.
    ///
    /// An empty success body decodes as `null`.
    pub async fn request<TReq, TRes>(
        &self,
        method: Method,
        path: &str,
        body: Option<&TReq>,
    ) -> Result<TRes, ApiError>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = self.auth.as_ref().and_then(|a| a.token()) {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let body = match body {
            Some(body) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(serde_json::to_vec(body).map_err(|e| ApiError::Deserialize(e.to_string()))?)
            }
            None => None,
        };

        let request = HttpRequest {
            method: method.clone(),
            url: self.url(path),
            headers,
            body,
        };

        let resp = match self.transport.execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                crate::log_error!("Network error on {} {}: {}", method, path, e);
                return Err(e);
            }
        };

        if !resp.is_success() {
            let err = ApiError::Http {
                status: resp.status,
                body: resp.body,
            };
            self.report_failure(&method, path, &err);
            return Err(err);
        }

        let text = if resp.body.trim().is_empty() {
            "null"
        } else {
            resp.body.as_str()
        };
        serde_json::from_str(text).map_err(|e| {
            crate::log_error!("Cannot decode answer of {} {}: {}", method, path, e);
            ApiError::Deserialize(e.to_string())
        })
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        self.request::<(), TRes>(Method::GET, path, None).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize + ?Sized, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Make a POST request without a body
    pub async fn post_empty<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        self.request::<(), TRes>(Method::POST, path, None).await
    }

    /// Make a PUT request with JSON body
    pub async fn put_json<TReq: Serialize + ?Sized, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }


    /// Log the failure by status band; a 401 also ends the session.
    fn report_failure(&self, method: &Method, path: &str, err: &ApiError) {
        match err.class() {
            ErrorClass::Unauthorized => {
                crate::log_error!("401 Unauthorized - {} {}", method, path);
                self.handle_unauthorized();
            }
            ErrorClass::Forbidden => {
                crate::log_error!("403 Forbidden - {} {}", method, path);
            }
            ErrorClass::NotFound => {
                crate::log_warn!("404 Not found - {} {}", method, path);
            }
            ErrorClass::Server => {
                crate::log_error!(
                    "Server error {} - {} {}",
                    err.status().unwrap_or_default(),
                    method,
                    path
                );
            }
            _ => {
                crate::log_error!("API error on {} {}: {}", method, path, err.user_message(&err.to_string()));
            }
        }
    }

    fn handle_unauthorized(&self) {
        if let Some(auth) = &self.auth {
            auth.clear();
        }
        if let Some(navigator) = &self.navigator {
            if !navigator.on_login_view() {
                navigator.navigate(Route::Login {
                    session_expired: true,
                });
            }
        }
    }

    // --- Auth ---

    /// Identity behind the current token
    pub async fn me(&self) -> Result<User, ApiError> {
        self.get_json("/api/auth/me").await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.post_json("/api/auth/login", request).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.post_empty::<Value>("/api/auth/logout").await.map(|_| ())
    }

    /// Backend health payload, or `None` when the backend is unreachable
    pub async fn health(&self) -> Option<Value> {
        match self.get_json("/health").await {
            Ok(body) => Some(body),
            Err(e) => {
                crate::log_error!("API unavailable: {}", e);
                None
            }
        }
    }

    // --- Marketplace ---

    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ApiError> {
        let mut params = Vec::new();
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            params.push(format!("category={}", urlencoding::encode(category)));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(format!("search={}", urlencoding::encode(search)));
        }
        let path = if params.is_empty() {
            "/api/products".to_string()
        } else {
            format!("/api/products?{}", params.join("&"))
        };
        self.get_json::<ProductListResponse>(&path)
            .await
            .map(ProductListResponse::into_products)
    }

    pub async fn marketplace_product(&self, product_id: &str) -> Result<ProductEnvelope, ApiError> {
        self.get_json(&format!(
            "/api/marketplace/products/{}",
            urlencoding::encode(product_id)
        ))
        .await
    }

    pub async fn marketplace_reviews(&self, product_id: &str) -> Result<ReviewsEnvelope, ApiError> {
        self.get_json(&format!(
            "/api/marketplace/products/{}/reviews",
            urlencoding::encode(product_id)
        ))
        .await
    }

    pub async fn request_affiliate(
        &self,
        product_id: &str,
        request: &AffiliateRequest,
    ) -> Result<AffiliateResponse, ApiError> {
        self.post_json(
            &format!(
                "/api/marketplace/products/{}/request-affiliate",
                urlencoding::encode(product_id)
            ),
            request,
        )
        .await
    }

    pub async fn submit_review(
        &self,
        product_id: &str,
        review: &ReviewDraft,
    ) -> Result<ActionResponse, ApiError> {
        self.post_json(
            &format!(
                "/api/marketplace/products/{}/review",
                urlencoding::encode(product_id)
            ),
            review,
        )
        .await
    }

    /// Create a tracking link for one product (influencers only)
    pub async fn generate_affiliate_link(
        &self,
        product_id: &str,
    ) -> Result<GeneratedLinkResponse, ApiError> {
        self.post_json(
            "/api/affiliate-links/generate",
            &serde_json::json!({ "product_id": product_id }),
        )
        .await
    }

    // --- Profiles ---

    /// Role-specific profile; `None` for roles without one
    pub async fn role_profile(&self, role: Role) -> Result<Option<RoleProfile>, ApiError> {
        let Some(endpoint) = role.profile_endpoint() else {
            return Ok(None);
        };
        let body: Value = self.get_json(endpoint).await?;
        Ok(RoleProfile::from_response(body))
    }

    /// Ask the backend to score the influencer's audience statistics
    pub async fn validate_stats(&self) -> Result<ValidateStatsResponse, ApiError> {
        self.post_empty("/api/influencers/validate-stats").await
    }

    // --- Contact ---

    pub async fn submit_contact(&self, form: &ContactForm) -> Result<ActionResponse, ApiError> {
        self.post_json("/api/contact/submit", form).await
    }

    // --- Dashboard ---

    /// Role-dependent dashboard figures, passed through as JSON
    pub async fn dashboard_stats(&self) -> Result<Value, ApiError> {
        self.get_json("/api/dashboard/stats").await
    }

    // --- Payments ---

    pub async fn payment_status(&self) -> Result<PaymentStatus, ApiError> {
        self.get_json("/api/influencer/payment-status").await
    }

    pub async fn update_payment_method(
        &self,
        update: &PaymentMethodUpdate,
    ) -> Result<ActionResponse, ApiError> {
        self.put_json("/api/influencer/payment-method", update).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_session::SessionStatus;
    use crate::routes::History;
    use crate::storage::MemoryStore;
    use crate::testing::{user, MockTransport};
    use serde_json::json;

    fn setup() -> (Arc<MockTransport>, Arc<AuthSession>, Arc<History>, ApiClient) {
        let transport = MockTransport::new();
        let auth = Arc::new(AuthSession::new(Arc::new(MemoryStore::new())));
        let history = Arc::new(History::new(Route::Dashboard));
        let api = crate::testing::api_client(&transport, &auth, &history);
        (transport, auth, history, api)
    }

    #[tokio::test]
    async fn test_attaches_bearer_token_when_present() {
        let (transport, auth, _history, api) = setup();
        transport.respond(Method::GET, "/api/products", 200, json!([]));

        api.list_products(&ProductFilter::default()).await.unwrap();
        assert!(transport.requests()[0].header("Authorization").is_none());

        auth.establish("secret".into(), user("1", Role::Influencer));
        api.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(
            transport.requests()[1].header("Authorization"),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_and_redirects() {
        let (transport, auth, history, api) = setup();
        auth.establish("stale".into(), user("1", Role::Merchant));
        transport.respond(
            Method::GET,
            "/api/influencer/payment-status",
            401,
            json!({"detail": "Token expiré"}),
        );

        let err = api.payment_status().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.detail().as_deref(), Some("Token expiré"));
        assert_eq!(auth.status(), SessionStatus::Expired);
        assert!(auth.token().is_none());
        assert_eq!(history.current_path(), "/login?session_expired=true");
    }

    #[tokio::test]
    async fn test_unauthorized_on_login_view_does_not_redirect_again() {
        let (transport, _auth, history, api) = setup();
        history.navigate(Route::Login {
            session_expired: false,
        });
        transport.respond(Method::POST, "/api/auth/login", 401, json!({"detail": "Identifiants invalides"}));

        let request = LoginRequest {
            email: "a@b.com".into(),
            password: "bad".into(),
        };
        assert!(api.login(&request).await.is_err());
        assert_eq!(history.entries(), vec!["/dashboard", "/login"]);
    }

    #[tokio::test]
    async fn test_errors_are_returned_not_swallowed() {
        let (transport, auth, history, api) = setup();
        auth.establish("tok".into(), user("1", Role::Merchant));
        transport.respond(Method::GET, "/api/marketplace/products/9", 404, json!({"detail": "introuvable"}));
        transport.respond(Method::GET, "/api/marketplace/products/9/reviews", 503, json!({}));

        let err = api.marketplace_product("9").await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);
        let err = api.marketplace_reviews("9").await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Server);

        // Only 401 touches the session
        assert_eq!(auth.status(), SessionStatus::Active);
        assert_eq!(history.entries(), vec!["/dashboard"]);
    }

    #[tokio::test]
    async fn test_network_failure_is_propagated() {
        let (transport, _auth, _history, api) = setup();
        transport.fail(Method::GET, "/api/auth/me", ApiError::Network("connection refused".into()));

        let err = api.me().await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Network);
    }

    #[tokio::test]
    async fn test_empty_body_decodes_as_null() {
        let (transport, _auth, _history, api) = setup();
        transport.respond_raw(Method::POST, "/api/auth/logout", 204, "");
        api.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_products_encodes_filter() {
        let (transport, _auth, _history, api) = setup();
        transport.respond(
            Method::GET,
            "/api/products?category=beaut%C3%A9&search=soin%20visage",
            200,
            json!({"products": [{"id": 3, "name": "Sérum"}]}),
        );

        let products = api
            .list_products(&ProductFilter {
                category: Some("beauté".into()),
                search: Some("soin visage".into()),
            })
            .await
            .unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, "3");
    }

    #[tokio::test]
    async fn test_role_profile_for_role_without_profile() {
        let (transport, _auth, _history, api) = setup();
        assert!(api.role_profile(Role::Merchant).await.unwrap().is_none());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_health_returns_none_when_down() {
        let (transport, _auth, _history, api) = setup();
        transport.fail(Method::GET, "/health", ApiError::Network("down".into()));
        assert!(api.health().await.is_none());
    }
}
