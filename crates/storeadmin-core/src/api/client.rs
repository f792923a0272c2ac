//! API client for the demo store REST API.
//!
//! This module provides the `ApiClient` struct: login/logout plus typed
//! wrappers for the product, category and user endpoints. Every resource
//! call goes through the `RequestPipeline`.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use super::pipeline::RequestPipeline;
use super::request::{ApiRequest, ApiResponse};
use super::transport::{ReqwestTransport, Transport};
use super::ApiError;
use crate::auth::{CredentialStore, LoginClient, LoginError, SessionObserver};
use crate::config::Config;
use crate::models::{
    Category, CategoryChanges, NewCategory, NewProduct, NewUser, Product, ProductChanges,
    ProductFilter, User, UserChanges,
};

const PROFILE_PATH: &str = "/auth/profile";
const PRODUCTS_PATH: &str = "/products";
const CATEGORIES_PATH: &str = "/categories";
const USERS_PATH: &str = "/users";

/// API client for the store.
/// Clone is cheap - the pipeline and store are shared behind Arc.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<RequestPipeline>,
    auth: Arc<LoginClient>,
    store: Arc<CredentialStore>,
}

impl ApiClient {
    /// Create a client talking HTTP to the configured base URL
    pub fn new(
        config: &Config,
        store: Arc<CredentialStore>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.base_url(), config.request_timeout())
            .context("Failed to build HTTP client")?;
        Ok(Self::with_transport(Arc::new(transport), store, observer))
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            pipeline: Arc::new(RequestPipeline::new(
                Arc::clone(&transport),
                Arc::clone(&store),
                observer,
            )),
            auth: Arc::new(LoginClient::new(transport, Arc::clone(&store))),
            store,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_available()
    }

    // ===== Session =====

    pub async fn login(&self, email: &str, password: &str) -> Result<(), LoginError> {
        self.auth.login(email, password).await
    }

    pub fn logout(&self) {
        self.auth.logout();
    }

    /// Profile of the logged-in user
    pub async fn profile(&self) -> Result<User> {
        self.get(PROFILE_PATH).await
    }

    // ===== Request helpers =====

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: ApiResponse) -> Result<ApiResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body).into())
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let path = request.path.clone();
        let response = self
            .pipeline
            .execute(request)
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send request to {}", path))?;

        let response = Self::check_response(response)?;
        response
            .json()
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        self.send(ApiRequest::delete(path)).await
    }

    // ===== Products =====

    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut request = ApiRequest::get(PRODUCTS_PATH);
        for (key, value) in filter.query_pairs() {
            request = request.query(key, value);
        }
        self.send(request).await
    }

    pub async fn product(&self, id: i64) -> Result<Product> {
        self.get(&format!("{}/{}", PRODUCTS_PATH, id)).await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        self.post(PRODUCTS_PATH, product).await
    }

    pub async fn update_product(&self, id: i64, changes: &ProductChanges) -> Result<Product> {
        self.put(&format!("{}/{}", PRODUCTS_PATH, id), changes).await
    }

    pub async fn delete_product(&self, id: i64) -> Result<bool> {
        self.delete(&format!("{}/{}", PRODUCTS_PATH, id)).await
    }

    // ===== Categories =====

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.get(CATEGORIES_PATH).await
    }

    pub async fn category(&self, id: i64) -> Result<Category> {
        self.get(&format!("{}/{}", CATEGORIES_PATH, id)).await
    }

    pub async fn create_category(&self, category: &NewCategory) -> Result<Category> {
        self.post(CATEGORIES_PATH, category).await
    }

    pub async fn update_category(&self, id: i64, changes: &CategoryChanges) -> Result<Category> {
        self.put(&format!("{}/{}", CATEGORIES_PATH, id), changes).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<bool> {
        self.delete(&format!("{}/{}", CATEGORIES_PATH, id)).await
    }

    // ===== Users =====

    pub async fn users(&self) -> Result<Vec<User>> {
        self.get(USERS_PATH).await
    }

    pub async fn user(&self, id: i64) -> Result<User> {
        self.get(&format!("{}/{}", USERS_PATH, id)).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        self.post(USERS_PATH, user).await
    }

    pub async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<User> {
        self.put(&format!("{}/{}", USERS_PATH, id), changes).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        self.delete(&format!("{}/{}", USERS_PATH, id)).await
    }
}
