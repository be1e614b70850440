//! Page controllers.
//!
//! Each controller owns a [`ViewStore`] for its page and performs the page's
//! network side effects through the shared services in [`ViewContext`].

use std::sync::Arc;

use crate::api_client::ApiClient;
use crate::auth_session::AuthSession;
use crate::notifications::Notifier;
use crate::query_cache::QueryCache;
use crate::routes::Navigator;
use crate::storage::KeyValueStore;

pub mod contact;
pub mod dashboard;
pub mod marketplace;
pub mod payment_settings;
pub mod product_detail;
pub mod refresh;
pub mod store;

pub use refresh::{spawn_refresh, Refresher};
pub use store::{ViewState, ViewStore};

/// Process-wide services a page controller may use.
#[derive(Clone)]
pub struct ViewContext {
    pub api: ApiClient,
    pub auth: Arc<AuthSession>,
    pub notifier: Arc<dyn Notifier>,
    pub cache: Arc<QueryCache>,
    pub storage: Arc<dyn KeyValueStore>,
    pub navigator: Arc<dyn Navigator>,
}
