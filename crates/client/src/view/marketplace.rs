//! Marketplace listing.
//!
//! The category and backend search select which listing is fetched (and
//! cached); the search term and sort order only shape what is shown.

use std::cmp::Ordering;
use std::time::Duration;

use getyourshare_shared::{AffiliateLink, GeneratedLinkResponse, Product, ProductFilter, Role};

use super::store::{ViewState, ViewStore};
use super::ViewContext;
use crate::notifications::{Notification, Severity};
use crate::query_cache::QueryKey;
use crate::routes::Route;

/// Category value meaning "no category filter".
pub const ALL_CATEGORIES: &str = "all";

pub const LINK_TOAST: Duration = Duration::from_secs(4);
/// Delay before leaving for the tracking links page.
pub const TRACKING_REDIRECT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Most viewed first
    #[default]
    Popular,
    Commission,
    Sales,
}

impl SortBy {
    fn score(&self, product: &Product) -> f64 {
        match self {
            SortBy::Popular => product.total_views,
            SortBy::Commission => product.commission_rate,
            SortBy::Sales => product.total_sales,
        }
        .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceState {
    pub products: Vec<Product>,
    pub filter: ProductFilter,
    pub search_term: String,
    pub sort: SortBy,
    pub last_link: Option<AffiliateLink>,
    pub loading: bool,
}

impl Default for MarketplaceState {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            filter: ProductFilter::default(),
            search_term: String::new(),
            sort: SortBy::default(),
            last_link: None,
            loading: true,
        }
    }
}

impl MarketplaceState {
    pub fn selected_category(&self) -> &str {
        self.filter.category.as_deref().unwrap_or(ALL_CATEGORIES)
    }

    /// Products matching the search term in name or description, in sort
    /// order (highest first, missing figures count as zero).
    pub fn visible(&self) -> Vec<Product> {
        let term = self.search_term.trim().to_lowercase();
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|p| {
                term.is_empty()
                    || p.name.to_lowercase().contains(&term)
                    || p.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            })
            .cloned()
            .collect();
        let sort = self.sort;
        products.sort_by(|a, b| {
            sort.score(b)
                .partial_cmp(&sort.score(a))
                .unwrap_or(Ordering::Equal)
        });
        products
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketplaceAction {
    SetProducts(Vec<Product>),
    /// `None`, empty or [`ALL_CATEGORIES`] clear the filter.
    SetCategory(Option<String>),
    SetSearch(Option<String>),
    SetSearchTerm(String),
    SetSort(SortBy),
    SetLink(AffiliateLink),
    SetLoading(bool),
}

impl ViewState for MarketplaceState {
    type Action = MarketplaceAction;

    fn reduce(&mut self, action: MarketplaceAction) {
        match action {
            MarketplaceAction::SetProducts(products) => self.products = products,
            MarketplaceAction::SetCategory(category) => {
                self.filter.category =
                    category.filter(|c| !c.is_empty() && c != ALL_CATEGORIES)
            }
            MarketplaceAction::SetSearch(search) => self.filter.search = search,
            MarketplaceAction::SetSearchTerm(term) => self.search_term = term,
            MarketplaceAction::SetSort(sort) => self.sort = sort,
            MarketplaceAction::SetLink(link) => self.last_link = Some(link),
            MarketplaceAction::SetLoading(loading) => self.loading = loading,
        }
    }
}

/// Cache key of one filtered listing. Lives under `products` so that
/// invalidating `products` refreshes every listing.
pub fn listing_key(filter: &ProductFilter) -> QueryKey {
    QueryKey::products()
        .child("list")
        .child(filter.category.clone().unwrap_or_default())
        .child(filter.search.clone().unwrap_or_default())
}

#[derive(Clone)]
pub struct MarketplaceController {
    store: ViewStore<MarketplaceState>,
    ctx: ViewContext,
}

impl MarketplaceController {
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            store: ViewStore::new(MarketplaceState::default()),
            ctx,
        }
    }

    pub fn store(&self) -> &ViewStore<MarketplaceState> {
        &self.store
    }

    pub fn state(&self) -> MarketplaceState {
        self.store.snapshot()
    }

    pub fn dispatch(&self, action: MarketplaceAction) -> bool {
        self.store.dispatch(action)
    }

    pub fn unmount(&self) {
        self.store.unmount();
    }

    /// Load the listing for the current filter, from the cache when fresh.
    pub async fn load(&self) {
        let filter = self.store.with(|s| s.filter.clone());
        self.dispatch(MarketplaceAction::SetLoading(true));

        let api = &self.ctx.api;
        let result = self
            .ctx
            .cache
            .fetch(listing_key(&filter), || api.list_products(&filter))
            .await;
        match result {
            Ok(products) => {
                self.dispatch(MarketplaceAction::SetProducts(products));
            }
            Err(e) => crate::log_error!("Error fetching products: {}", e),
        }
        self.dispatch(MarketplaceAction::SetLoading(false));
    }

    pub async fn search(&self, category: Option<String>, search: Option<String>) {
        self.dispatch(MarketplaceAction::SetCategory(category));
        self.dispatch(MarketplaceAction::SetSearch(search));
        self.load().await;
    }

    pub async fn select_category(&self, category: &str) {
        self.dispatch(MarketplaceAction::SetCategory(Some(category.to_string())));
        self.load().await;
    }

    /// Generate a tracking link for `product_id`, then move to the tracking
    /// links page. Only influencers may do this.
    pub async fn generate_link(&self, product_id: &str) -> bool {
        let is_influencer = self
            .ctx
            .auth
            .identity()
            .is_some_and(|u| u.role == Role::Influencer);
        if !is_influencer {
            self.ctx
                .notifier
                .warning("Vous devez être un influenceur pour générer des liens");
            return false;
        }

        match self.ctx.api.generate_affiliate_link(product_id).await {
            Ok(GeneratedLinkResponse { link: Some(link) }) => {
                crate::log_info!(
                    "Generated link for product {}: {}",
                    product_id,
                    link.url().unwrap_or("-")
                );
                self.dispatch(MarketplaceAction::SetLink(link));
                self.ctx.notifier.notify(
                    Notification::new(Severity::Success, "Lien généré avec succès !")
                        .with_duration(LINK_TOAST),
                );
                self.schedule_tracking_redirect();
                true
            }
            Ok(GeneratedLinkResponse { link: None }) => {
                crate::log_warn!("Link generation for {} returned no link", product_id);
                false
            }
            Err(e) => {
                crate::log_error!("Error generating link: {}", e);
                self.ctx.notifier.error(&format!(
                    "Erreur lors de la génération du lien: {}",
                    e.user_message(&e.to_string())
                ));
                false
            }
        }
    }

    fn schedule_tracking_redirect(&self) {
        let store = self.store.clone();
        let navigator = self.ctx.navigator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(TRACKING_REDIRECT).await;
            if store.is_mounted() {
                navigator.navigate(Route::TrackingLinks);
            }
        });
    }
}
