//! Product detail page: state, reducer, derived values and controller.

use getyourshare_shared::encoded::value_to_text;
use getyourshare_shared::{
    AffiliateRequest, FaqItem, Product, ProductKind, Review, ReviewDraft, Role, RoleProfile,
    ValidationStatus,
};
use serde_json::Value;

use super::store::{ViewState, ViewStore};
use super::ViewContext;
use crate::routes::Route;

pub const PRODUCT_PLACEHOLDER: &str =
    "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?w=800&h=600&fit=crop&q=80";
pub const SERVICE_PLACEHOLDER: &str =
    "https://images.unsplash.com/photo-1454165804606-c3d57bc86b40?w=800&h=600&fit=crop&q=80";

/// Storage entry holding the path to return to after logging in.
pub const REDIRECT_AFTER_LOGIN_KEY: &str = "redirectAfterLogin";
/// Storage entry asking the product page to reopen the affiliation modal.
pub const OPEN_AFFILIATE_MODAL_KEY: &str = "openAffiliateModal";

const LOAD_FAILED: &str = "Erreur lors du chargement du produit";

/// Affiliation request form buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffiliateDraft {
    pub selected_product: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetailState {
    pub product: Option<Product>,
    pub reviews: Vec<Review>,
    pub user_profile: Option<RoleProfile>,
    pub validation_status: Option<ValidationStatus>,
    pub loading: bool,
    pub is_validating: bool,
    pub current_image_index: usize,
    pub show_review_form: bool,
    pub show_affiliate_modal: bool,
    pub review_form: ReviewDraft,
    pub affiliate_form: AffiliateDraft,
}

impl Default for ProductDetailState {
    fn default() -> Self {
        Self {
            product: None,
            reviews: Vec::new(),
            user_profile: None,
            validation_status: None,
            loading: true,
            is_validating: false,
            current_image_index: 0,
            show_review_form: false,
            show_affiliate_modal: false,
            review_form: ReviewDraft::default(),
            affiliate_form: AffiliateDraft::default(),
        }
    }
}

/// Form buffers that can be patched or reset as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Review,
    Affiliate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPatch {
    pub rating: Option<u8>,
    pub title: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffiliatePatch {
    pub selected_product: Option<String>,
    pub message: Option<String>,
}

/// Fields set in a patch overwrite; absent ones are left alone.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPatch {
    Review(ReviewPatch),
    Affiliate(AffiliatePatch),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductDetailAction {
    SetProduct(Option<Product>),
    SetReviews(Vec<Review>),
    SetUserProfile(Option<RoleProfile>),
    SetValidationStatus(Option<ValidationStatus>),
    SetLoading(bool),
    SetValidating(bool),
    SetImageIndex(usize),
    ToggleReviewForm,
    SetAffiliateModal(bool),
    MergeForm(FormPatch),
    ResetForm(FormField),
}

impl ViewState for ProductDetailState {
    type Action = ProductDetailAction;

    fn reduce(&mut self, action: ProductDetailAction) {
        use ProductDetailAction::*;
        match action {
            SetProduct(product) => self.product = product,
            SetReviews(reviews) => self.reviews = reviews,
            SetUserProfile(profile) => self.user_profile = profile,
            SetValidationStatus(status) => self.validation_status = status,
            SetLoading(loading) => self.loading = loading,
            SetValidating(validating) => self.is_validating = validating,
            SetImageIndex(index) => self.current_image_index = index,
            ToggleReviewForm => self.show_review_form = !self.show_review_form,
            SetAffiliateModal(show) => self.show_affiliate_modal = show,
            MergeForm(FormPatch::Review(patch)) => {
                if let Some(rating) = patch.rating {
                    self.review_form.rating = rating;
                }
                if let Some(title) = patch.title {
                    self.review_form.title = title;
                }
                if let Some(comment) = patch.comment {
                    self.review_form.comment = comment;
                }
            }
            MergeForm(FormPatch::Affiliate(patch)) => {
                if let Some(selected) = patch.selected_product {
                    self.affiliate_form.selected_product = selected;
                }
                if let Some(message) = patch.message {
                    self.affiliate_form.message = message;
                }
            }
            ResetForm(FormField::Review) => self.review_form = ReviewDraft::default(),
            ResetForm(FormField::Affiliate) => self.affiliate_form = AffiliateDraft::default(),
        }
    }
}

/// Which of the three page shapes to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductPage {
    Loading,
    NotFound,
    Ready,
}

// Derived values. Computed from the state on demand, never stored.
impl ProductDetailState {
    /// Main image (or a placeholder for the product type) then the gallery.
    pub fn images(&self) -> Vec<String> {
        let product = self.product.as_ref();
        let main = product
            .and_then(|p| p.image_url.clone())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| {
                match product.map(|p| p.kind) {
                    Some(ProductKind::Service) => SERVICE_PLACEHOLDER,
                    _ => PRODUCT_PLACEHOLDER,
                }
                .to_string()
            });

        let mut images = vec![main];
        if let Some(product) = product {
            images.extend(product.images.iter().cloned());
        }
        images
    }

    pub fn has_discount(&self) -> bool {
        self.product
            .as_ref()
            .and_then(|p| p.discount_percentage)
            .is_some_and(|d| d > 0.0)
    }

    pub fn highlights(&self) -> &[String] {
        self.product
            .as_ref()
            .map(|p| p.highlights.as_slice())
            .unwrap_or_default()
    }

    pub fn faq(&self) -> &[FaqItem] {
        self.product
            .as_ref()
            .map(|p| p.faq.as_slice())
            .unwrap_or_default()
    }

    pub fn page(&self) -> ProductPage {
        if self.loading {
            ProductPage::Loading
        } else if self.product.is_none() {
            ProductPage::NotFound
        } else {
            ProductPage::Ready
        }
    }
}

fn number_text(value: Option<f64>) -> String {
    value
        .and_then(|v| value_to_text(&Value::from(v)))
        .unwrap_or_else(|| "0".to_string())
}

/// Controller for one product page instance.
#[derive(Clone)]
pub struct ProductDetailController {
    product_id: String,
    store: ViewStore<ProductDetailState>,
    ctx: ViewContext,
}

impl ProductDetailController {
    pub fn new(product_id: impl Into<String>, ctx: ViewContext) -> Self {
        Self {
            product_id: product_id.into(),
            store: ViewStore::new(ProductDetailState::default()),
            ctx,
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn store(&self) -> &ViewStore<ProductDetailState> {
        &self.store
    }

    pub fn state(&self) -> ProductDetailState {
        self.store.snapshot()
    }

    pub fn dispatch(&self, action: ProductDetailAction) -> bool {
        self.store.dispatch(action)
    }

    pub fn unmount(&self) {
        self.store.unmount();
    }

    /// Fetch the product and its reviews concurrently.
    ///
    /// Each result lands in its own field as soon as it arrives; `loading`
    /// clears once both have settled. Any failure raises one notification.
    pub async fn load(&self) {
        self.dispatch(ProductDetailAction::SetLoading(true));

        let product = async {
            match self.ctx.api.marketplace_product(&self.product_id).await {
                Ok(envelope) => {
                    if envelope.success {
                        if let Some(product) = envelope.product {
                            self.dispatch(ProductDetailAction::SetProduct(Some(product)));
                        }
                    }
                    true
                }
                Err(e) => {
                    crate::log_error!("Error fetching product {}: {}", self.product_id, e);
                    false
                }
            }
        };
        let reviews = async {
            match self.ctx.api.marketplace_reviews(&self.product_id).await {
                Ok(envelope) => {
                    if envelope.success {
                        self.dispatch(ProductDetailAction::SetReviews(envelope.reviews));
                    }
                    true
                }
                Err(e) => {
                    crate::log_error!("Error fetching reviews for {}: {}", self.product_id, e);
                    false
                }
            }
        };

        let (product_ok, reviews_ok) = futures_util::join!(product, reviews);
        if !(product_ok && reviews_ok) && self.store.is_mounted() {
            self.ctx.notifier.error(LOAD_FAILED);
        }
        self.dispatch(ProductDetailAction::SetLoading(false));
    }

    /// Load the role profile of influencers and commercials. Failures are
    /// logged only.
    pub async fn fetch_user_profile(&self) {
        let Some(user) = self.ctx.auth.identity() else {
            return;
        };
        match self.ctx.api.role_profile(user.role).await {
            Ok(Some(profile)) => {
                let status = profile.validation_status();
                self.dispatch(ProductDetailAction::SetUserProfile(Some(profile)));
                if status.is_some() {
                    self.dispatch(ProductDetailAction::SetValidationStatus(status));
                }
            }
            Ok(None) => {}
            Err(e) => crate::log_error!("Error fetching user profile: {}", e),
        }
    }

    /// Ask the backend to score the influencer's statistics.
    pub async fn validate_stats(&self) {
        let is_influencer = self
            .ctx
            .auth
            .identity()
            .is_some_and(|u| u.role == Role::Influencer);
        if !is_influencer {
            return;
        }

        self.dispatch(ProductDetailAction::SetValidating(true));
        match self.ctx.api.validate_stats().await {
            Ok(response) if response.success => {
                let status = response.status;
                self.dispatch(ProductDetailAction::SetValidationStatus(Some(status.clone())));
                self.fetch_user_profile().await;

                if status.verified {
                    self.ctx.notifier.success(&format!(
                        "✅ Profil vérifié ! Score: {}% - Bonus de note: +{}⭐",
                        number_text(status.confidence_score),
                        number_text(status.bonus_rating)
                    ));
                } else {
                    self.ctx
                        .notifier
                        .info("🔍 Validation en cours. Améliorez vos statistiques pour être vérifié.");
                }
            }
            Ok(_) => crate::log_warn!("Stats validation was not accepted"),
            Err(e) => {
                crate::log_error!("Error validating stats: {}", e);
                self.ctx.notifier.error("Erreur lors de la validation IA");
            }
        }
        self.dispatch(ProductDetailAction::SetValidating(false));
    }

    fn open_affiliate_modal(&self, product_name: String) {
        self.dispatch(ProductDetailAction::SetAffiliateModal(true));
        self.dispatch(ProductDetailAction::MergeForm(FormPatch::Affiliate(
            AffiliatePatch {
                selected_product: Some(product_name),
                message: Some(String::new()),
            },
        )));
    }

    /// Open the affiliation modal, or send anonymous visitors to log in
    /// first (remembering to come back here).
    pub async fn request_affiliation(&self) {
        let Some(user) = self.ctx.auth.identity() else {
            self.ctx
                .notifier
                .info("Veuillez vous connecter pour demander une affiliation");
            self.ctx
                .storage
                .set(REDIRECT_AFTER_LOGIN_KEY, &self.ctx.navigator.current_path());
            self.ctx.storage.set(OPEN_AFFILIATE_MODAL_KEY, "true");
            self.ctx.navigator.navigate(Route::Login {
                session_expired: false,
            });
            return;
        };

        if !user.role.can_request_affiliation() {
            self.ctx.notifier.warning(
                "Vous devez être un influenceur ou commercial pour demander une affiliation",
            );
            return;
        }

        self.fetch_user_profile().await;
        let name = self.store.with(|s| {
            s.product.as_ref().map(|p| p.name.clone()).unwrap_or_default()
        });
        self.open_affiliate_modal(name);
    }

    /// Reopen the affiliation modal after a login round trip. Returns
    /// whether it was reopened.
    pub fn resume_pending_affiliation(&self) -> bool {
        if self.ctx.auth.identity().is_none() {
            return false;
        }
        let Some(name) = self
            .store
            .with(|s| s.product.as_ref().map(|p| p.name.clone()))
        else {
            return false;
        };
        if self.ctx.storage.get(OPEN_AFFILIATE_MODAL_KEY).as_deref() != Some("true") {
            return false;
        }

        self.ctx.storage.remove(OPEN_AFFILIATE_MODAL_KEY);
        self.open_affiliate_modal(name);
        true
    }

    pub async fn submit_affiliate_request(&self) -> bool {
        let message = self.store.with(|s| s.affiliate_form.message.clone());
        if message.trim().is_empty() {
            self.ctx
                .notifier
                .warning("Veuillez rédiger un message de présentation");
            return false;
        }

        match self
            .ctx
            .api
            .request_affiliate(&self.product_id, &AffiliateRequest { message })
            .await
        {
            Ok(response) if response.success => {
                self.ctx
                    .notifier
                    .success("Demande d'affiliation envoyée avec succès!");
                if let Some(link) = response.affiliate_link {
                    self.ctx.notifier.info(&format!("Votre lien: {link}"));
                }
                self.dispatch(ProductDetailAction::SetAffiliateModal(false));
                self.dispatch(ProductDetailAction::ResetForm(FormField::Affiliate));
                true
            }
            Ok(response) => {
                crate::log_warn!("Affiliation request refused: {:?}", response.message);
                false
            }
            Err(e) => {
                self.ctx
                    .notifier
                    .error(&e.user_message("Erreur lors de la demande"));
                false
            }
        }
    }

    pub async fn submit_review(&self) -> bool {
        if self.ctx.auth.identity().is_none() {
            self.ctx
                .notifier
                .warning("Vous devez être connecté pour laisser un avis");
            return false;
        }

        let draft = self.store.with(|s| s.review_form.clone());
        match self.ctx.api.submit_review(&self.product_id, &draft).await {
            Ok(response) if response.success => {
                self.ctx
                    .notifier
                    .success("Votre avis a été soumis et sera vérifié par nos modérateurs");
                self.dispatch(ProductDetailAction::ToggleReviewForm);
                self.dispatch(ProductDetailAction::ResetForm(FormField::Review));
                true
            }
            Ok(_) => false,
            Err(e) => {
                self.ctx
                    .notifier
                    .error(&e.user_message("Erreur lors de l'envoi de l'avis"));
                false
            }
        }
    }

    pub fn next_image(&self) {
        let (index, count) = self
            .store
            .with(|s| (s.current_image_index, s.images().len()));
        self.dispatch(ProductDetailAction::SetImageIndex((index + 1) % count));
    }

    pub fn previous_image(&self) {
        let (index, count) = self
            .store
            .with(|s| (s.current_image_index, s.images().len()));
        self.dispatch(ProductDetailAction::SetImageIndex((index + count - 1) % count));
    }
}
