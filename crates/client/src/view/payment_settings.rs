//! Payout settings page.

use getyourshare_shared::{PaymentMethodUpdate, PaymentStatus};
use serde_json::{Map, Value};

use super::refresh::{spawn_refresh, Refresher};
use super::store::{ViewState, ViewStore};
use super::ViewContext;
use crate::query_cache::{CacheInvalidator, QueryKey};

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSettingsState {
    pub status: Option<PaymentStatus>,
    pub loading: bool,
    pub saving: bool,
}

impl Default for PaymentSettingsState {
    fn default() -> Self {
        Self {
            status: None,
            loading: true,
            saving: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentSettingsAction {
    SetStatus(PaymentStatus),
    SetLoading(bool),
    SetSaving(bool),
}

impl ViewState for PaymentSettingsState {
    type Action = PaymentSettingsAction;

    fn reduce(&mut self, action: PaymentSettingsAction) {
        match action {
            PaymentSettingsAction::SetStatus(status) => self.status = Some(status),
            PaymentSettingsAction::SetLoading(loading) => self.loading = loading,
            PaymentSettingsAction::SetSaving(saving) => self.saving = saving,
        }
    }
}

#[derive(Clone)]
pub struct PaymentSettingsController {
    store: ViewStore<PaymentSettingsState>,
    ctx: ViewContext,
}

impl PaymentSettingsController {
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            store: ViewStore::new(PaymentSettingsState::default()),
            ctx,
        }
    }

    pub fn store(&self) -> &ViewStore<PaymentSettingsState> {
        &self.store
    }

    pub fn state(&self) -> PaymentSettingsState {
        self.store.snapshot()
    }

    pub fn unmount(&self) {
        self.store.unmount();
    }

    /// Fetch the current payout status, from the cache when fresh.
    /// Failures are logged only; the page then shows no configured method.
    pub async fn load(&self) {
        self.store.dispatch(PaymentSettingsAction::SetLoading(true));
        let api = &self.ctx.api;
        let result = self
            .ctx
            .cache
            .fetch(QueryKey::payment_settings(), || api.payment_status())
            .await;
        match result {
            Ok(status) => {
                self.store.dispatch(PaymentSettingsAction::SetStatus(status));
            }
            Err(e) => crate::log_error!("Error fetching payment status: {}", e),
        }
        self.store.dispatch(PaymentSettingsAction::SetLoading(false));
    }

    /// Save a payout method with its method-specific fields, then reload.
    pub async fn save(&self, method: &str, details: Map<String, Value>) -> bool {
        let update = PaymentMethodUpdate {
            method: method.to_string(),
            details,
        };

        self.store.dispatch(PaymentSettingsAction::SetSaving(true));
        let saved = match self.ctx.api.update_payment_method(&update).await {
            Ok(response) => {
                let message = response
                    .message
                    .unwrap_or_else(|| "Méthode de paiement mise à jour".to_string());
                self.ctx.notifier.success(&message);
                true
            }
            Err(e) => {
                self.ctx
                    .notifier
                    .error(&e.user_message("Erreur lors de la mise à jour"));
                false
            }
        };
        self.store.dispatch(PaymentSettingsAction::SetSaving(false));

        if saved {
            self.ctx.cache.invalidate(&QueryKey::payment_settings());
            self.load().await;
        }
        saved
    }

    /// Reload while mounted whenever payment queries go stale.
    pub fn watch_invalidations(&self) -> Refresher {
        let controller = self.clone();
        spawn_refresh(
            &self.ctx.cache,
            &self.store,
            vec![QueryKey::payment_settings()],
            move || {
                let controller = controller.clone();
                async move { controller.load().await }
            },
        )
    }
}
