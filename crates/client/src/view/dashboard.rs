//! Dashboard figures for the signed-in role.

use getyourshare_shared::Role;
use serde_json::Value;

use super::refresh::{spawn_refresh, Refresher};
use super::store::{ViewState, ViewStore};
use super::ViewContext;
use crate::query_cache::QueryKey;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub stats: Option<Value>,
    pub loading: bool,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            stats: None,
            loading: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardAction {
    SetStats(Value),
    SetLoading(bool),
}

impl ViewState for DashboardState {
    type Action = DashboardAction;

    fn reduce(&mut self, action: DashboardAction) {
        match action {
            DashboardAction::SetStats(stats) => self.stats = Some(stats),
            DashboardAction::SetLoading(loading) => self.loading = loading,
        }
    }
}

#[derive(Clone)]
pub struct DashboardController {
    store: ViewStore<DashboardState>,
    ctx: ViewContext,
}

impl DashboardController {
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            store: ViewStore::new(DashboardState::default()),
            ctx,
        }
    }

    pub fn state(&self) -> DashboardState {
        self.store.snapshot()
    }

    pub fn unmount(&self) {
        self.store.unmount();
    }

    fn role(&self) -> Option<Role> {
        self.ctx.auth.identity().map(|u| u.role)
    }

    pub async fn load(&self) {
        self.store.dispatch(DashboardAction::SetLoading(true));
        let api = &self.ctx.api;
        let result = self
            .ctx
            .cache
            .fetch(QueryKey::dashboard_stats(self.role()), || api.dashboard_stats())
            .await;
        match result {
            Ok(stats) => {
                self.store.dispatch(DashboardAction::SetStats(stats));
            }
            Err(e) => crate::log_error!("Error fetching dashboard stats: {}", e),
        }
        self.store.dispatch(DashboardAction::SetLoading(false));
    }

    /// Reload while mounted whenever this role's figures go stale.
    pub fn watch_invalidations(&self) -> Refresher {
        let controller = self.clone();
        spawn_refresh(
            &self.ctx.cache,
            &self.store,
            vec![QueryKey::dashboard_stats(self.role())],
            move || {
                let controller = controller.clone();
                async move { controller.load().await }
            },
        )
    }
}
