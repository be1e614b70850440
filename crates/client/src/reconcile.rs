//! Event-to-cache reconciliation.
//!
//! [`RULES`] maps each server event to the toast it raises and the cached
//! queries it makes stale. [`plan`] evaluates one event against that table
//! without side effects; [`install`] registers one channel handler per row
//! that applies the plan.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use getyourshare_shared::{payload_text, EventType, Role};
use serde_json::Value;

use crate::auth_session::AuthSession;
use crate::notifications::{Notification, Notifier, Severity};
use crate::query_cache::{CacheInvalidator, QueryKey};
use crate::ws::{RealtimeChannel, Subscription};

/// Identity facts the templates and keys depend on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    pub user_id: Option<String>,
    pub role: Option<Role>,
}

impl EventContext {
    pub fn from_session(auth: &AuthSession) -> Self {
        let identity = auth.identity();
        Self {
            user_id: identity.as_ref().map(|u| u.id.clone()),
            role: identity.map(|u| u.role),
        }
    }
}

/// What one event should do.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub notification: Option<(Severity, String, Option<Duration>)>,
    /// Each key at most once.
    pub invalidate: BTreeSet<QueryKey>,
}

type Notify = fn(&Value) -> Option<(Severity, String, Option<Duration>)>;
type Keys = fn(&Value, &EventContext) -> Vec<QueryKey>;

pub struct Rule {
    pub event: EventType,
    notify: Notify,
    keys: Keys,
}

fn field(data: &Value, name: &str) -> String {
    payload_text(data, name).unwrap_or_default()
}

pub fn payment_status_label(status: &str) -> &str {
    match status {
        "pending" => "en attente",
        "processing" => "en cours de traitement",
        "completed" => "complété",
        "failed" => "échoué",
        other => other,
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        event: EventType::CommissionCreated,
        notify: |data| {
            Some((
                Severity::Success,
                format!("Nouvelle commission de {}€ !", field(data, "amount")),
                Some(Duration::from_secs(10)),
            ))
        },
        keys: |_, ctx| vec![QueryKey::commissions(), QueryKey::dashboard_stats(ctx.role)],
    },
    Rule {
        event: EventType::CommissionUpdated,
        notify: |data| {
            Some((
                Severity::Info,
                format!("Commission {} mise à jour", field(data, "commission_id")),
                None,
            ))
        },
        keys: |data, _| {
            let mut keys = vec![QueryKey::commissions()];
            if let Some(id) = payload_text(data, "commission_id") {
                keys.push(QueryKey::commission(&id));
            }
            keys
        },
    },
    Rule {
        event: EventType::PaymentCreated,
        notify: |data| {
            Some((
                Severity::Success,
                format!("Nouveau paiement de {}€ créé !", field(data, "amount")),
                None,
            ))
        },
        keys: |_, ctx| {
            vec![
                QueryKey::payments(),
                QueryKey::affiliate_balance(ctx.user_id.as_deref()),
            ]
        },
    },
    Rule {
        event: EventType::PaymentStatusChanged,
        notify: |data| {
            let status = field(data, "status");
            let severity = match status.as_str() {
                "completed" => Severity::Success,
                "failed" => Severity::Warning,
                _ => Severity::Info,
            };
            Some((
                severity,
                format!(
                    "Paiement {} {}",
                    field(data, "payment_id"),
                    payment_status_label(&status)
                ),
                None,
            ))
        },
        keys: |data, _| {
            let mut keys = vec![QueryKey::payments()];
            if let Some(id) = payload_text(data, "payment_id") {
                keys.push(QueryKey::payment(&id));
            }
            keys
        },
    },
    Rule {
        event: EventType::SaleCreated,
        notify: |data| {
            Some((
                Severity::Info,
                format!("Nouvelle vente enregistrée : {}€", field(data, "amount")),
                None,
            ))
        },
        keys: |_, ctx| vec![QueryKey::sales(), QueryKey::dashboard_stats(ctx.role)],
    },
    Rule {
        event: EventType::DashboardUpdate,
        notify: |_| None,
        keys: |_, ctx| vec![QueryKey::dashboard(), QueryKey::dashboard_stats(ctx.role)],
    },
];

pub fn rule_for(event: EventType) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.event == event)
}

/// Evaluate `event` with payload `data`. Unknown events do nothing.
pub fn plan(event: EventType, data: &Value, ctx: &EventContext) -> Reaction {
    match rule_for(event) {
        Some(rule) => Reaction {
            notification: (rule.notify)(data),
            invalidate: (rule.keys)(data, ctx).into_iter().collect(),
        },
        None => Reaction {
            notification: None,
            invalidate: BTreeSet::new(),
        },
    }
}

/// Carry out a reaction.
pub fn apply(reaction: Reaction, notifier: &dyn Notifier, cache: &dyn CacheInvalidator) {
    if let Some((severity, message, duration)) = reaction.notification {
        let mut notification = Notification::new(severity, message);
        if let Some(duration) = duration {
            notification = notification.with_duration(duration);
        }
        notifier.notify(notification);
    }
    for key in &reaction.invalidate {
        cache.invalidate(key);
    }
}

/// Register one handler per rule. Handlers stay live as long as the
/// returned subscriptions.
pub fn install(
    channel: &RealtimeChannel,
    auth: Arc<AuthSession>,
    notifier: Arc<dyn Notifier>,
    cache: Arc<dyn CacheInvalidator>,
) -> Vec<Subscription> {
    RULES
        .iter()
        .map(|rule| {
            let event = rule.event;
            let auth = auth.clone();
            let notifier = notifier.clone();
            let cache = cache.clone();
            channel.on(event, move |data| {
                let ctx = EventContext::from_session(&auth);
                crate::log_debug!("Reconciling {}", event);
                apply(plan(event, data, &ctx), notifier.as_ref(), cache.as_ref());
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationCenter;
    use crate::query_cache::QueryCache;
    use crate::storage::MemoryStore;
    use crate::testing::user;
    use crate::ws::{ChannelCallbacks, WsConnection};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingCache {
        counts: Mutex<HashMap<QueryKey, usize>>,
    }

    impl CountingCache {
        fn count(&self, key: &QueryKey) -> usize {
            self.counts.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    impl CacheInvalidator for CountingCache {
        fn invalidate(&self, key: &QueryKey) -> usize {
            *self.counts.lock().unwrap().entry(key.clone()).or_default() += 1;
            1
        }
    }

    fn influencer_ctx() -> EventContext {
        EventContext {
            user_id: Some("u1".into()),
            role: Some(Role::Influencer),
        }
    }

    #[test]
    fn test_every_known_event_has_one_rule() {
        for event in EventType::ALL {
            assert_eq!(RULES.iter().filter(|r| r.event == event).count(), 1, "{event}");
        }
        assert!(rule_for(EventType::Unknown).is_none());
    }

    #[test]
    fn test_commission_created_plan() {
        let reaction = plan(
            EventType::CommissionCreated,
            &json!({"amount": 50}),
            &influencer_ctx(),
        );
        assert_eq!(
            reaction.notification,
            Some((
                Severity::Success,
                "Nouvelle commission de 50€ !".to_string(),
                Some(Duration::from_secs(10))
            ))
        );
        assert_eq!(
            reaction.invalidate.into_iter().collect::<Vec<_>>(),
            vec![
                QueryKey::commissions(),
                QueryKey::dashboard_stats(Some(Role::Influencer))
            ]
        );
    }

    #[test]
    fn test_payment_status_severity_and_label() {
        let ctx = EventContext::default();
        let cases = [
            ("completed", Severity::Success, "Paiement 8 complété"),
            ("failed", Severity::Warning, "Paiement 8 échoué"),
            ("processing", Severity::Info, "Paiement 8 en cours de traitement"),
            ("on_hold", Severity::Info, "Paiement 8 on_hold"),
        ];
        for (status, severity, message) in cases {
            let reaction = plan(
                EventType::PaymentStatusChanged,
                &json!({"payment_id": 8, "status": status}),
                &ctx,
            );
            let (got_severity, got_message, _) = reaction.notification.unwrap();
            assert_eq!(got_severity, severity);
            assert_eq!(got_message, message);
            assert!(reaction.invalidate.contains(&QueryKey::payment("8")));
        }
    }

    #[test]
    fn test_payment_created_targets_own_balance() {
        let reaction = plan(
            EventType::PaymentCreated,
            &json!({"amount": "120.5"}),
            &influencer_ctx(),
        );
        assert!(reaction
            .invalidate
            .contains(&QueryKey::affiliate_balance(Some("u1"))));
        assert_eq!(
            reaction.notification.unwrap().1,
            "Nouveau paiement de 120.5€ créé !"
        );
    }

    #[test]
    fn test_dashboard_update_is_silent() {
        let reaction = plan(EventType::DashboardUpdate, &json!({}), &influencer_ctx());
        assert!(reaction.notification.is_none());
        assert_eq!(reaction.invalidate.len(), 2);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let data = json!({"commission_id": "c-1"});
        let a = plan(EventType::CommissionUpdated, &data, &influencer_ctx());
        let b = plan(EventType::CommissionUpdated, &data, &influencer_ctx());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_installed_handlers_notify_and_invalidate_once() {
        let connection = WsConnection::to_url("ws://test.local/ws", Default::default());
        let channel = RealtimeChannel::new(connection.handle(), ChannelCallbacks::default());
        let auth = Arc::new(AuthSession::new(Arc::new(MemoryStore::new())));
        auth.establish("tok".into(), user("u1", Role::Merchant));
        let center = Arc::new(NotificationCenter::new());
        let cache = Arc::new(CountingCache::default());

        let subs = install(&channel, auth, center.clone(), cache.clone());
        assert_eq!(subs.len(), RULES.len());

        channel.handle_message(r#"{"type":"commission_created","data":{"amount":50}}"#);

        let history = center.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].severity, Severity::Success);
        assert!(history[0].message.contains("50"));
        assert_eq!(cache.count(&QueryKey::commissions()), 1);
        assert_eq!(
            cache.count(&QueryKey::dashboard_stats(Some(Role::Merchant))),
            1
        );

        // Torn down: nothing reacts any more
        drop(subs);
        channel.handle_message(r#"{"type":"commission_created","data":{"amount":50}}"#);
        assert_eq!(center.history().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_event_leaves_same_cache_state() {
        let connection = WsConnection::to_url("ws://test.local/ws", Default::default());
        let channel = RealtimeChannel::new(connection.handle(), ChannelCallbacks::default());
        let auth = Arc::new(AuthSession::new(Arc::new(MemoryStore::new())));
        let center = Arc::new(NotificationCenter::new());
        let cache = Arc::new(QueryCache::new());
        cache.set(QueryKey::sales(), &vec![1]);
        cache.set(QueryKey::commissions(), &vec![2]);

        let _subs = install(&channel, auth, center, cache.clone());
        let frame = r#"{"type":"sale_created","data":{"amount":3}}"#;
        channel.handle_message(frame);
        channel.handle_message(frame);

        assert_eq!(cache.is_stale(&QueryKey::sales()), Some(true));
        assert_eq!(cache.is_stale(&QueryKey::commissions()), Some(false));
    }
}
