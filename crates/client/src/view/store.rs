//! Reducer-driven view state.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Page state that changes only through its own closed action set.
pub trait ViewState: Clone + Debug + Send + Sync + 'static {
    type Action: Debug + Send;

    fn reduce(&mut self, action: Self::Action);
}

/// Owner of one page's state.
///
/// [`ViewStore::dispatch`] is the only mutation path. After
/// [`ViewStore::unmount`] every dispatch is refused, so results that arrive
/// late from the network cannot touch a disposed page.
pub struct ViewStore<S: ViewState> {
    state: Arc<watch::Sender<S>>,
    mounted: Arc<AtomicBool>,
}

impl<S: ViewState> Clone for ViewStore<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            mounted: self.mounted.clone(),
        }
    }
}

impl<S: ViewState> ViewStore<S> {
    pub fn new(initial: S) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Apply `action`. Returns `false` when the page is gone.
    pub fn dispatch(&self, action: S::Action) -> bool {
        let mounted = &self.mounted;
        self.state.send_if_modified(|state| {
            if !mounted.load(Ordering::SeqCst) {
                crate::log_debug!("Dropping {:?} for unmounted view", action);
                return false;
            }
            state.reduce(action);
            true
        })
    }

    pub fn snapshot(&self) -> S {
        self.state.borrow().clone()
    }

    /// Read part of the state without cloning all of it.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Receiver woken after every applied action (for renderers).
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }

    pub fn unmount(&self) {
        // Taken under the state lock so no dispatch is half-applied.
        self.state.send_if_modified(|_| {
            self.mounted.store(false, Ordering::SeqCst);
            false
        });
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        value: i64,
        history: Vec<i64>,
    }

    #[derive(Debug)]
    enum CounterAction {
        Add(i64),
        Reset,
    }

    impl ViewState for Counter {
        type Action = CounterAction;

        fn reduce(&mut self, action: CounterAction) {
            match action {
                CounterAction::Add(n) => {
                    self.value += n;
                    self.history.push(n);
                }
                CounterAction::Reset => *self = Counter::default(),
            }
        }
    }

    #[test]
    fn test_dispatch_and_snapshot() {
        let store = ViewStore::new(Counter::default());
        assert!(store.dispatch(CounterAction::Add(2)));
        assert!(store.dispatch(CounterAction::Add(3)));
        assert_eq!(store.with(|s| s.value), 5);
        assert_eq!(store.snapshot().history, vec![2, 3]);

        store.dispatch(CounterAction::Reset);
        assert_eq!(store.snapshot(), Counter::default());
    }

    #[test]
    fn test_unmounted_store_refuses_actions() {
        let store = ViewStore::new(Counter::default());
        let late = store.clone();
        store.dispatch(CounterAction::Add(1));
        store.unmount();

        assert!(!late.is_mounted());
        assert!(!late.dispatch(CounterAction::Add(100)));
        assert_eq!(store.snapshot().value, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = ViewStore::new(Counter::default());
        let mut rx = store.subscribe();
        store.dispatch(CounterAction::Add(4));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().value, 4);
    }
}
