use std::future::Future;
use std::sync::Arc;

use super::{QueryCache, QueryKey, QueryOptions, QueryState};

/// One view's subscription to a changing query key.
///
/// With `keep_previous_data`, switching keys (next page, new filter) keeps
/// the last key's data on screen until the new key has loaded.
pub struct QueryObserver<T> {
    last_key: Option<QueryKey>,
    last_data: Option<Arc<T>>,
}

impl<T> Default for QueryObserver<T> {
    fn default() -> Self {
        Self {
            last_key: None,
            last_data: None,
        }
    }
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe<F, Fut>(
        &mut self,
        cache: &QueryCache,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> QueryState<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let state = cache.observe(key, options, fetcher);
        self.apply(key, options, state)
    }

    fn apply(&mut self, key: &QueryKey, options: &QueryOptions, mut state: QueryState<T>) -> QueryState<T> {
        if let Some(data) = &state.data {
            self.last_key = Some(key.clone());
            self.last_data = Some(Arc::clone(data));
            return state;
        }

        if options.keep_previous_data && self.last_key.as_ref() != Some(key) {
            if let Some(previous) = &self.last_data {
                state.data = Some(Arc::clone(previous));
                state.is_previous_data = true;
                state.is_loading = false;
            }
        }
        state
    }

    /// Forget the previous data, e.g. after logout.
    pub fn reset(&mut self) {
        self.last_key = None;
        self.last_data = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Resource;
    use std::time::Duration;

    fn page(n: u32) -> QueryKey {
        QueryKey::with_params(Resource::Cars, &n)
    }

    fn slow(value: Vec<u32>) -> impl FnOnce() -> futures::future::BoxFuture<'static, anyhow::Result<Vec<u32>>> {
        use futures::FutureExt;
        move || {
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_page_stays_visible() {
        let cache = QueryCache::new();
        let options = QueryOptions::list();
        let mut observer = QueryObserver::new();

        observer.observe(&cache, &page(1), &options, slow(vec![1, 2]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let first = observer.observe(&cache, &page(1), &options, slow(vec![1, 2]));
        assert_eq!(first.data.as_deref(), Some(&vec![1, 2]));
        assert!(!first.is_previous_data);

        let switching = observer.observe(&cache, &page(2), &options, slow(vec![3, 4]));
        assert_eq!(switching.data.as_deref(), Some(&vec![1, 2]));
        assert!(switching.is_previous_data);
        assert!(switching.is_fetching);
        assert!(!switching.is_loading);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = observer.observe(&cache, &page(2), &options, slow(vec![3, 4]));
        assert_eq!(second.data.as_deref(), Some(&vec![3, 4]));
        assert!(!second.is_previous_data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_keep_previous_data_shows_loading() {
        let cache = QueryCache::new();
        let options = QueryOptions::default();
        let mut observer = QueryObserver::new();

        observer.observe(&cache, &page(1), &options, slow(vec![1]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        observer.observe(&cache, &page(1), &options, slow(vec![1]));

        let switching = observer.observe(&cache, &page(2), &options, slow(vec![2]));
        assert!(switching.data.is_none());
        assert!(switching.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forgets_previous_data() {
        let cache = QueryCache::new();
        let options = QueryOptions::list();
        let mut observer = QueryObserver::new();

        observer.observe(&cache, &page(1), &options, slow(vec![1]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        observer.observe(&cache, &page(1), &options, slow(vec![1]));
        observer.reset();

        let switching = observer.observe(&cache, &page(2), &options, slow(vec![2]));
        assert!(switching.data.is_none());
    }
}
