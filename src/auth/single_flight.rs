use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::{collections::HashMap, future::Future};

/// Registry of in-flight operations keyed by string.
///
/// The first caller for a key starts the operation; callers arriving while it
/// is pending join it and all of them observe the same result. The entry is
/// dropped once the operation resolves, so the next call starts fresh.
pub struct SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    inflight: Mutex<HashMap<String, Shared<BoxFuture<'static, Result<T, E>>>>>,
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `start()` unless an operation for `key` is already pending.
    ///
    /// The pending future is driven by whichever waiter polls it, so a
    /// cancelled leader does not strand the others.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = {
            let mut inflight = self.inflight.lock();
            match inflight.get(key) {
                Some(pending) => pending.clone(),
                None => {
                    let flight = start().boxed().shared();
                    inflight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        let mut inflight = self.inflight.lock();
        if inflight
            .get(key)
            .is_some_and(|pending| pending.ptr_eq(&flight))
        {
            inflight.remove(key);
        }

        result
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.inflight.lock().len()
    }
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
