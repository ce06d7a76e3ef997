//! Fire-and-forget subscriber fan-out
//!
//! Publishers hand each registered handler its own spawned task and never
//! wait for completion. Handlers must therefore tolerate concurrent and
//! overlapping invocation (notification N+1 may be dispatched while N is
//! still running) and must not assume any relative delivery order across
//! subscribers. A handler failure never propagates back to the publisher.

use std::sync::Arc;

/// Shared callback handle invoked with each published value
pub type Subscriber<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Wrap a closure into a [`Subscriber`] handle
pub fn subscriber<T, F>(f: F) -> Subscriber<T>
where
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Dispatch `value` to every subscriber on its own task
///
/// Returns immediately; completion of individual handlers is not observed.
pub fn fan_out<T>(subscribers: &[Subscriber<T>], value: T)
where
    T: Clone + Send + 'static,
{
    for handler in subscribers {
        let handler = Arc::clone(handler);
        let value = value.clone();
        tokio::spawn(async move {
            handler(value);
        });
    }
}
