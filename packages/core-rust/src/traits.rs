/// Receives recomputed results of a live query.
///
/// Called from the notification context, never from the task that performed
/// the mutation. Deliveries to one watcher arrive in order; different
/// watchers may run concurrently.
pub trait Watcher<T>: Send + Sync + 'static {
    /// Called with the current result on registration and after every
    /// mutation that can change it.
    fn on_changed(&self, result: &T);
}

impl<T, F> Watcher<T> for F
where
    F: Fn(&T) + Send + Sync + 'static,
{
    fn on_changed(&self, result: &T) {
        self(result);
    }
}
