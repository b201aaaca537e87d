use std::fmt;

/// Callback list attached to a single entity.
///
/// Observers run synchronously on whichever context calls [`Observers::notify`];
/// each owner documents which context that is.
pub struct Observers<T: ?Sized> {
    callbacks: Vec<Box<dyn FnMut(&T) + Send>>,
}

impl<T: ?Sized> Observers<T> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&T) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn notify(&mut self, value: &T) {
        for callback in self.callbacks.iter_mut() {
            callback(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }
}

impl<T: ?Sized> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn notifies_in_subscription_order() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut observers = Observers::<u32>::new();
        for tag in 0..3 {
            let seen = seen.clone();
            observers.subscribe(move |value| seen.lock().unwrap().push((tag, *value)));
        }
        observers.notify(&7);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn empty_list_is_a_no_op() {
        let mut observers = Observers::<()>::default();
        assert!(observers.is_empty());
        observers.notify(&());

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        observers.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        observers.notify(&());
        observers.notify(&());
        assert_eq!(observers.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
