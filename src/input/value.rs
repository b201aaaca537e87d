use crate::observer::Observers;

/// A cached input value with change and update notifications.
///
/// [`InputValue::set`] fires `on_changed(old, new)` only when the value
/// differs, then always fires `on_updated(new)`. Both run on the input
/// context.
#[derive(Debug)]
pub struct InputValue<T> {
    value: T,
    on_changed: Observers<(T, T)>,
    on_updated: Observers<T>,
}

impl<T: Copy + PartialEq + Default> Default for InputValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + PartialEq> InputValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            on_changed: Observers::new(),
            on_updated: Observers::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    /// Returns whether the value changed.
    pub fn set(&mut self, value: T) -> bool {
        let old = self.value;
        self.value = value;
        let changed = old != value;
        if changed {
            self.on_changed.notify(&(old, value));
        }
        self.on_updated.notify(&value);
        changed
    }

    pub fn on_changed(&mut self, callback: impl FnMut(&(T, T)) + Send + 'static) {
        self.on_changed.subscribe(callback);
    }

    pub fn on_updated(&mut self, callback: impl FnMut(&T) + Send + 'static) {
        self.on_updated.subscribe(callback);
    }

    /// Copy of the current value with no observers attached.
    pub fn snapshot(&self) -> Self {
        Self::new(self.value)
    }
}
