use std::collections::HashMap;

/// Native window handle to window state. A window being created is pending
/// until its first message.
#[derive(Debug)]
pub struct WindowRegistry<T> {
    pending: Option<T>,
    windows: HashMap<isize, T>,
}

impl<T> Default for WindowRegistry<T> {
    fn default() -> Self {
        Self {
            pending: None,
            windows: HashMap::new(),
        }
    }
}

impl<T: Clone> WindowRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `window` until its first message arrives.
    pub fn begin_create(&mut self, window: T) {
        debug_assert!(self.pending.is_none(), "nested window creation");
        self.pending = Some(window);
    }

    /// Drops the pending window if no message claimed it.
    pub fn end_create(&mut self) -> Option<T> {
        self.pending.take()
    }

    #[cfg(test)]
    pub(crate) fn is_creating(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolves the window for `handle`. An unknown handle adopts the pending
    /// window, if any. Returns the window and whether it was just bound.
    pub fn bind(&mut self, handle: isize) -> Option<(T, bool)> {
        if let Some(window) = self.windows.get(&handle) {
            return Some((window.clone(), false));
        }

        let window = self.pending.take()?;
        self.windows.insert(handle, window.clone());
        Some((window, true))
    }

    #[cfg(test)]
    pub(crate) fn get(&self, handle: isize) -> Option<T> {
        self.windows.get(&handle).cloned()
    }

    pub fn remove(&mut self, handle: isize) -> Option<T> {
        self.windows.remove(&handle)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.windows.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
