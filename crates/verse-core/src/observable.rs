//! Latest-value holder that broadcasts every change to its subscribers.

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug)]
pub struct StateCell<T: Clone> {
    value: T,
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        let value = &self.value;
        let subscribers = self
            .subscribers
            .get_mut()
            .unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// New receiver, primed with the current value.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        if tx.send(self.value.clone()).is_ok() {
            self.subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(tx);
        }
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_sees_current_value_then_updates() {
        let mut cell = StateCell::new(1);
        let rx = cell.subscribe();
        cell.set(2);
        cell.set(3);
        let seen: Vec<i32> = rx.try_iter().collect();
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(*cell.get(), 3);
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_next_set() {
        let mut cell = StateCell::new(String::from("a"));
        let keep = cell.subscribe();
        let dropped = cell.subscribe();
        assert_eq!(cell.subscriber_count(), 2);
        drop(dropped);
        cell.set("b".into());
        assert_eq!(cell.subscriber_count(), 1);
        assert_eq!(keep.try_iter().last().as_deref(), Some("b"));
    }
}
