//! Deferred destruction of objects that may still be in use by the GPU.

#[derive(Debug)]
struct Item<T> {
    value: T,
    // Time to live
    ttl: u32,
}

/// Keeps values alive for a fixed number of frames before dropping them.
#[derive(Debug)]
pub struct DeletionQueue<T> {
    max_ttl: u32,
    items: Vec<Item<T>>,
}

impl<T> DeletionQueue<T> {
    /// Create a queue that drops values `max_ttl` frames after they are pushed.
    /// A queue with a `max_ttl` of zero drops values immediately.
    pub fn new(max_ttl: u32) -> DeletionQueue<T> {
        DeletionQueue {
            max_ttl,
            items: vec![],
        }
    }

    /// Pushes a value onto the deletion queue.
    /// Note that this moves out of the parameter so that you can't access an object after
    /// it is pushed.
    pub fn push(&mut self, value: T) {
        if self.max_ttl == 0 {
            return;
        }
        self.items.push(Item {
            value,
            ttl: self.max_ttl,
        });
    }

    /// Advance the frame counter by one, decreasing time to live by one on each element.
    /// If time to live of an element reaches zero, it is deleted.
    pub fn next_frame(&mut self) {
        self.items.iter_mut().for_each(|item| item.ttl -= 1);
        self.items.retain(|item| item.ttl != 0);
    }

    /// Number of values waiting to be dropped.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no values waiting to be dropped.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the values waiting to be dropped.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|item| &item.value)
    }
}
