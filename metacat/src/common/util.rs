use parking_lot::RwLock;
use std::sync::Arc;

/// A thread-safe, shared, mutable container.
pub type Atomic<T> = Arc<RwLock<T>>;

/// Wraps a value in an [Atomic] container.
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_read_write() {
        let value = atomic(1);
        assert_eq!(*value.read(), 1);
        *value.write() = 2;
        assert_eq!(*value.read(), 2);
    }

    #[test]
    fn test_atomic_shared() {
        let value = atomic("shared".to_string());
        let clone = value.clone();
        *clone.write() = "changed".to_string();
        assert_eq!(*value.read(), "changed");
    }
}
