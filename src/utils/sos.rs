use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag.
///
/// Clones observe the same flag: once any clone calls [`SignalOfStop::cancel`]
/// every clone reports [`SignalOfStop::cancelled`]. Cancellation is sticky;
/// there is no way to re-arm a signal.
#[derive(Debug, Clone, Default)]
pub struct SignalOfStop {
    closing: Arc<AtomicBool>,
}

impl SignalOfStop {
    pub fn new() -> SignalOfStop {
        SignalOfStop::default()
    }

    /// Raise the flag. Returns `true` only for the call that actually flipped it.
    pub fn cancel(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    pub fn cancelled(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let sos = SignalOfStop::new();
        let other = sos.clone();

        assert!(!other.cancelled());
        assert!(sos.cancel());
        assert!(other.cancelled());

        // second cancel does not flip anything
        assert!(!other.cancel());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let sos = SignalOfStop::new();
        let remote = sos.clone();

        let flipped = thread::spawn(move || remote.cancel())
            .join()
            .expect("canceller thread panicked");

        assert!(flipped);
        assert!(sos.cancelled());
    }
}
