use tokio::sync::watch;

/// Observable "is audio playing" flag. Receivers only wake on real changes.
#[derive(Debug, Clone)]
pub struct SpeakingSignal {
    tx: watch::Sender<bool>,
}

impl SpeakingSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn set(&self, speaking: bool) {
        self.tx.send_if_modified(|current| {
            if *current == speaking {
                return false;
            }
            *current = speaking;
            true
        });
    }

    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for SpeakingSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_starts_false() {
        assert!(!SpeakingSignal::new().get());
    }

    #[test]
    fn test_set_without_receivers() {
        let signal = SpeakingSignal::new();
        signal.set(true);
        assert!(signal.get());
    }

    #[tokio::test]
    async fn test_receiver_sees_change_once() {
        let signal = SpeakingSignal::new();
        let mut rx = signal.subscribe();
        signal.set(true);
        signal.set(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(!rx.has_changed().unwrap());

        signal.set(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }

    #[test]
    fn test_clones_share_state() {
        let a = SpeakingSignal::new();
        let b = a.clone();
        a.set(true);
        assert!(b.get());
    }
}
