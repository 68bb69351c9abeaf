use tokio::sync::watch;

/// Create a linked cancellation handle and token
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle { sender },
        CancelToken {
            receiver: Some(receiver),
        },
    )
}

/// Owner side of a cancellation; dropping it also cancels
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(self) {
        // Drop would close the channel anyway; send so open receivers see it
        let _ = self.sender.send(true);
    }
}

/// Observer side of a cancellation
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.receiver {
            None => false,
            Some(receiver) => *receiver.borrow() || receiver.has_changed().is_err(),
        }
    }

    /// Wait until the token is cancelled
    pub async fn cancelled(&mut self) {
        let Some(receiver) = self.receiver.as_mut() else {
            return std::future::pending().await;
        };
        // Err means the handle was dropped, which counts as cancelled
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
