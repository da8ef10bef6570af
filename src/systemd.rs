//! Optional sd_notify integration for running the crawler as a systemd
//! service (`Type=notify`, optionally with `WatchdogSec=`).
//!
//! Every method is a no-op when disabled or off Linux, so callers never need
//! `#[cfg]` guards.

#[derive(Debug, Clone, Copy)]
pub(crate) struct SystemdNotifier {
    enabled: bool,
}

impl SystemdNotifier {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// `READY=1`: sources loaded, crawl starting.
    pub(crate) fn notify_ready(&self) {
        self.send(Message::Ready);
    }

    /// `STOPPING=1`: the crawl has ended and the process is exiting.
    pub(crate) fn notify_stopping(&self) {
        self.send(Message::Stopping);
    }

    /// `STATUS=<msg>`, shown by `systemctl status`.
    pub(crate) fn notify_status(&self, msg: &str) {
        self.send(Message::Status(msg));
    }

    /// `WATCHDOG=1`, sent after every store write.
    pub(crate) fn notify_watchdog(&self) {
        self.send(Message::Watchdog);
    }

    fn send(&self, message: Message<'_>) {
        if self.enabled {
            message.send();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Message<'a> {
    Ready,
    Stopping,
    Status(&'a str),
    Watchdog,
}

impl Message<'_> {
    #[cfg(target_os = "linux")]
    fn send(self) {
        use sd_notify::NotifyState;

        let state = match self {
            Message::Ready => NotifyState::Ready,
            Message::Stopping => NotifyState::Stopping,
            Message::Status(msg) => NotifyState::Status(msg),
            Message::Watchdog => NotifyState::Watchdog,
        };
        if let Err(e) = sd_notify::notify(false, &[state]) {
            tracing::debug!(error = %e, message = ?self, "sd_notify failed");
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn send(self) {}
}
