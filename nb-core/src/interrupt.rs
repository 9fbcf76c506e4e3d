use futures::future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::*;

/// A stream of Ctrl-C presses.  Every clone observes every interrupt delivered after it was
/// created, so several concurrent waits can share one signal handler.
#[derive(Clone, Debug)]
pub struct Interrupts {
    rx: watch::Receiver<u32>,
    seen: u32,
}

#[derive(Clone, Debug)]
pub struct InterruptSender(watch::Sender<u32>);

impl InterruptSender {
    pub fn interrupt(&self) {
        self.0.send_modify(|count| *count += 1);
    }
}

impl Interrupts {
    pub fn manual() -> (InterruptSender, Interrupts) {
        let (tx, rx) = watch::channel(0);
        (InterruptSender(tx), Interrupts { rx, seen: 0 })
    }

    pub fn never() -> Interrupts {
        Interrupts::manual().1
    }

    /// Resolves on the next interrupt and returns the total number received so far.  Never
    /// resolves once the sending side is gone.
    pub async fn next(&mut self) -> u32 {
        loop {
            let current = *self.rx.borrow_and_update();
            if current > self.seen {
                self.seen = current;
                return current;
            }

            if self.rx.changed().await.is_err() {
                future::pending::<()>().await;
            }
        }
    }

    pub fn count(&self) -> u32 {
        self.seen
    }
}

/// Installs a Ctrl-C handler for the lifetime of the section.  While the section is alive the
/// process does not exit on SIGINT; callers decide what an interrupt means.
pub struct CtrlCSection {
    task: JoinHandle<()>,
    interrupts: Interrupts,
}

impl CtrlCSection {
    pub fn install() -> CtrlCSection {
        let (tx, interrupts) = Interrupts::manual();
        let task = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("received interrupt");
                tx.interrupt();
            }
        });
        CtrlCSection { task, interrupts }
    }

    pub fn interrupts(&self) -> Interrupts {
        self.interrupts.clone()
    }
}

impl Drop for CtrlCSection {
    fn drop(&mut self) {
        self.task.abort();
    }
}
