//! Bot main loop.
//!
//! Reads events from the channel stream and hands each one to a per-user
//! worker task. Workers process their queue strictly in arrival order, so one
//! user's events never race each other while different users run in
//! parallel. A worker that sits idle for the session timeout exits; the next
//! event for that user spawns a fresh one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{Channel, IncomingMessage};
use crate::error::Error;
use crate::router::ConversationRouter;

/// How often idle sessions and finished workers are swept.
const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

struct Worker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

/// Event loop tying a channel to the conversation router.
pub struct Bot {
    channel: Arc<dyn Channel>,
    router: Arc<ConversationRouter>,
    session_idle_timeout: Duration,
    prune_interval: Duration,
}

impl Bot {
    pub fn new(
        channel: Arc<dyn Channel>,
        router: Arc<ConversationRouter>,
        session_idle_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            router,
            session_idle_timeout,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    pub fn with_prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval;
        self
    }

    /// Run until Ctrl+C or until the channel stream ends. Events already
    /// queued for a worker are finished before this returns.
    pub async fn run(self) -> Result<(), Error> {
        let mut stream = self.channel.start().await?;
        let mut workers: HashMap<String, Worker> = HashMap::new();

        let mut prune = tokio::time::interval(self.prune_interval);
        prune.tick().await; // Skip immediate first tick

        tracing::info!(channel = self.channel.name(), "Bot ready and listening");

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                _ = prune.tick() => {
                    let removed = self
                        .router
                        .sessions()
                        .prune_stale(self.session_idle_timeout)
                        .await;
                    workers.retain(|_, w| !(w.tx.is_closed() && w.handle.is_finished()));
                    tracing::debug!(removed, workers = workers.len(), "Prune tick");
                }
                msg = stream.next() => {
                    match msg {
                        Some(message) => self.dispatch(&mut workers, message),
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Bot shutting down...");
        let handles: Vec<JoinHandle<()>> = workers.into_values().map(|w| w.handle).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }
        self.channel.shutdown().await?;

        Ok(())
    }

    /// Queue an event on the user's worker, spawning one if needed.
    fn dispatch(&self, workers: &mut HashMap<String, Worker>, message: IncomingMessage) {
        let user_id = message.user_id.clone();

        let message = match workers.get(&user_id) {
            Some(worker) => match worker.tx.send(message) {
                Ok(()) => return,
                // Worker timed out and closed its queue
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let previous = workers.remove(&user_id).map(|w| w.handle);
        let worker = self.spawn_worker(user_id.clone(), previous);
        // The receiver is alive until this send is processed.
        let _ = worker.tx.send(message);
        workers.insert(user_id, worker);
    }

    fn spawn_worker(&self, user_id: String, previous: Option<JoinHandle<()>>) -> Worker {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let channel = Arc::clone(&self.channel);
        let router = Arc::clone(&self.router);
        let idle = self.session_idle_timeout;

        let handle = tokio::spawn(async move {
            // A retiring worker may still be draining; keep arrival order.
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            tracing::debug!(user_id = %user_id, "Worker started");

            loop {
                match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(Some(message)) => handle_event(&*channel, &router, message).await,
                    Ok(None) => break,
                    Err(_) => {
                        rx.close();
                        while let Ok(message) = rx.try_recv() {
                            handle_event(&*channel, &router, message).await;
                        }
                        break;
                    }
                }
            }

            tracing::debug!(user_id = %user_id, "Worker stopped");
        });

        Worker { tx, handle }
    }
}

async fn handle_event(channel: &dyn Channel, router: &ConversationRouter, message: IncomingMessage) {
    let reply = router.route(&message).await;
    if let Err(e) = channel.send(reply).await {
        tracing::warn!(
            user_id = %message.user_id,
            error = %e,
            "Failed to send reply"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::EventKind;
    use crate::channels::testing::RecordingChannel;
    use crate::content::ContentStore;
    use crate::content::JobPosting;
    use crate::menu::MenuRenderer;
    use crate::notify::NotificationDispatcher;

    fn event(user: &str, kind: EventKind) -> IncomingMessage {
        IncomingMessage::new("recording", user, kind)
    }

    fn bot(channel: Arc<RecordingChannel>, idle: Duration) -> (Bot, Arc<ConversationRouter>) {
        let menu = MenuRenderer::new(Arc::new(ContentStore::new(JobPosting::default())), None);
        let dispatcher = Arc::new(NotificationDispatcher::new(channel.clone(), "recruiter"));
        let router = Arc::new(ConversationRouter::new(menu, dispatcher));
        (Bot::new(channel, Arc::clone(&router), idle), router)
    }

    #[tokio::test]
    async fn replies_follow_arrival_order_per_user() {
        let channel = Arc::new(RecordingChannel::with_inbound([
            event("u1", EventKind::Action("begin_intake".into())),
            event("u2", EventKind::Action("show_faq".into())),
            event("u1", EventKind::Text("Ben".into())),
            event("u1", EventKind::Text("+100".into())),
            event("u1", EventKind::Text("no file".into())),
        ]));
        let (bot, router) = bot(Arc::clone(&channel), Duration::from_secs(60));

        bot.run().await.unwrap();

        let to_u1 = channel.sent_to("u1");
        assert_eq!(to_u1.len(), 4);
        assert!(to_u1[0].text.contains("name"));
        assert!(to_u1[3].text.contains("Thank you for applying"));
        assert_eq!(channel.sent_to("u2").len(), 1);
        assert_eq!(channel.sent_to("recruiter").len(), 1);
        assert_eq!(router.sessions().counts().await.in_intake, 0);
    }

    #[tokio::test]
    async fn reply_send_failure_does_not_stop_the_loop() {
        let channel = Arc::new(RecordingChannel::with_inbound([
            event("u1", EventKind::Command("start".into())),
            event("u1", EventKind::Action("show_posting".into())),
        ]));
        channel.fail_next(1);
        let (bot, _router) = bot(Arc::clone(&channel), Duration::from_secs(60));

        bot.run().await.unwrap();

        assert_eq!(channel.attempts(), 2);
        assert_eq!(channel.sent_to("u1").len(), 1);
    }

    #[tokio::test]
    async fn idle_worker_is_replaced_without_losing_events() {
        let channel = Arc::new(RecordingChannel::new());
        let (bot, _router) = bot(Arc::clone(&channel), Duration::from_millis(10));
        let mut workers = HashMap::new();

        bot.dispatch(&mut workers, event("u1", EventKind::Command("start".into())));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(workers["u1"].tx.is_closed());

        bot.dispatch(&mut workers, event("u1", EventKind::Action("show_faq".into())));
        let handle = workers.remove("u1").unwrap().handle;
        handle.await.unwrap();

        assert_eq!(channel.sent_to("u1").len(), 2);
    }
}
