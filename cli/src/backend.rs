//! Local thread service used when no remote server is configured.
//!
//! It owns a few seeded threads, echoes every sent message back with delivery updates and a
//! short reply, and serves older history in pages until a fixed depth is exhausted.

use std::time::Duration;

use chatline_protocol::ThreadId;
use chatline_protocol::models::AttachmentInfo;
use chatline_protocol::models::DeliveryState;
use chatline_protocol::models::ItemId;
use chatline_protocol::models::ItemPosition;
use chatline_protocol::models::Message;
use chatline_protocol::models::MessageDirection;
use chatline_protocol::models::ThreadSummary;
use chatline_protocol::outgoing::OutgoingMessage;
use chatline_protocol::protocol::Event;
use chatline_protocol::protocol::Op;
use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

const LOCAL_SENDER: &str = "you";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackConfig {
    /// Messages each thread starts with.
    pub seeded_messages: usize,
    /// Older pages available per thread before "load more" reports exhaustion.
    pub history_pages: usize,
    pub delivery_delay: Duration,
    pub reply_delay: Duration,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            seeded_messages: 30,
            history_pages: 3,
            delivery_delay: Duration::from_millis(300),
            reply_delay: Duration::from_millis(900),
        }
    }
}

/// An event to emit after `delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub delay: Duration,
    pub event: Event,
}

impl Scheduled {
    fn now(event: Event) -> Self {
        Self {
            delay: Duration::ZERO,
            event,
        }
    }
}

struct LoopbackThread {
    summary: ThreadSummary,
    messages: Vec<Message>,
    next_position: i64,
    oldest_position: i64,
    pages_left: usize,
}

impl LoopbackThread {
    fn seeded(title: &str, members: &[&str], config: &LoopbackConfig, now: DateTime<Utc>) -> Self {
        let id = ThreadId::new();
        let count = i64::try_from(config.seeded_messages).unwrap_or(i64::MAX);
        let started = now - TimeDelta::minutes(count + 5);
        let messages = (0..count)
            .map(|position| {
                let sender = members[usize::try_from(position).unwrap_or(0) % members.len()];
                incoming(
                    id,
                    ItemPosition(position),
                    sender,
                    started + TimeDelta::minutes(position),
                    format!("{title} message #{}", position + 1),
                )
            })
            .collect::<Vec<_>>();
        Self {
            summary: ThreadSummary {
                id,
                title: title.to_string(),
                members: members.iter().map(|member| (*member).to_string()).collect(),
                started,
                message_count: messages.len(),
            },
            messages,
            next_position: count,
            oldest_position: 0,
            pages_left: config.history_pages,
        }
    }

    fn replier(&self) -> &str {
        self.summary
            .members
            .first()
            .map_or("echo", String::as_str)
    }

    fn next_position(&mut self) -> ItemPosition {
        let position = ItemPosition(self.next_position);
        self.next_position += 1;
        position
    }
}

fn incoming(
    thread_id: ThreadId,
    position: ItemPosition,
    sender: &str,
    sent_at: DateTime<Utc>,
    text: String,
) -> Message {
    Message {
        id: ItemId::new(),
        position,
        thread_id,
        sender: sender.to_string(),
        direction: MessageDirection::Incoming,
        sent_at,
        text,
        html: None,
        attachments: Vec::new(),
        delivery: DeliveryState::Delivered,
        errors: Vec::new(),
    }
}

pub struct LoopbackService {
    config: LoopbackConfig,
    threads: Vec<LoopbackThread>,
}

impl LoopbackService {
    pub fn new(config: LoopbackConfig) -> Self {
        let now = Utc::now();
        let threads = vec![
            LoopbackThread::seeded("general", &["ada", "grace", "linus"], &config, now),
            LoopbackThread::seeded("random", &["ken", "barbara"], &config, now),
        ];
        Self { config, threads }
    }

    fn thread_mut(&mut self, thread_id: ThreadId) -> Option<&mut LoopbackThread> {
        self.threads
            .iter_mut()
            .find(|thread| thread.summary.id == thread_id)
    }

    /// Applies `op` and returns the events it produces, in emission order.
    pub fn handle(&mut self, op: Op, now: DateTime<Utc>) -> Vec<Scheduled> {
        match op {
            Op::ListThreads => vec![Scheduled::now(Event::ThreadsListed {
                threads: self
                    .threads
                    .iter()
                    .map(|thread| thread.summary.clone())
                    .collect(),
            })],
            Op::OpenThread { thread_id } => match self.thread_mut(thread_id) {
                Some(thread) => vec![Scheduled::now(Event::ThreadOpened {
                    summary: thread.summary.clone(),
                    messages: thread.messages.clone(),
                })],
                None => vec![unknown_thread(thread_id)],
            },
            Op::SendMessage(outgoing) => self.send(outgoing, now),
            Op::LoadMore {
                thread_id,
                before,
                limit,
            } => self.load_more(thread_id, before, limit),
        }
    }

    fn send(&mut self, outgoing: OutgoingMessage, now: DateTime<Utc>) -> Vec<Scheduled> {
        let Some(thread_id) = outgoing.thread_id else {
            return vec![Scheduled::now(Event::Error {
                message: "message has no thread".to_string(),
            })];
        };
        let config = self.config;
        let Some(thread) = self.thread_mut(thread_id) else {
            return vec![unknown_thread(thread_id)];
        };

        let attachments = outgoing
            .attachments
            .iter()
            .map(|attachment| AttachmentInfo {
                name: attachment.name.clone(),
                size: attachment.size(),
                content_type: attachment.content_type.clone(),
                loaded: false,
            })
            .collect::<Vec<_>>();
        let html = (!outgoing.html.is_empty()).then(|| outgoing.html.clone());
        let sent = Message {
            id: ItemId::new(),
            position: thread.next_position(),
            thread_id,
            sender: LOCAL_SENDER.to_string(),
            direction: MessageDirection::Outgoing,
            sent_at: now,
            text: outgoing.plain_text.clone(),
            html,
            attachments,
            delivery: DeliveryState::Sent,
            errors: Vec::new(),
        };
        let mut delivered = sent.clone();
        delivered.delivery = DeliveryState::Delivered;
        for attachment in &mut delivered.attachments {
            attachment.loaded = true;
        }
        thread.messages.push(delivered.clone());

        let reply_text = match outgoing.attachments.len() {
            0 => format!("you said: {}", outgoing.plain_text),
            1 => "thanks for the file".to_string(),
            n => format!("thanks for the {n} files"),
        };
        let reply = incoming(
            thread_id,
            thread.next_position(),
            thread.replier(),
            now + TimeDelta::from_std(config.reply_delay).unwrap_or_default(),
            reply_text,
        );
        thread.messages.push(reply.clone());
        thread.summary.message_count += 2;

        vec![
            Scheduled::now(Event::MessageAdded(sent)),
            Scheduled {
                delay: config.delivery_delay,
                event: Event::MessageUpdated(delivered),
            },
            Scheduled {
                delay: config.reply_delay,
                event: Event::MessageAdded(reply),
            },
        ]
    }

    fn load_more(
        &mut self,
        thread_id: ThreadId,
        before: ItemPosition,
        limit: usize,
    ) -> Vec<Scheduled> {
        let Some(thread) = self.thread_mut(thread_id) else {
            return vec![unknown_thread(thread_id)];
        };
        if thread.pages_left == 0 || limit == 0 {
            return vec![Scheduled::now(Event::OlderMessages {
                thread_id,
                messages: Vec::new(),
                exhausted: true,
            })];
        }

        let top = before.0.min(thread.oldest_position);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let page_started = thread.summary.started - TimeDelta::days(1);
        let messages = (1..=limit)
            .map(|offset| {
                let position = top - offset;
                incoming(
                    thread_id,
                    ItemPosition(position),
                    thread.replier(),
                    page_started + TimeDelta::minutes(position),
                    format!("archived message {position}"),
                )
            })
            .collect::<Vec<_>>();
        thread.oldest_position = top - limit;
        thread.pages_left -= 1;
        thread.summary.message_count += messages.len();
        let exhausted = thread.pages_left == 0;
        tracing::debug!(%thread_id, top, exhausted, "serving older page");

        vec![Scheduled::now(Event::OlderMessages {
            thread_id,
            messages,
            exhausted,
        })]
    }
}

fn unknown_thread(thread_id: ThreadId) -> Scheduled {
    Scheduled::now(Event::Error {
        message: format!("unknown thread {thread_id}"),
    })
}

/// Serves `op_rx` until the UI hangs up.
pub async fn run_loopback_backend(
    config: LoopbackConfig,
    mut op_rx: UnboundedReceiver<Op>,
    event_tx: UnboundedSender<Event>,
) -> anyhow::Result<()> {
    let mut service = LoopbackService::new(config);
    while let Some(op) = op_rx.recv().await {
        tracing::debug!(?op, "loopback op");
        for scheduled in service.handle(op, Utc::now()) {
            if scheduled.delay.is_zero() {
                if event_tx.send(scheduled.event).is_err() {
                    return Ok(());
                }
                continue;
            }
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(scheduled.delay).await;
                let _ = event_tx.send(scheduled.event);
            });
        }
    }
    Ok(())
}
