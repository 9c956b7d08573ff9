//! Cloudflare Queues integration. Credentials stay with the consumer's mailer.

use crate::email::{Email, EmailOptions};
use crate::http::HttpBackend;
use crate::mailer::ZeptoMailer;
use crate::options::SendOptions;
use worker::{MessageBatch, MessageExt};

/// Message format for the email queue.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueueEmailMessage {
    pub email_options: EmailOptions,
    #[serde(default)]
    pub send_options: SendOptions,
}

/// Result of processing a queued email.
#[derive(Debug, Clone)]
pub struct QueueProcessResult {
    pub success: bool,
    pub request_id: Option<String>,
    pub error: Option<String>,
    pub email_options: EmailOptions,
}

/// Sends one queued message without touching the queue.
pub async fn process_message<B: HttpBackend>(
    mailer: &ZeptoMailer<B>,
    message: &QueueEmailMessage,
) -> QueueProcessResult {
    let outcome = match Email::new(message.email_options.clone()) {
        Ok(mut email) => mailer
            .send(&mut email, message.send_options.clone())
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match outcome {
        Ok(report) => QueueProcessResult {
            success: true,
            request_id: report.request_id().map(str::to_string),
            error: None,
            email_options: message.email_options.clone(),
        },
        Err(error) => QueueProcessResult {
            success: false,
            request_id: None,
            error: Some(error),
            email_options: message.email_options.clone(),
        },
    }
}

/// Process a message batch: ack what was sent, retry the rest.
pub async fn process_batch<B: HttpBackend>(
    batch: MessageBatch<QueueEmailMessage>,
    mailer: &ZeptoMailer<B>,
) -> Vec<QueueProcessResult> {
    let messages = batch.messages().unwrap_or_default();
    let mut results = Vec::with_capacity(messages.len());
    for message in messages {
        let result = process_message(mailer, message.body()).await;
        if result.success {
            message.ack();
        } else {
            message.retry();
        }
        results.push(result);
    }
    results
}

/// Enqueue one email (send to the queue).
pub async fn enqueue_email(
    queue: &worker::Queue,
    message: &QueueEmailMessage,
) -> Result<(), worker::Error> {
    queue.send(message).await
}

/// Enqueue multiple emails.
pub async fn enqueue_emails(
    queue: &worker::Queue,
    messages: &[QueueEmailMessage],
) -> Result<(), worker::Error> {
    queue.send_batch(messages.to_vec()).await
}
