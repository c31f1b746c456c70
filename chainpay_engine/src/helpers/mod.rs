mod retry;
mod webhook_signature;

pub use retry::{retry_read, RetryPolicy};
pub use webhook_signature::{SignatureError, WebhookVerifier, SIGNATURE_PREFIX};
