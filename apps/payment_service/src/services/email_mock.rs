// apps/payment_service/src/services/email_mock.rs

use async_trait::async_trait;
use orderpay::{Order, PaymentNotifier};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct SentEmailInfo {
  pub to: String,
  pub from: String,
  pub subject: String,
  pub body_preview: String, // First N chars of body
  pub message_id: String,
}

pub async fn send_mock_email(to: &str, from: &str, subject: &str, html_body: &str) -> anyhow::Result<SentEmailInfo> {
  info!(
    "Simulating sending email: To='{}', From='{}', Subject='{}'",
    to, from, subject
  );
  tokio::time::sleep(std::time::Duration::from_millis(20)).await; // Simulate network latency

  if to.to_lowercase().contains("fail_test") {
    warn!("Simulated email failure for recipient: {}", to);
    anyhow::bail!("Simulated email send failure");
  }

  let body_preview = html_body.chars().take(50).collect::<String>() + "...";
  let message_id = format!("mock_email_{}", uuid::Uuid::new_v4());
  info!("Mock email sent successfully. Message ID: {}", message_id);

  Ok(SentEmailInfo {
    to: to.to_string(),
    from: from.to_string(),
    subject: subject.to_string(),
    body_preview,
    message_id,
  })
}

/// Tells customers about payment outcomes by (mock) e-mail.
#[derive(Debug, Clone)]
pub struct MockEmailNotifier {
  sender: String,
}

impl MockEmailNotifier {
  pub fn new(sender: impl Into<String>) -> Self {
    Self { sender: sender.into() }
  }

  async fn send(&self, order: &Order, subject: String, body: String) -> anyhow::Result<()> {
    let Some(to) = order.customer_email.as_deref() else {
      info!(order_id = %order.order_number, "no customer e-mail on order, skipping notification");
      return Ok(());
    };
    let sent = send_mock_email(to, &self.sender, &subject, &body).await?;
    debug!(
      order_id = %order.order_number,
      message_id = %sent.message_id,
      to = %sent.to,
      from = %sent.from,
      subject = %sent.subject,
      preview = %sent.body_preview,
      "payment notification sent"
    );
    Ok(())
  }
}

#[async_trait]
impl PaymentNotifier for MockEmailNotifier {
  async fn payment_confirmed(&self, order: &Order) -> anyhow::Result<()> {
    self
      .send(
        order,
        format!("Payment received for order {}", order.order_number),
        format!(
          "<p>We have received your payment of {} for order <b>{}</b>. Thank you!</p>",
          order.total_amount, order.order_number
        ),
      )
      .await
  }

  async fn payment_failed(&self, order: &Order) -> anyhow::Result<()> {
    self
      .send(
        order,
        format!("Payment for order {} was not completed", order.order_number),
        format!(
          "<p>Your payment for order <b>{}</b> did not go through. You can try again from your orders page.</p>",
          order.order_number
        ),
      )
      .await
  }
}
