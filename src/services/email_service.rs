//! 邮件发送

use crate::{config::EmailConfig, error::AppError};
use async_trait::async_trait;

/// Outbound mail transport
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, text: &str) -> Result<(), AppError>;

    /// Front-end origin that reset / verify links point at
    fn app_base_url(&self) -> &str;

    async fn send_reset_password_email(&self, to: &str, token: &str) -> Result<(), AppError> {
        let url = link(self.app_base_url(), "reset-password", token);
        let text = format!(
            "Dear user,\nTo reset your password, click on this link: {url}\n\
             If you did not request any password resets, then ignore this email."
        );
        self.send_email(to, "Reset password", &text).await
    }

    async fn send_verification_email(&self, to: &str, token: &str) -> Result<(), AppError> {
        let url = link(self.app_base_url(), "verify-email", token);
        let text = format!(
            "Dear user,\nTo verify your email, click on this link: {url}\n\
             If you did not create an account, then ignore this email."
        );
        self.send_email(to, "Email Verification", &text).await
    }
}

fn link(base: &str, path: &str, token: &str) -> String {
    format!("{}/{}?token={}", base.trim_end_matches('/'), path, token)
}

/// 只写日志、不真正投递的发送器
pub struct LogEmailSender {
    config: EmailConfig,
}

impl LogEmailSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_email(&self, to: &str, subject: &str, text: &str) -> Result<(), AppError> {
        tracing::info!(
            from = %self.config.from,
            to = %to,
            subject = %subject,
            "Email dispatched"
        );
        // 正文含一次性令牌，仅在 debug 级别输出
        tracing::debug!(to = %to, body = %text, "Email body");
        Ok(())
    }

    fn app_base_url(&self) -> &str {
        &self.config.app_base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn sender() -> LogEmailSender {
        LogEmailSender::new(EmailConfig {
            from: "noreply@example.com".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
        })
    }

    /// 在指定日志级别下发送一封重置邮件，返回捕获的日志
    async fn send_reset_at(level: Level) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        sender()
            .send_reset_password_email("alice@example.com", "one-time-reset-token")
            .await
            .unwrap();

        logs.text()
    }

    #[tokio::test]
    async fn test_token_stays_out_of_info_logs() {
        let logs = send_reset_at(Level::INFO).await;

        assert!(logs.contains("alice@example.com"));
        assert!(logs.contains("Reset password"));
        assert!(!logs.contains("one-time-reset-token"));
    }

    #[tokio::test]
    async fn test_body_logged_at_debug() {
        let logs = send_reset_at(Level::DEBUG).await;

        assert!(logs.contains("reset-password?token=one-time-reset-token"));
    }

    #[test]
    fn test_link_strips_trailing_slash() {
        assert_eq!(
            link("https://app.example.com/", "verify-email", "abc"),
            "https://app.example.com/verify-email?token=abc"
        );
    }

    #[tokio::test]
    async fn test_log_sender_accepts_mail() {
        let sender = sender();

        assert_eq!(sender.app_base_url(), "http://localhost:3000");
        assert!(sender
            .send_reset_password_email("alice@example.com", "token")
            .await
            .is_ok());
    }
}
