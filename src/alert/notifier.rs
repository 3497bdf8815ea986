//! 推送通知
//!
//! 通知是"发出即忘"的: 调用方不等待网络, 失败只记录日志.

use std::thread;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use serde_json::json;
use tracing::{error, info};

const PUSHBULLET_URL: &str = "https://api.pushbullet.com/v2/pushes";

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// 未配置推送时只写日志
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!("🔔 {}: {}", title, body);
        Ok(())
    }
}

struct Note {
    title: String,
    body: String,
}

/// Pushbullet 推送, 网络请求在独立线程中发送
pub struct PushbulletNotifier {
    tx: Sender<Note>,
}

impl PushbulletNotifier {
    /// 启动发送线程; 通知器析构后线程随通道关闭退出
    pub fn spawn(token: String) -> Result<Self> {
        let (tx, rx) = bounded::<Note>(8);

        thread::Builder::new()
            .name("pushbullet".into())
            .spawn(move || {
                for note in rx {
                    let result = ureq::post(PUSHBULLET_URL)
                        .set("Access-Token", &token)
                        .send_json(json!({
                            "type": "note",
                            "title": note.title,
                            "body": note.body,
                        }));
                    match result {
                        Ok(_) => info!("📨 推送已发送: {}", note.title),
                        Err(e) => error!("❌ 推送发送失败: {}", e),
                    }
                }
            })?;

        Ok(Self { tx })
    }
}

impl Notifier for PushbulletNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        let note = Note {
            title: title.to_string(),
            body: body.to_string(),
        };
        match self.tx.try_send(note) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(anyhow!("推送队列已满, 丢弃通知")),
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("推送线程已退出")),
        }
    }
}

/// 根据是否配置 token 选择通知方式
pub fn from_token(token: Option<&str>) -> Box<dyn Notifier> {
    match token.filter(|t| !t.trim().is_empty()) {
        Some(token) => match PushbulletNotifier::spawn(token.trim().to_string()) {
            Ok(notifier) => Box::new(notifier),
            Err(e) => {
                error!("❌ 推送线程启动失败: {}, 改为仅日志", e);
                Box::new(LogNotifier)
            }
        },
        None => Box::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_notifier_never_fails() {
        assert!(LogNotifier.notify("Alert", "Activity detected!").is_ok());
    }

    #[test]
    fn blank_token_falls_back_to_log() {
        let notifier = from_token(Some("   "));
        assert!(notifier.notify("Alert", "x").is_ok());
    }
}
