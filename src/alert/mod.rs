/// 警报系统 (Alert System)
///
/// - Dispatcher: 在场状态去抖, 驱动通知与警报声
/// - Notifier:   推送通知 (Pushbullet / 日志)
/// - Alarm:      循环警报声
pub mod alarm;
pub mod dispatcher;
pub mod notifier;

pub use alarm::{Alarm, SharedAlarm};
pub use dispatcher::{AlertDispatcher, PresenceEdge};
pub use notifier::{LogNotifier, Notifier, PushbulletNotifier};
