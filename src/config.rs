//! 系统配置 - 通过JSON文件调整参数, 命令行可覆盖

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 智能摄像头警报系统参数
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "SCAS - 智能摄像头警报系统", long_about = None)]
pub struct Args {
    /// 配置文件路径 (默认: <配置目录>/scas/scas.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// ONNX检测模型路径
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// 摄像头索引, 按优先顺序尝试 (可重复: -d 0 -d 1)
    #[arg(short = 'd', long = "camera")]
    pub cameras: Vec<usize>,

    /// 录像保存目录
    #[arg(short, long)]
    pub recordings: Option<PathBuf>,
}

impl Args {
    /// 加载配置文件并应用命令行覆盖
    pub fn resolve(&self) -> ScasConfig {
        let path = self
            .config
            .clone()
            .unwrap_or_else(ScasConfig::default_path);
        let mut config = ScasConfig::load(&path);

        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if !self.cameras.is_empty() {
            config.camera_indices = self.cameras.clone();
        }
        if let Some(dir) = &self.recordings {
            config.recordings_dir = dir.clone();
        }
        config
    }
}

/// 系统配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScasConfig {
    // === 摄像头 ===
    pub camera_indices: Vec<usize>,   // 摄像头优先顺序
    pub camera_settle_ms: u64,        // 打开摄像头前的等待(让系统释放句柄)
    pub camera_open_timeout_ms: u64,  // 等待首帧的超时

    // === 检测 ===
    pub model_path: PathBuf,
    pub inference_size: u32,
    pub confidence_threshold: f32, // 严格大于该值才算命中
    pub person_label: String,
    pub font_path: Option<PathBuf>, // 标注字体, 为空时只画框

    // === 录像 ===
    pub recordings_dir: PathBuf,
    pub record_width: u32,
    pub record_height: u32,
    pub record_fps: u32,
    pub jpeg_quality: u8,

    // === 警报 ===
    pub alarm_sound: PathBuf,
    pub pushbullet_token: Option<String>,
    pub notification_title: String,
    pub notification_body: String,

    // === 显示 / 生命周期 ===
    pub display_interval_ms: u64, // 画面轮询间隔 (~30次/秒)
    pub release_grace_ms: u64,    // 释放硬件后到允许重新激活的间隔
}

impl Default for ScasConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let downloads = dirs::download_dir().unwrap_or_else(|| home.join("Downloads"));

        Self {
            camera_indices: vec![0, 1],
            camera_settle_ms: 500,
            camera_open_timeout_ms: 5000,

            model_path: PathBuf::from("models/yolov8n.onnx"),
            inference_size: 640,
            confidence_threshold: 0.4,
            person_label: "person".to_string(),
            font_path: None,

            recordings_dir: home.join("scas_recordings"),
            record_width: 640,
            record_height: 480,
            record_fps: 20,
            jpeg_quality: 80,

            alarm_sound: downloads.join("alarm.wav"),
            pushbullet_token: None,
            notification_title: "Alert".to_string(),
            notification_body: "Activity detected!".to_string(),

            display_interval_ms: 33,
            release_grace_ms: 500,
        }
    }
}

impl ScasConfig {
    /// 默认配置文件位置
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scas")
            .join("scas.json")
    }

    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| crate::ScasError::Config(e.to_string()))?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn camera_settle(&self) -> Duration {
        Duration::from_millis(self.camera_settle_ms)
    }

    pub fn camera_open_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_open_timeout_ms)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    pub fn release_grace(&self) -> Duration {
        Duration::from_millis(self.release_grace_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前配置:");
        info!("  摄像头顺序: {:?}", self.camera_indices);
        info!("  检测模型: {}", self.model_path.display());
        info!("  检测置信度: > {:.2}", self.confidence_threshold);
        info!("  录像目录: {}", self.recordings_dir.display());
        info!(
            "  录像规格: {}x{} @ {}fps",
            self.record_width, self.record_height, self.record_fps
        );
        info!(
            "  推送通知: {}",
            if self.pushbullet_token.is_some() { "Pushbullet" } else { "仅日志" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ScasConfig::default();
        assert_eq!(config.camera_indices, vec![0, 1]);
        assert!((config.confidence_threshold - 0.4).abs() < f32::EPSILON);
        assert_eq!((config.record_width, config.record_height), (640, 480));
        assert_eq!(config.record_fps, 20);
        assert_eq!(config.notification_body, "Activity detected!");
        assert!(config.recordings_dir.ends_with("scas_recordings"));
    }

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scas.json");

        let config = ScasConfig::load(&path);

        assert_eq!(config, ScasConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_fills_remaining_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scas.json");
        fs::write(&path, r#"{ "camera_indices": [2], "record_fps": 15 }"#).unwrap();

        let config = ScasConfig::load(&path);

        assert_eq!(config.camera_indices, vec![2]);
        assert_eq!(config.record_fps, 15);
        assert_eq!(config.person_label, "person");
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scas.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(ScasConfig::load(&path), ScasConfig::default());
    }

    #[test]
    fn cli_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            config: Some(dir.path().join("scas.json")),
            model: Some(PathBuf::from("models/yolov8s.onnx")),
            cameras: vec![3, 0],
            recordings: Some(dir.path().join("rec")),
        };

        let config = args.resolve();

        assert_eq!(config.model_path, PathBuf::from("models/yolov8s.onnx"));
        assert_eq!(config.camera_indices, vec![3, 0]);
        assert_eq!(config.recordings_dir, dir.path().join("rec"));
    }
}
