/// SCAS 智能摄像头警报系统 (Smart Camera Alert System)
///
/// 系统架构:
/// 1. 工作线程: 摄像头采集 → 人员检测 → 标注 → 警报/通知 → 录像
/// 2. 主线程:   预览显示 + 控制面板 + 警报声 (macroquad 事件循环)
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use macroquad::prelude::*;
use scas::alert::{notifier, SharedAlarm};
use scas::detection::detector::shared;
use scas::detection::{Annotator, PersonDetector, YoloDetector};
use scas::input::FfmpegCameraOpener;
use scas::pipeline::{Controller, PipelineParts, PipelineSettings};
use scas::recorder::AviSinkFactory;
use scas::renderer::{MonitorWindow, WINDOW_HEIGHT, WINDOW_TITLE, WINDOW_WIDTH};
use scas::Args;
use tracing_subscriber::EnvFilter;

fn window_conf() -> Conf {
    Conf {
        window_title: WINDOW_TITLE.to_string(),
        window_width: WINDOW_WIDTH,
        window_height: WINDOW_HEIGHT,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scas=info,ort=warn")),
        )
        .init();

    let args = Args::parse();
    let config = args.resolve();

    tracing::info!("🚀 SCAS 智能摄像头警报系统启动");
    config.print_summary();

    // ========== 加载检测模型 (只加载一次) ==========
    let detector = match YoloDetector::new(&config.model_path, config.inference_size) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!("❌ 模型加载失败 ({}): {:#}", config.model_path.display(), e);
            std::process::exit(1);
        }
    };

    tracing::info!("🧠 检测器: {}", detector.summary());

    let alarm = SharedAlarm::for_sound(&config.alarm_sound);
    let parts = PipelineParts {
        camera: Arc::new(FfmpegCameraOpener::new(
            config.record_width,
            config.record_height,
            config.camera_open_timeout(),
        )),
        detector: shared(detector),
        notifier: Arc::from(notifier::from_token(config.pushbullet_token.as_deref())),
        alarm: Arc::new(alarm.clone()),
        sinks: Arc::new(AviSinkFactory),
        annotator: Arc::new(Annotator::load(config.font_path.as_deref())),
    };
    let controller = Arc::new(Controller::new(
        parts,
        PipelineSettings::from_config(&config),
    ));

    // ========== 主线程: 预览 + 控制面板 ==========
    let mut window = MonitorWindow::new(
        controller.clone(),
        alarm,
        &config.alarm_sound,
        config.display_interval(),
    )
    .await;

    tracing::info!("✅ 系统就绪, 点击 Activate 开始监控");

    // 关闭窗口时先完成会话清理
    prevent_quit();
    loop {
        if is_quit_requested() || is_key_pressed(KeyCode::Escape) {
            break;
        }
        window.update();
        window.draw();
        window.draw_egui();
        next_frame().await;
    }

    tracing::info!("👋 正在退出...");
    controller.shutdown(Duration::from_secs(5));
}
