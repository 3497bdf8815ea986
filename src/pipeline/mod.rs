/// 监控流水线 (Monitoring Pipeline)
///
/// 两线程架构:
/// - Worker:     采集 → 检测 → 标注 → 警报 → 录像 (工作线程)
/// - Lifecycle:  激活/停用状态机, 拆除完成信号 (界面线程调用)
/// - FrameBuffer: 最新标注帧, 工作线程写、显示线程读
pub mod frame_buffer;
pub mod lifecycle;
mod worker;

pub use frame_buffer::SharedFrameBuffer;
pub use lifecycle::{
    Activation, Controller, ControllerEvent, LifecycleState, PipelineParts, PipelineSettings,
};
