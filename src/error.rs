//! 错误类型 (Error types)

use std::path::PathBuf;

use thiserror::Error;

/// SCAS 核心错误
#[derive(Debug, Error)]
pub enum ScasError {
    /// 所有候选摄像头都无法打开
    #[error("No camera detected (tried indices {tried:?}). Check connection.")]
    DeviceUnavailable { tried: Vec<usize> },

    /// 录像文件创建/写入失败
    #[error("Recorder error for {path}: {reason}")]
    Recorder { path: PathBuf, reason: String },

    /// 配置文件错误
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_unavailable_lists_tried_indices() {
        let err = ScasError::DeviceUnavailable { tried: vec![0, 1] };
        assert_eq!(
            err.to_string(),
            "No camera detected (tried indices [0, 1]). Check connection."
        );
    }
}
