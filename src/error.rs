// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/error.rs - 流水线错误定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 检测流水线错误
///
/// 所有错误对当前运行都是终止性的：检测循环进入 `Error` 状态，
/// 释放摄像头，并重新允许启动。
#[derive(Error, Debug)]
pub enum PipelineError {
  /// 运行环境不支持（例如缺少摄像头接口）
  #[error("UnsupportedEnvironment: {message}")]
  UnsupportedEnvironment { message: String },
  /// 摄像头访问被拒绝
  #[error("PermissionDenied: {message}")]
  PermissionDenied {
    message: String,
    #[source]
    source: Option<BoxError>,
  },
  /// 摄像头或其他资源不可用
  #[error("ResourceUnavailable: {message}")]
  ResourceUnavailable {
    message: String,
    #[source]
    source: Option<BoxError>,
  },
  /// 模型加载失败
  #[error("ModelLoadFailure: {message}")]
  ModelLoadFailure {
    message: String,
    #[source]
    source: Option<BoxError>,
  },
  /// 推理输出不符合约定的形状
  #[error("InferenceContractViolation: 期望输出长度 {expected}, 实际长度 {actual}")]
  InferenceContractViolation { expected: usize, actual: usize },
  /// 推理引擎调用失败
  #[error("InferenceFailure: {message}")]
  InferenceFailure {
    message: String,
    #[source]
    source: Option<BoxError>,
  },
  /// 显示表面不可用
  #[error("RenderSurfaceUnavailable: {message}")]
  RenderSurfaceUnavailable {
    message: String,
    #[source]
    source: Option<BoxError>,
  },
  /// 配置无效
  #[error("InvalidConfig: {message}")]
  InvalidConfig { message: String },
}

impl PipelineError {
  pub fn unsupported(message: impl Into<String>) -> Self {
    PipelineError::UnsupportedEnvironment {
      message: message.into(),
    }
  }

  pub fn permission_denied<E: Into<BoxError>>(message: impl Into<String>, source: E) -> Self {
    PipelineError::PermissionDenied {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn resource_unavailable<E: Into<BoxError>>(message: impl Into<String>, source: E) -> Self {
    PipelineError::ResourceUnavailable {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn model_load<E: Into<BoxError>>(message: impl Into<String>, source: E) -> Self {
    PipelineError::ModelLoadFailure {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn inference<E: Into<BoxError>>(message: impl Into<String>, source: E) -> Self {
    PipelineError::InferenceFailure {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn render_surface<E: Into<BoxError>>(message: impl Into<String>, source: E) -> Self {
    PipelineError::RenderSurfaceUnavailable {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn invalid_config(message: impl Into<String>) -> Self {
    PipelineError::InvalidConfig {
      message: message.into(),
    }
  }

  /// 面向用户的状态文本：错误描述加上底层原因
  pub fn status_text(&self) -> String {
    let mut text = self.to_string();
    let mut cause = std::error::Error::source(self);
    while let Some(err) = cause {
      text.push_str(" - ");
      text.push_str(&err.to_string());
      cause = err.source();
    }
    text
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_text_includes_cause_chain() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "best.onnx 不存在");
    let err = PipelineError::model_load("无法加载模型", io);
    let text = err.status_text();
    assert!(text.starts_with("ModelLoadFailure: 无法加载模型"));
    assert!(text.ends_with("best.onnx 不存在"));
  }

  #[test]
  fn contract_violation_reports_lengths() {
    let err = PipelineError::InferenceContractViolation {
      expected: 1800,
      actual: 1794,
    };
    let text = err.status_text();
    assert!(text.contains("1800"));
    assert!(text.contains("1794"));
  }
}
