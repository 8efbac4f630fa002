// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/config.rs - 检测配置
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

use std::str::FromStr;

use crate::{error::PipelineError, label::ClassLabels};

/// 必须与导出 ONNX 时的 imgsz 一致
pub const DEFAULT_TARGET_SIZE: u32 = 512;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// 模型输出框坐标的约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSpace {
  /// `x2 <= 1.5 && y2 <= 1.5` 时按归一化处理，否则按像素处理
  #[default]
  Auto,
  /// `[0, 1]` 归一化坐标
  Normalized,
  /// 信箱正方形内的像素坐标
  Pixel,
}

impl FromStr for CoordinateSpace {
  type Err = PipelineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "auto" => Ok(CoordinateSpace::Auto),
      "normalized" => Ok(CoordinateSpace::Normalized),
      "pixel" => Ok(CoordinateSpace::Pixel),
      other => Err(PipelineError::invalid_config(format!(
        "未知的坐标约定: {}（可选 auto, normalized, pixel）",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
  pub target_size: u32,
  pub confidence_threshold: f32,
  pub labels: ClassLabels,
  pub coordinate_space: CoordinateSpace,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      target_size: DEFAULT_TARGET_SIZE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      labels: ClassLabels::default(),
      coordinate_space: CoordinateSpace::default(),
    }
  }
}

impl DetectorConfig {
  pub fn with_target_size(mut self, target_size: u32) -> Self {
    self.target_size = target_size;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_labels(mut self, labels: ClassLabels) -> Self {
    self.labels = labels;
    self
  }

  pub fn with_coordinate_space(mut self, coordinate_space: CoordinateSpace) -> Self {
    self.coordinate_space = coordinate_space;
    self
  }

  pub fn validate(self) -> Result<Self, PipelineError> {
    if self.target_size == 0 {
      return Err(PipelineError::invalid_config("目标尺寸必须大于 0"));
    }
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(PipelineError::invalid_config(format!(
        "置信度阈值必须在 0.0 - 1.0 之间, 实际为 {}",
        self.confidence_threshold
      )));
    }
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_exported_model() {
    let config = DetectorConfig::default().validate().unwrap();
    assert_eq!(config.target_size, 512);
    assert_eq!(config.confidence_threshold, 0.25);
    assert_eq!(config.coordinate_space, CoordinateSpace::Auto);
  }

  #[test]
  fn rejects_out_of_range_threshold() {
    assert!(
      DetectorConfig::default()
        .with_confidence_threshold(1.5)
        .validate()
        .is_err()
    );
    assert!(DetectorConfig::default().with_target_size(0).validate().is_err());
  }

  #[test]
  fn parses_coordinate_space() {
    assert_eq!("Pixel".parse::<CoordinateSpace>().unwrap(), CoordinateSpace::Pixel);
    assert_eq!(
      "normalized".parse::<CoordinateSpace>().unwrap(),
      CoordinateSpace::Normalized
    );
    assert!("xywh".parse::<CoordinateSpace>().is_err());
  }
}
