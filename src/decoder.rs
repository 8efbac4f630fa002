// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/decoder.rs - 检测输出解码
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

use tracing::debug;

use crate::{
  config::CoordinateSpace,
  error::PipelineError,
  geometry::{LetterboxTransform, Point, invert},
};

/// 模型输出的候选框数量
pub const NUM_CANDIDATES: usize = 300;
/// 每行 `(x1, y1, x2, y2, score, class)`
pub const ROW_STRIDE: usize = 6;
pub const RAW_BUFFER_LEN: usize = NUM_CANDIDATES * ROW_STRIDE;

const NORMALIZED_LIMIT: f32 = 1.5;

/// 推理引擎的原始输出，长度严格为 `300 * 6`
#[derive(Debug, Clone)]
pub struct RawDetectionBuffer {
  data: Box<[f32]>,
}

impl TryFrom<Vec<f32>> for RawDetectionBuffer {
  type Error = PipelineError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != RAW_BUFFER_LEN {
      return Err(PipelineError::InferenceContractViolation {
        expected: RAW_BUFFER_LEN,
        actual: data.len(),
      });
    }
    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl RawDetectionBuffer {
  pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
    self.data.chunks_exact(ROW_STRIDE)
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

/// 显示表面坐标下的检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub score: f32,
  pub class_index: i64,
}

impl Detection {
  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
  pub target_size: u32,
  pub confidence_threshold: f32,
  pub coordinate_space: CoordinateSpace,
}

/// 源帧与显示表面的尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surfaces {
  pub source_w: u32,
  pub source_h: u32,
  pub display_w: u32,
  pub display_h: u32,
}

/// 逐行解码，不做去重（NMS 由推理引擎完成）
pub fn decode(
  buffer: &RawDetectionBuffer,
  transform: &LetterboxTransform,
  surfaces: Surfaces,
  options: &DecodeOptions,
) -> Vec<Detection> {
  let Surfaces {
    source_w,
    source_h,
    display_w,
    display_h,
  } = surfaces;
  let sx = display_w as f32 / source_w as f32;
  let sy = display_h as f32 / source_h as f32;
  let target = options.target_size as f32;

  let mut detections = Vec::new();
  for row in buffer.rows() {
    let (mut x1, mut y1, mut x2, mut y2) = (row[0], row[1], row[2], row[3]);
    let score = row[4];
    let class_index = row[5].round() as i64;

    if score.is_nan() || score < options.confidence_threshold {
      continue;
    }

    let normalized = match options.coordinate_space {
      CoordinateSpace::Auto => x2 <= NORMALIZED_LIMIT && y2 <= NORMALIZED_LIMIT,
      CoordinateSpace::Normalized => true,
      CoordinateSpace::Pixel => false,
    };
    if normalized {
      x1 *= target;
      y1 *= target;
      x2 *= target;
      y2 *= target;
    }

    let p1 = invert(Point::new(x1, y1), transform, source_w, source_h);
    let p2 = invert(Point::new(x2, y2), transform, source_w, source_h);

    detections.push(Detection {
      x1: p1.x.min(p2.x) * sx,
      y1: p1.y.min(p2.y) * sy,
      x2: p1.x.max(p2.x) * sx,
      y2: p1.y.max(p2.y) * sy,
      score,
      class_index,
    });
  }

  debug!("解码得到 {} 个检测结果", detections.len());
  detections
}
