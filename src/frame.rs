// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/frame.rs - NCHW 输入张量定义
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

use crate::error::PipelineError;

pub const RGB_CHANNELS: usize = 3;

/// 模型输入张量，逻辑形状 `[1, 3, S, S]`，按通道平面存储，取值 `[0, 1]`
#[derive(Debug, Clone)]
pub struct InputTensor {
  size: u32,
  data: Box<[f32]>,
}

impl InputTensor {
  /// 全零张量
  pub fn zeros(size: u32) -> Self {
    let len = RGB_CHANNELS * (size as usize) * (size as usize);
    Self {
      size,
      data: vec![0.0f32; len].into_boxed_slice(),
    }
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size as usize, self.size as usize]
  }

  pub fn plane_len(&self) -> usize {
    (self.size as usize) * (self.size as usize)
  }

  /// 通道 `c` 的连续平面
  pub fn plane(&self, c: usize) -> &[f32] {
    let plane = self.plane_len();
    &self.data[c * plane..(c + 1) * plane]
  }

  pub fn get(&self, c: usize, row: usize, col: usize) -> f32 {
    let s = self.size as usize;
    self.data[c * s * s + row * s + col]
  }

  pub fn as_planar(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}

impl AsMut<[f32]> for InputTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

impl TryFrom<(u32, Vec<f32>)> for InputTensor {
  type Error = PipelineError;

  fn try_from((size, data): (u32, Vec<f32>)) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * (size as usize) * (size as usize);
    if data.len() != expected {
      return Err(PipelineError::invalid_config(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }

    Ok(Self {
      size,
      data: data.into_boxed_slice(),
    })
  }
}
