// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/preprocess.rs - 帧预处理
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

use image::{ImageBuffer, Pixel, imageops};
use tracing::debug;

use crate::{
  error::PipelineError,
  frame::{InputTensor, RGB_CHANNELS},
  geometry::{LetterboxTransform, compute_letterbox},
};

/// 把任意尺寸的视频帧转换为固定尺寸的模型输入
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
  target_size: u32,
}

impl Preprocessor {
  pub fn new(target_size: u32) -> Self {
    Self { target_size }
  }

  pub fn target_size(&self) -> u32 {
    self.target_size
  }

  /// 信箱缩放并转换为 NCHW 浮点张量
  ///
  /// 帧的像素至少需要三个通道，多余的通道（例如 alpha）被忽略。
  pub fn preprocess<P>(
    &self,
    frame: &ImageBuffer<P, Vec<u8>>,
  ) -> Result<(InputTensor, LetterboxTransform), PipelineError>
  where
    P: Pixel<Subpixel = u8> + 'static,
  {
    let (source_w, source_h) = frame.dimensions();
    if source_w == 0 || source_h == 0 {
      return Err(PipelineError::invalid_config(format!(
        "帧尺寸无效: {}x{}",
        source_w, source_h
      )));
    }
    if (P::CHANNEL_COUNT as usize) < RGB_CHANNELS {
      return Err(PipelineError::invalid_config(format!(
        "像素通道数不足: {}",
        P::CHANNEL_COUNT
      )));
    }

    let size = self.target_size;
    let lb = compute_letterbox(source_w, source_h, size);
    debug!(
      "信箱变换: {}x{} -> {}x{} (缩放 {:.4}, 填充 {}, {})",
      source_w, source_h, lb.padded_width, lb.padded_height, lb.scale, lb.pad_left, lb.pad_top
    );

    // 新建的缓冲区全为 0，即黑色背景
    let mut canvas: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(size, size);
    if (lb.padded_width, lb.padded_height) == (source_w, source_h) {
      imageops::replace(&mut canvas, frame, lb.pad_left as i64, lb.pad_top as i64);
    } else if lb.padded_width > 0 && lb.padded_height > 0 {
      let resized = imageops::resize(
        frame,
        lb.padded_width,
        lb.padded_height,
        imageops::FilterType::Triangle,
      );
      imageops::replace(&mut canvas, &resized, lb.pad_left as i64, lb.pad_top as i64);
    }

    let mut tensor = InputTensor::zeros(size);
    let plane = tensor.plane_len();
    let width = size as usize;
    let data = tensor.as_mut();

    for (x, y, pixel) in canvas.enumerate_pixels() {
      let idx = (y as usize) * width + (x as usize);
      let channels = pixel.channels();
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = channels[c] as f32 / 255.0;
      }
    }

    Ok((tensor, lb))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage, Rgba, RgbaImage};

  #[test]
  fn values_stay_normalized() {
    let frame = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 255]));
    let (tensor, _) = Preprocessor::new(32).preprocess(&frame).unwrap();
    assert!(tensor.as_planar().iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn padding_is_black_and_content_is_planar() {
    // 64x32 -> 16: 16x8, 上下各填充 4 行
    let frame = RgbImage::from_pixel(64, 32, Rgb([255, 0, 51]));
    let (tensor, lb) = Preprocessor::new(16).preprocess(&frame).unwrap();
    assert_eq!((lb.padded_width, lb.padded_height), (16, 8));
    assert_eq!((lb.pad_left, lb.pad_top), (0, 4));

    for c in 0..3 {
      assert_eq!(tensor.get(c, 0, 0), 0.0);
      assert_eq!(tensor.get(c, 15, 15), 0.0);
    }
    assert!((tensor.get(0, 8, 8) - 1.0).abs() < 1e-6);
    assert!(tensor.get(1, 8, 8).abs() < 1e-6);
    assert!((tensor.get(2, 8, 8) - 0.2).abs() < 1e-6);
  }

  #[test]
  fn alpha_channel_is_ignored() {
    let opaque = RgbaImage::from_pixel(10, 10, Rgba([10, 20, 30, 255]));
    let clear = RgbaImage::from_pixel(10, 10, Rgba([10, 20, 30, 0]));
    let pre = Preprocessor::new(10);
    let (a, _) = pre.preprocess(&opaque).unwrap();
    let (b, _) = pre.preprocess(&clear).unwrap();
    assert_eq!(a.as_planar(), b.as_planar());
    assert_eq!(a.as_planar().len(), 3 * 100);
  }

  #[test]
  fn zero_sized_frame_is_rejected() {
    let frame = RgbImage::new(0, 0);
    assert!(Preprocessor::new(16).preprocess(&frame).is_err());
  }
}
