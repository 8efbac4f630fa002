// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/geometry.rs - 信箱（letterbox）几何变换
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

/// 二维坐标点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 源矩形与正方形目标之间的信箱变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub padded_width: u32,
  pub padded_height: u32,
  pub pad_left: u32,
  pub pad_top: u32,
}

/// 计算把 `source_w x source_h` 放入边长 `target_size` 正方形的信箱变换
///
/// 缩放取两轴比例的最小值，保证源图完整放入目标而不裁剪。
/// 缩放后尺寸四舍五入，填充向下取整，因此对边可能多出一个像素的填充。
pub fn compute_letterbox(source_w: u32, source_h: u32, target_size: u32) -> LetterboxTransform {
  let target = target_size as f32;
  let scale = (target / source_w as f32).min(target / source_h as f32);

  let padded_width = ((source_w as f32 * scale).round() as u32).min(target_size);
  let padded_height = ((source_h as f32 * scale).round() as u32).min(target_size);

  LetterboxTransform {
    scale,
    padded_width,
    padded_height,
    pad_left: (target_size - padded_width) / 2,
    pad_top: (target_size - padded_height) / 2,
  }
}

/// 源图坐标映射到信箱正方形内（预处理时使用的映射）
pub fn forward(point: Point, transform: &LetterboxTransform) -> Point {
  Point {
    x: point.x * transform.scale + transform.pad_left as f32,
    y: point.y * transform.scale + transform.pad_top as f32,
  }
}

/// 信箱正方形坐标映射回源图，并夹紧到 `[0, source_w] x [0, source_h]`
pub fn invert(point: Point, transform: &LetterboxTransform, source_w: u32, source_h: u32) -> Point {
  let x = (point.x - transform.pad_left as f32) / transform.scale;
  let y = (point.y - transform.pad_top as f32) / transform.scale;

  Point {
    x: clamp_axis(x, source_w as f32),
    y: clamp_axis(y, source_h as f32),
  }
}

// f32::clamp 会把 NaN 原样返回
fn clamp_axis(value: f32, max: f32) -> f32 {
  if value.is_nan() {
    0.0
  } else {
    value.clamp(0.0, max)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn letterbox_landscape_640x480_into_512() {
    let lb = compute_letterbox(640, 480, 512);
    assert!((lb.scale - 0.8).abs() < 1e-6);
    assert_eq!(lb.padded_width, 512);
    assert_eq!(lb.padded_height, 384);
    assert_eq!(lb.pad_left, 0);
    assert_eq!(lb.pad_top, 64);
  }

  #[test]
  fn letterbox_portrait_pads_horizontally() {
    let lb = compute_letterbox(480, 640, 512);
    assert_eq!(lb.padded_width, 384);
    assert_eq!(lb.padded_height, 512);
    assert_eq!(lb.pad_left, 64);
    assert_eq!(lb.pad_top, 0);
  }

  #[test]
  fn letterbox_padding_floors_when_odd() {
    // 100x99 -> 512x507, 剩余 5 像素：上方 2，下方 3
    let lb = compute_letterbox(100, 99, 512);
    assert_eq!(lb.padded_width, 512);
    assert_eq!(lb.padded_height, 507);
    assert_eq!(lb.pad_top, 2);
    assert_eq!(512 - lb.padded_height - lb.pad_top, 3);
  }

  #[test]
  fn letterbox_always_fits_and_touches_one_axis() {
    let sizes = [1u32, 3, 7, 64, 99, 320, 480, 511, 512, 640, 1080, 1920, 4000];
    for &target in &[32u32, 320, 512, 640] {
      for &w in &sizes {
        for &h in &sizes {
          let lb = compute_letterbox(w, h, target);
          assert!(lb.padded_width <= target, "{w}x{h} -> {target}");
          assert!(lb.padded_height <= target, "{w}x{h} -> {target}");
          assert!(
            lb.padded_width == target || lb.padded_height == target,
            "{w}x{h} -> {target}: {lb:?}"
          );
          assert!(lb.pad_left + lb.padded_width <= target);
          assert!(lb.pad_top + lb.padded_height <= target);
        }
      }
    }
  }

  #[test]
  fn forward_then_invert_round_trips() {
    let (w, h) = (1280u32, 720u32);
    let lb = compute_letterbox(w, h, 640);
    for &(x, y) in &[(1.0f32, 1.0f32), (640.0, 360.0), (1279.0, 719.0), (17.5, 503.25)] {
      let back = invert(forward(Point::new(x, y), &lb), &lb, w, h);
      assert!((back.x - x).abs() <= 1.0, "x: {} vs {}", back.x, x);
      assert!((back.y - y).abs() <= 1.0, "y: {} vs {}", back.y, y);
    }
  }

  #[test]
  fn invert_clamps_out_of_frame_coordinates() {
    let lb = compute_letterbox(640, 480, 512);
    for &(x, y) in &[
      (-100.0f32, -100.0f32),
      (1e9, 1e9),
      (-1e9, 1e9),
      (0.0, 10.0),
      (600.0, 500.0),
      (f32::NAN, f32::INFINITY),
    ] {
      let p = invert(Point::new(x, y), &lb, 640, 480);
      assert!((0.0..=640.0).contains(&p.x), "{p:?}");
      assert!((0.0..=480.0).contains(&p.y), "{p:?}");
    }
  }

  #[test]
  fn invert_removes_padding_before_scaling() {
    let lb = compute_letterbox(640, 480, 512);
    let p = invert(Point::new(256.0, 256.0), &lb, 640, 480);
    assert!((p.x - 320.0).abs() < 1e-3);
    assert!((p.y - 240.0).abs() < 1e-3);
  }
}
