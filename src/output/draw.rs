// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage, imageops};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::{debug, info};

use crate::{decoder::Detection, error::PipelineError, label::ClassLabels, output::Render};

pub const BOX_COLOR: [u8; 3] = [0, 255, 136]; // #00ff88
const BOX_FILL_ALPHA: f32 = 0.15;
const LABEL_BACKGROUND: [u8; 3] = [0, 0, 0];
const LABEL_BACKGROUND_ALPHA: f32 = 0.6;
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];
const LABEL_TEXT_INSET: i32 = 5;

const SYSTEM_FONTS: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

/// 随显示宽度缩放的线宽与字号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
  pub line_width: u32,
  pub font_size: u32,
  pub label_height: u32,
}

impl Style {
  pub fn for_width(width: u32) -> Self {
    let w = width as f32;
    Self {
      line_width: ((w / 300.0).round() as u32).max(2),
      font_size: ((w / 40.0).round() as u32).max(14),
      label_height: ((w / 45.0).round() as u32).max(18),
    }
  }
}

pub struct Draw {
  font: FontArc,
}

impl Draw {
  pub fn new(font: FontArc) -> Self {
    Self { font }
  }

  pub fn from_font_file(path: &Path) -> Result<Self, PipelineError> {
    let data = std::fs::read(path).map_err(|e| {
      PipelineError::render_surface(format!("无法读取字体文件: {}", path.display()), e)
    })?;
    let font = FontArc::try_from_vec(data).map_err(|e| {
      PipelineError::render_surface(format!("无法加载字体文件: {}", path.display()), e)
    })?;
    info!("加载字体: {}", path.display());
    Ok(Self::new(font))
  }

  /// 在常见的系统字体路径中查找第一个可用字体
  pub fn from_system_fonts() -> Result<Self, PipelineError> {
    SYSTEM_FONTS
      .iter()
      .map(Path::new)
      .find(|path| path.is_file())
      .map(Self::from_font_file)
      .unwrap_or_else(|| {
        Err(PipelineError::RenderSurfaceUnavailable {
          message: "找不到可用的系统字体, 请使用 --font 指定".to_string(),
          source: None,
        })
      })
  }

  /// 把当前帧铺满显示表面，再叠加检测框和标签
  pub fn render(
    &self,
    frame: &RgbImage,
    detections: &[Detection],
    labels: &ClassLabels,
    width: u32,
    height: u32,
  ) -> RgbImage {
    let mut surface = if frame.dimensions() == (width, height) {
      frame.clone()
    } else {
      imageops::resize(frame, width, height, imageops::FilterType::Triangle)
    };

    let style = Style::for_width(width);
    for det in detections {
      draw_box(&mut surface, det, &style);
      let label = format!(
        "{} {}%",
        labels.label(det.class_index),
        (det.score * 100.0).round() as i64
      );
      self.draw_label(&mut surface, det, &label, &style);
    }

    debug!("绘制 {} 个检测框", detections.len());
    surface
  }

  fn draw_label(&self, image: &mut RgbImage, det: &Detection, label: &str, style: &Style) {
    let scale = PxScale::from(style.font_size as f32);
    let (text_w, text_h) = text_size(scale, &self.font, label);

    let (x, label_y, label_w, label_h) = label_rect(det, text_w, style);
    blend_rect(
      image,
      x,
      label_y,
      label_w,
      label_h,
      LABEL_BACKGROUND,
      LABEL_BACKGROUND_ALPHA,
    );

    let text_y = label_y + (label_h - text_h as i32).max(0) / 2;
    draw_text_mut(
      image,
      Rgb(LABEL_TEXT_COLOR),
      x + LABEL_TEXT_INSET,
      text_y,
      scale,
      &self.font,
      label,
    );
  }
}

impl Render for Draw {
  fn render_overlay(
    &self,
    background: &RgbImage,
    detections: &[Detection],
    labels: &ClassLabels,
  ) -> RgbImage {
    let (width, height) = background.dimensions();
    self.render(background, detections, labels, width, height)
  }
}

/// 标签背景的 `(x, y, w, h)`，位于框的上方，左边与框对齐
pub fn label_rect(det: &Detection, text_w: u32, style: &Style) -> (i32, i32, i32, i32) {
  let label_h = style.label_height as i32;
  // 框贴着上边缘时标签压在框内
  let y = (det.y1.round() as i32 - label_h).max(0);
  (
    det.x1.round() as i32,
    y,
    text_w as i32 + 2 * LABEL_TEXT_INSET,
    label_h,
  )
}

/// 半透明填充加描边
pub fn draw_box(image: &mut RgbImage, det: &Detection, style: &Style) {
  let x = det.x1.round() as i32;
  let y = det.y1.round() as i32;
  let w = (det.width().round() as i32).max(1);
  let h = (det.height().round() as i32).max(1);

  blend_rect(image, x, y, w, h, BOX_COLOR, BOX_FILL_ALPHA);

  // 描边以路径为中心，向内外各延伸一半线宽
  let line = style.line_width as i32;
  for t in 0..line {
    let grow = line / 2 - t;
    let (rw, rh) = (w + 2 * grow, h + 2 * grow);
    if rw <= 0 || rh <= 0 {
      continue;
    }
    let rect = Rect::at(x - grow, y - grow).of_size(rw as u32, rh as u32);
    draw_hollow_rect_mut(image, rect, Rgb(BOX_COLOR));
  }
}

/// 以 `alpha` 不透明度把颜色混合到矩形区域，超出图像的部分被裁掉
pub fn blend_rect(image: &mut RgbImage, x: i32, y: i32, w: i32, h: i32, color: [u8; 3], alpha: f32) {
  let (img_w, img_h) = (image.width() as i32, image.height() as i32);
  let (x0, y0) = (x.max(0), y.max(0));
  let (x1, y1) = ((x + w).min(img_w), (y + h).min(img_h));

  for py in y0..y1 {
    for px in x0..x1 {
      let pixel = image.get_pixel_mut(px as u32, py as u32);
      for c in 0..3 {
        let base = pixel[c] as f32;
        pixel[c] = (base + (color[c] as f32 - base) * alpha).round() as u8;
      }
    }
  }
}
