// 该文件是 Qiaoshi （桥视） 项目的一部分。
// tests/pipeline.rs - 检测流水线集成测试
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

use image::{Rgb, RgbImage};

use qiaoshi::{
  CoordinateSpace, DetectionLoop, DetectorConfig, LoopState, PipelineError, TickOutcome,
  decoder::{Detection, RAW_BUFFER_LEN},
  error::BoxError,
  frame::InputTensor,
  input::{Camera, CameraRequest, StillImageStream},
  label::ClassLabels,
  model::{InferenceEngine, ModelLoader},
  output::{
    DisplaySurface, OutputError, Overlay, Render,
    draw::{BOX_COLOR, Style, draw_box},
  },
};

struct ReplayEngine(Vec<f32>);

impl InferenceEngine for ReplayEngine {
  fn input_name(&self) -> &str {
    "images"
  }

  fn output_name(&self) -> &str {
    "output0"
  }

  fn run(&mut self, input: &InputTensor) -> Result<Vec<f32>, PipelineError> {
    // 信箱上下的填充区域必须是黑色
    assert_eq!(input.get(0, 0, 0), 0.0);
    assert!((input.get(1, 100, 256) - 1.0).abs() < 1e-3);
    Ok(self.0.clone())
  }
}

struct ReplayLoader(Vec<f32>);

impl ModelLoader for ReplayLoader {
  type Engine = ReplayEngine;

  fn load(&self) -> Result<ReplayEngine, PipelineError> {
    Ok(ReplayEngine(self.0.clone()))
  }
}

struct StillCamera(RgbImage);

impl Camera for StillCamera {
  type Stream = StillImageStream;

  fn acquire(&mut self, _: &CameraRequest) -> Result<StillImageStream, PipelineError> {
    Ok(StillImageStream::new(self.0.clone()))
  }
}

#[derive(Default)]
struct MemorySurface {
  size: Option<(u32, u32)>,
  frames: Vec<(RgbImage, Vec<Detection>)>,
}

impl DisplaySurface for MemorySurface {
  fn surface_size(&self, source_w: u32, source_h: u32) -> (u32, u32) {
    self.size.unwrap_or((source_w, source_h))
  }

  fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), OutputError> {
    self
      .frames
      .push((overlay.rendered.clone(), overlay.detections.to_vec()));
    Ok(())
  }
}

/// 只画框不画字，不依赖字体文件
struct BoxRenderer;

impl Render for BoxRenderer {
  fn render_overlay(
    &self,
    background: &RgbImage,
    detections: &[Detection],
    _: &ClassLabels,
  ) -> RgbImage {
    let mut image = background.clone();
    let style = Style::for_width(image.width());
    for det in detections {
      draw_box(&mut image, det, &style);
    }
    image
  }
}

fn white_frame() -> RgbImage {
  RgbImage::from_pixel(640, 480, Rgb([255, 255, 255]))
}

fn output_with_rows(rows: &[[f32; 6]]) -> Vec<f32> {
  let mut output = vec![0.0; RAW_BUFFER_LEN];
  for (i, row) in rows.iter().enumerate() {
    output[i * 6..i * 6 + 6].copy_from_slice(row);
  }
  output
}

fn build(
  output: Vec<f32>,
  surface: MemorySurface,
  config: DetectorConfig,
) -> DetectionLoop<ReplayLoader, StillCamera, MemorySurface, BoxRenderer> {
  DetectionLoop::new(
    config,
    ReplayLoader(output),
    StillCamera(white_frame()),
    surface,
    BoxRenderer,
  )
}

fn assert_close(actual: f32, expected: f32) {
  assert!(
    (actual - expected).abs() < 0.5,
    "expected {} got {}",
    expected,
    actual
  );
}

#[test]
fn full_frame_box_maps_back_to_source() {
  // 640x480 -> 512: scale 0.8, 512x384, pad (0, 64)
  let output = output_with_rows(&[
    [0.0, 64.0, 512.0, 448.0, 0.92, 0.0],
    [10.0, 10.0, 20.0, 20.0, 0.1, 0.0],
  ]);
  let config = DetectorConfig::default().with_coordinate_space(CoordinateSpace::Pixel);
  let mut detection_loop = build(output, MemorySurface::default(), config);

  assert_eq!(detection_loop.start(), LoopState::Running);
  assert_eq!(detection_loop.tick(), TickOutcome::Rendered(1));

  let (image, detections) = &detection_loop.surface().frames[0];
  assert_eq!(image.dimensions(), (640, 480));
  let det = detections[0];
  assert_close(det.x1, 0.0);
  assert_close(det.y1, 0.0);
  assert_close(det.x2, 640.0);
  assert_close(det.y2, 480.0);
  assert_eq!(det.class_index, 0);
  assert_eq!(image.get_pixel(0, 240).0, BOX_COLOR);
}

#[test]
fn detections_scale_to_display_surface() {
  let output = output_with_rows(&[[0.25, 0.25, 0.75, 0.75, 0.8, 2.6]]);
  let surface = MemorySurface {
    size: Some((1280, 960)),
    ..MemorySurface::default()
  };
  let mut detection_loop = build(output, surface, DetectorConfig::default());

  detection_loop.start();
  assert_eq!(detection_loop.tick(), TickOutcome::Rendered(1));

  let (image, detections) = &detection_loop.surface().frames[0];
  assert_eq!(image.dimensions(), (1280, 960));
  let det = detections[0];
  // 归一化 (128, 128)-(384, 384) -> 源 (160, 80)-(480, 400) -> 显示 x2
  assert_close(det.x1, 320.0);
  assert_close(det.y1, 160.0);
  assert_close(det.x2, 960.0);
  assert_close(det.y2, 800.0);
  assert_eq!(det.class_index, 3);
}

#[test]
fn short_output_stops_with_contract_violation() {
  let mut detection_loop = build(
    vec![0.0; RAW_BUFFER_LEN - 6],
    MemorySurface::default(),
    DetectorConfig::default(),
  );

  detection_loop.start();
  assert_eq!(detection_loop.tick(), TickOutcome::Failed);
  assert_eq!(detection_loop.state(), LoopState::Error);
  assert!(detection_loop.surface().frames.is_empty());
  assert!(detection_loop.controls().start_enabled);

  let err = detection_loop.take_error();
  assert!(matches!(
    err,
    Some(PipelineError::InferenceContractViolation {
      expected: 1800,
      actual: 1794
    })
  ));

  // 出错后可以重新启动
  assert_eq!(detection_loop.start(), LoopState::Running);
}

#[test]
fn errors_keep_their_cause() {
  let cause: BoxError = "device busy".into();
  let err = PipelineError::resource_unavailable("摄像头不可用", cause);
  assert_eq!(err.status_text(), "ResourceUnavailable: 摄像头不可用 - device busy");
}
