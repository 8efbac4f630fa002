// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use qiaoshi::{
  CoordinateSpace, DetectionLoop, DetectorConfig, FramePacer, FromUrl, LoopState,
  config::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TARGET_SIZE},
  detection_loop::DEFAULT_FPS,
  input::InputWrapper,
  label::ClassLabels,
  model::OnnxEngineBuilder,
  output::{OutputWrapper, draw::Draw},
};

/// Qiaoshi 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径，例如 onnx:///assets/best.onnx?threads=4
  #[arg(long, value_name = "MODEL", default_value = "onnx:///assets/best.onnx")]
  pub model: Url,
  /// 输入来源，例如 gst://camera/dev/video0 或 image:///path/to/frame.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 gst://display、image:///out.png 或 folder:///data/frames
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 模型输入的正方形边长
  #[arg(long, value_name = "SIZE", default_value_t = DEFAULT_TARGET_SIZE)]
  pub target_size: u32,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
  pub confidence: f32,
  /// 类别名称表（JSON 字符串数组）
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,
  /// 模型输出的坐标约定：auto、normalized 或 pixel
  #[arg(long, value_name = "SPACE", default_value = "auto")]
  pub coordinates: CoordinateSpace,
  /// 标签字体（TTF/OTF），缺省时在系统字体中查找
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 刷新帧率
  #[arg(long, value_name = "FPS", default_value_t = DEFAULT_FPS)]
  pub fps: f64,

  #[arg(long, value_name = "FRAME_NUMBER", default_value_t = 0)]
  pub frame_number: usize,
}

impl Args {
  fn detector_config(&self) -> Result<DetectorConfig> {
    let labels = match &self.labels {
      Some(path) => ClassLabels::from_json_file(path)?,
      None => ClassLabels::default(),
    };

    let config = DetectorConfig::default()
      .with_target_size(self.target_size)
      .with_confidence_threshold(self.confidence)
      .with_labels(labels)
      .with_coordinate_space(self.coordinates)
      .validate()?;
    Ok(config)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = args.detector_config()?;
  info!(
    "输入尺寸: {}, 置信度阈值: {}, 坐标约定: {:?}, 类别数: {}",
    config.target_size,
    config.confidence_threshold,
    config.coordinate_space,
    config.labels.len()
  );

  let loader = OnnxEngineBuilder::from_url(&args.model)?;
  let camera = InputWrapper::from_url(&args.input)?;
  let surface = OutputWrapper::from_url(&args.output)?;
  let draw = match &args.font {
    Some(path) => Draw::from_font_file(path)?,
    None => Draw::from_system_fonts()?,
  };

  let mut detection_loop = DetectionLoop::new(config, loader, camera, surface, draw);

  let handle = detection_loop.stop_handle();
  ctrlc::set_handler(move || {
    warn!("收到中断信号，准备退出...");
    handle.stop();
  })?;

  if detection_loop.start() == LoopState::Running {
    let frame_number = (args.frame_number > 0).then_some(args.frame_number);
    let rendered = detection_loop.run_until_stopped(&FramePacer::new(args.fps), frame_number);
    info!("共处理 {} 帧", rendered);
  }
  detection_loop.stop();

  if let Some(e) = detection_loop.take_error() {
    return Err(e.into());
  }

  info!("任务完成，退出");
  Ok(())
}
