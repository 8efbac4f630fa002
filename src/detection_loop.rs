// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/detection_loop.rs - 检测循环
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

//! # 检测循环
//!
//! 状态机 `Idle → Starting → Running → Idle`，`Starting`/`Running` 出错时进入
//! `Error`。每个 tick 依次执行预处理、推理、解码、渲染，同一时刻最多只有一次
//! 推理在进行。停止是协作式的：运行标志在 tick 开始时和推理返回后各检查一次。

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use image::{RgbImage, imageops};
use tracing::{debug, error, info, warn};

use crate::{
  config::DetectorConfig,
  decoder::{DecodeOptions, Detection, RawDetectionBuffer, ROW_STRIDE, Surfaces, decode},
  error::PipelineError,
  input::{Camera, CameraRequest, InputError, VideoSource},
  model::{ModelLoader, infer},
  output::{DisplaySurface, Overlay, Render},
  preprocess::Preprocessor,
};

const SAMPLE_LOG_INTERVAL: Duration = Duration::from_secs(2);
const SAMPLE_ROWS: usize = 2;
pub const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Idle,
  Starting,
  Running,
  Error,
}

/// 开始/停止按钮是否可用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
  pub start_enabled: bool,
  pub stop_enabled: bool,
}

impl LoopState {
  pub fn controls(self) -> Controls {
    match self {
      LoopState::Idle | LoopState::Error => Controls {
        start_enabled: true,
        stop_enabled: false,
      },
      LoopState::Starting | LoopState::Running => Controls {
        start_enabled: false,
        stop_enabled: true,
      },
    }
  }
}

/// 状态与错误文本的接收者
pub trait StatusSink {
  fn status(&mut self, message: &str);

  fn error(&mut self, error: &PipelineError) {
    self.status(&error.status_text());
  }
}

/// 把状态写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
  fn status(&mut self, message: &str) {
    info!("{}", message);
  }

  fn error(&mut self, error: &PipelineError) {
    error!("{}", error.status_text());
  }
}

/// 运行标志的句柄，可以在信号处理函数中停止循环
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
  pub fn stop(&self) {
    self.0.store(false, Ordering::SeqCst);
  }

  pub fn is_running(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
  /// 循环未运行，或本次 tick 中被停止
  Stopped,
  /// 摄像头还没有有效帧
  Waiting,
  /// 已渲染，附带检测数量
  Rendered(usize),
  /// 出错，循环进入 `Error`
  Failed,
}

/// 按固定帧率节拍调用 tick，尽力而为
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
  frame_duration: Duration,
}

impl Default for FramePacer {
  fn default() -> Self {
    Self::new(DEFAULT_FPS)
  }
}

impl FramePacer {
  pub fn new(fps: f64) -> Self {
    let frame_duration = if fps.is_finite() && fps > 0.0 {
      Duration::from_secs_f64(1.0 / fps)
    } else {
      Duration::ZERO
    };
    Self { frame_duration }
  }

  pub fn frame_duration(&self) -> Duration {
    self.frame_duration
  }

  /// 从 `started` 算起，等待到本帧结束
  pub fn wait(&self, started: Instant) {
    if let Some(remaining) = self.frame_duration.checked_sub(started.elapsed()) {
      thread::sleep(remaining);
    }
  }
}

/// 跨 tick 保存的全部状态
pub struct PipelineContext<E, S> {
  engine: Option<E>,
  stream: Option<S>,
  running: Arc<AtomicBool>,
  last_sample: Option<Instant>,
}

impl<E, S> Default for PipelineContext<E, S> {
  fn default() -> Self {
    Self {
      engine: None,
      stream: None,
      running: Arc::new(AtomicBool::new(false)),
      last_sample: None,
    }
  }
}

impl<E, S> PipelineContext<E, S> {
  fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  fn set_running(&self, running: bool) {
    self.running.store(running, Ordering::SeqCst);
  }

  /// 释放摄像头，推理会话保留复用
  fn release_camera(&mut self) {
    if self.stream.take().is_some() {
      debug!("释放摄像头");
    }
  }
}

pub struct DetectionLoop<L, C, D, R, S = TracingStatus>
where
  L: ModelLoader,
  C: Camera,
{
  config: DetectorConfig,
  preprocessor: Preprocessor,
  loader: L,
  camera: C,
  surface: D,
  renderer: R,
  status: S,
  state: LoopState,
  context: PipelineContext<L::Engine, C::Stream>,
  last_error: Option<PipelineError>,
}

impl<L, C, D, R> DetectionLoop<L, C, D, R, TracingStatus>
where
  L: ModelLoader,
  C: Camera,
  D: DisplaySurface,
  R: Render,
{
  pub fn new(config: DetectorConfig, loader: L, camera: C, surface: D, renderer: R) -> Self {
    Self {
      preprocessor: Preprocessor::new(config.target_size),
      config,
      loader,
      camera,
      surface,
      renderer,
      status: TracingStatus,
      state: LoopState::Idle,
      context: PipelineContext::default(),
      last_error: None,
    }
  }
}

impl<L, C, D, R, S> DetectionLoop<L, C, D, R, S>
where
  L: ModelLoader,
  C: Camera,
  D: DisplaySurface,
  R: Render,
  S: StatusSink,
{
  pub fn with_status_sink<T: StatusSink>(self, status: T) -> DetectionLoop<L, C, D, R, T> {
    DetectionLoop {
      config: self.config,
      preprocessor: self.preprocessor,
      loader: self.loader,
      camera: self.camera,
      surface: self.surface,
      renderer: self.renderer,
      status,
      state: self.state,
      context: self.context,
      last_error: self.last_error,
    }
  }

  pub fn state(&self) -> LoopState {
    self.state
  }

  pub fn controls(&self) -> Controls {
    self.state.controls()
  }

  pub fn stop_handle(&self) -> StopHandle {
    StopHandle(Arc::clone(&self.context.running))
  }

  pub fn status_sink(&self) -> &S {
    &self.status
  }

  pub fn surface(&self) -> &D {
    &self.surface
  }

  pub fn has_camera(&self) -> bool {
    self.context.stream.is_some()
  }

  /// 最近一次导致进入 `Error` 的错误
  pub fn take_error(&mut self) -> Option<PipelineError> {
    self.last_error.take()
  }

  /// 启动检测；在 `Starting`/`Running` 时重复调用无效果
  pub fn start(&mut self) -> LoopState {
    if matches!(self.state, LoopState::Starting | LoopState::Running) {
      return self.state;
    }

    self.state = LoopState::Starting;
    self.last_error = None;
    self.status.status("正在启动检测...");
    self.context.set_running(true);

    if let Err(e) = self.acquire() {
      self.on_error(e);
      return self.state;
    }

    // 加载模型或打开摄像头期间可能已收到停止请求
    if !self.context.is_running() {
      self.stop();
      return self.state;
    }

    self.state = LoopState::Running;
    self.status.status("检测运行中");
    self.state
  }

  fn acquire(&mut self) -> Result<(), PipelineError> {
    if self.context.engine.is_none() {
      info!("加载推理模型...");
      self.context.engine = Some(self.loader.load()?);
    }

    let stream = self.camera.acquire(&CameraRequest::default())?;
    self.context.stream = Some(stream);
    Ok(())
  }

  /// 停止检测并释放摄像头；可重复调用
  pub fn stop(&mut self) {
    self.context.set_running(false);
    self.context.release_camera();
    if matches!(self.state, LoopState::Starting | LoopState::Running) {
      self.state = LoopState::Idle;
      self.status.status("检测已停止");
    }
  }

  /// 任何错误都终止本次运行：报告、释放摄像头、重新允许启动
  pub fn on_error(&mut self, error: PipelineError) {
    warn!("检测循环出错, 进入 Error 状态");
    self.status.error(&error);
    self.context.set_running(false);
    self.context.release_camera();
    self.state = LoopState::Error;
    self.last_error = Some(error);
  }

  pub fn tick(&mut self) -> TickOutcome {
    match self.try_tick() {
      Ok(outcome) => outcome,
      Err(e) => {
        self.on_error(e);
        TickOutcome::Failed
      }
    }
  }

  fn try_tick(&mut self) -> Result<TickOutcome, PipelineError> {
    if self.state != LoopState::Running {
      return Ok(TickOutcome::Stopped);
    }
    if !self.context.is_running() {
      self.stop();
      return Ok(TickOutcome::Stopped);
    }

    let Some(stream) = self.context.stream.as_mut() else {
      return Err(PipelineError::ResourceUnavailable {
        message: "摄像头未就绪".to_string(),
        source: None,
      });
    };
    let frame = match stream.current_frame() {
      Ok(Some(frame)) => frame,
      Ok(None) => return Ok(TickOutcome::Waiting),
      Err(InputError::EndOfStream) => {
        info!("视频流已结束");
        self.stop();
        return Ok(TickOutcome::Stopped);
      }
      Err(e) => return Err(e.into()),
    };

    let (source_w, source_h) = frame.dimensions();
    if source_w == 0 || source_h == 0 {
      return Ok(TickOutcome::Waiting);
    }

    let (tensor, transform) = self.preprocessor.preprocess(&frame)?;

    let Some(engine) = self.context.engine.as_mut() else {
      return Err(PipelineError::InferenceFailure {
        message: "推理会话未创建".to_string(),
        source: None,
      });
    };
    let buffer = infer(engine, &tensor)?;

    // 推理期间可能已经停止，此时丢弃结果
    if !self.context.is_running() {
      debug!("推理完成时检测已停止, 丢弃结果");
      self.stop();
      return Ok(TickOutcome::Stopped);
    }
    self.log_sample(&buffer);

    let (display_w, display_h) = self.surface.surface_size(source_w, source_h);
    if display_w == 0 || display_h == 0 {
      return Err(PipelineError::RenderSurfaceUnavailable {
        message: format!("显示尺寸无效: {}x{}", display_w, display_h),
        source: None,
      });
    }

    let detections = decode(
      &buffer,
      &transform,
      Surfaces {
        source_w,
        source_h,
        display_w,
        display_h,
      },
      &DecodeOptions {
        target_size: self.config.target_size,
        confidence_threshold: self.config.confidence_threshold,
        coordinate_space: self.config.coordinate_space,
      },
    );
    self.present(&frame, &detections, display_w, display_h)?;

    debug!("本帧检测到 {} 个目标", detections.len());
    Ok(TickOutcome::Rendered(detections.len()))
  }

  fn present(
    &mut self,
    frame: &RgbImage,
    detections: &[Detection],
    display_w: u32,
    display_h: u32,
  ) -> Result<(), PipelineError> {
    let resized;
    let background = if frame.dimensions() == (display_w, display_h) {
      frame
    } else {
      resized = imageops::resize(frame, display_w, display_h, imageops::FilterType::Triangle);
      &resized
    };

    let rendered = self
      .renderer
      .render_overlay(background, detections, &self.config.labels);
    self.surface.present(&Overlay {
      background,
      rendered: &rendered,
      detections,
      labels: &self.config.labels,
    })?;
    Ok(())
  }

  fn log_sample(&mut self, buffer: &RawDetectionBuffer) {
    let now = Instant::now();
    let due = self
      .context
      .last_sample
      .is_none_or(|last| now.duration_since(last) >= SAMPLE_LOG_INTERVAL);
    if due {
      self.context.last_sample = Some(now);
      debug!("模型输出样本: {:?}", &buffer.as_slice()[..SAMPLE_ROWS * ROW_STRIDE]);
    }
  }

  /// 按节拍反复执行 tick，直到停止、出错或处理完 `max_frames` 帧
  ///
  /// 返回渲染的帧数。
  pub fn run_until_stopped(&mut self, pacer: &FramePacer, max_frames: Option<usize>) -> usize {
    let mut rendered = 0usize;
    while self.state == LoopState::Running {
      let started = Instant::now();
      match self.tick() {
        TickOutcome::Rendered(count) => {
          rendered += 1;
          debug!("第 {} 帧完成, {} 个目标, 耗时 {:.2?}", rendered, count, started.elapsed());
        }
        TickOutcome::Waiting => {}
        TickOutcome::Stopped | TickOutcome::Failed => break,
      }

      if max_frames.is_some_and(|n| rendered >= n) {
        info!("达到指定帧数 {}, 停止检测", rendered);
        self.stop();
        break;
      }
      pacer.wait(started);
    }
    rendered
  }
}
