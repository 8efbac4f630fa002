// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 摄像头输入
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

//! # GStreamer 摄像头输入
//!
//! 通过 `gst://` URL 打开视频源：
//!
//! - `gst://camera/dev/video0?width=640&height=480&fps=30&rotate=90` - V4L2 摄像头
//! - `gst://file/path/to/video.mp4` - 视频文件
//! - `gst://test` - 测试图案
//!
//! appsink 只保留最新的一帧（`max-buffers=1 drop=true`），
//! 每次读取得到的都是“当前帧”，处理不过来的帧直接丢弃。
//!
//! 使用前需要安装 GStreamer 开发库，并启用 `gstreamer_input` 特性。

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  error::PipelineError,
  input::{Camera, CameraRequest, Facing, InputError, VideoSource},
};

const PULL_TIMEOUT_MS: u64 = 5;
const DEFAULT_FPS: u32 = 30;

#[derive(Debug, Clone, PartialEq)]
enum SourceItem {
  Camera {
    device: String,
    width: Option<u32>,
    height: Option<u32>,
    fps: u32,
  },
  File(String),
  Test,
  VideoFlip {
    method: u32,
  },
}

impl SourceItem {
  fn to_pipeline(&self) -> String {
    match self {
      SourceItem::Camera {
        device,
        width,
        height,
        fps,
      } => {
        let mut caps = format!("video/x-raw,framerate={}/1", fps);
        if let Some(width) = width {
          caps.push_str(&format!(",width={}", width));
        }
        if let Some(height) = height {
          caps.push_str(&format!(",height={}", height));
        }
        format!("v4l2src device={} ! videoconvert ! {}", device, caps)
      }
      SourceItem::File(path) => format!("filesrc location={} ! decodebin", path),
      SourceItem::Test => "videotestsrc is-live=true".to_string(),
      SourceItem::VideoFlip { method } => format!("videoflip method={}", method),
    }
  }
}

/// GStreamer 摄像头
#[derive(Debug, Clone)]
pub struct GStreamerCamera {
  items: Vec<SourceItem>,
}

impl FromUrlWithScheme for GStreamerCamera {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerCamera {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let number = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());

    let mut items = Vec::new();
    match url.host_str() {
      Some("camera") => items.push(SourceItem::Camera {
        device: url.path().to_string(),
        width: number("width"),
        height: number("height"),
        fps: number("fps").unwrap_or(DEFAULT_FPS),
      }),
      Some("file") => items.push(SourceItem::File(url.path().to_string())),
      Some("test") => items.push(SourceItem::Test),
      other => {
        return Err(InputError::SchemeMismatch(format!(
          "未知的 GStreamer 源: {:?}",
          other
        )));
      }
    }

    if let Some(method) = video_flip(query.get("rotate").map(String::as_str)) {
      items.push(SourceItem::VideoFlip { method });
    }

    Ok(GStreamerCamera { items })
  }
}

fn video_flip(rotate: Option<&str>) -> Option<u32> {
  match rotate? {
    "90" => Some(1),
    "180" => Some(2),
    "270" => Some(3),
    _ => None,
  }
}

impl GStreamerCamera {
  fn pipeline_description(&self) -> String {
    let source = self
      .items
      .iter()
      .map(SourceItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!(
      "{} ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink max-buffers=1 drop=true sync=false",
      source
    )
  }
}

impl Camera for GStreamerCamera {
  type Stream = GStreamerStream;

  fn acquire(&mut self, request: &CameraRequest) -> Result<Self::Stream, PipelineError> {
    if request.audio {
      warn!("GStreamer 摄像头只提供视频, 忽略音频请求");
    }
    if request.facing != Facing::Environment {
      debug!("V4L2 设备不区分朝向, 使用配置的设备");
    }

    gst::init().map_err(|e| PipelineError::UnsupportedEnvironment {
      message: format!("无法初始化 GStreamer: {}", e),
    })?;

    let description = self.pipeline_description();
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)
      .map_err(|e| PipelineError::resource_unavailable("无法创建摄像头管道", e))?
      .downcast::<gst::Pipeline>()
      .map_err(|_| PipelineError::ResourceUnavailable {
        message: "无法创建摄像头管道".to_string(),
        source: None,
      })?;

    let appsink = pipeline
      .by_name("sink")
      .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
      .ok_or_else(|| PipelineError::ResourceUnavailable {
        message: "无法获取 appsink 元素".to_string(),
        source: None,
      })?;

    pipeline
      .set_state(gst::State::Playing)
      .map_err(|e| PipelineError::resource_unavailable("无法启动摄像头", e))?;

    Ok(GStreamerStream {
      pipeline,
      appsink,
      last: None,
    })
  }
}

/// 摄像头视频流，丢弃时释放设备
pub struct GStreamerStream {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  last: Option<RgbImage>,
}

impl Drop for GStreamerStream {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
    info!("摄像头已释放");
  }
}

impl VideoSource for GStreamerStream {
  fn current_frame(&mut self) -> Result<Option<RgbImage>, InputError> {
    match self
      .appsink
      .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
    {
      Some(sample) => {
        self.last = Some(sample_to_rgb(&sample)?);
      }
      None if self.appsink.is_eos() => return Err(InputError::EndOfStream),
      None => {}
    }
    Ok(self.last.clone())
  }
}

fn sample_to_rgb(sample: &gst::Sample) -> Result<RgbImage, InputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| InputError::GStreamerError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| InputError::GStreamerError("No caps in sample".to_string()))?;
  let info = gst_video::VideoInfo::from_caps(caps)
    .map_err(|e| InputError::GStreamerError(format!("Failed to get video info: {}", e)))?;

  let width = info.width() as usize;
  let height = info.height() as usize;
  let stride = info.stride()[0] as usize;

  let map = buffer
    .map_readable()
    .map_err(|e| InputError::GStreamerError(format!("Failed to map buffer: {}", e)))?;
  let data = map.as_slice();

  let expected = stride * height.saturating_sub(1) + width * 3;
  if data.len() < expected {
    return Err(InputError::GStreamerError(format!(
      "Buffer size mismatch: expected {} bytes, got {} bytes",
      expected,
      data.len()
    )));
  }

  let mut rgb = Vec::with_capacity(width * height * 3);
  for row in 0..height {
    let start = row * stride;
    rgb.extend_from_slice(&data[start..start + width * 3]);
  }

  RgbImage::from_raw(width as u32, height as u32, rgb)
    .ok_or_else(|| InputError::GStreamerError("无法创建 RGB 图像".to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camera_url_builds_v4l2_pipeline() {
    let url = Url::parse("gst://camera/dev/video0?width=640&height=480&fps=15&rotate=180").unwrap();
    let camera = GStreamerCamera::from_url(&url).unwrap();
    let description = camera.pipeline_description();
    assert!(description.starts_with("v4l2src device=/dev/video0"));
    assert!(description.contains("width=640"));
    assert!(description.contains("framerate=15/1"));
    assert!(description.contains("videoflip method=2"));
    assert!(description.ends_with("drop=true sync=false"));
  }

  #[test]
  fn unknown_host_is_rejected() {
    let url = Url::parse("gst://screen/0").unwrap();
    assert!(GStreamerCamera::from_url(&url).is_err());
  }
}
