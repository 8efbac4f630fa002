// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/output/gstreamer_display.rs - GStreamer 窗口显示
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

//! # GStreamer 窗口显示
//!
//! `gst://display?width=1280&height=720&fps=30`
//!
//! 渲染结果经 `appsrc ! videoconvert ! autovideosink` 推送到窗口。
//! 管道在第一帧到来时才创建，帧尺寸变化时更新 caps。
//!
//! - `width` / `height`: 显示尺寸，缺省时与源帧一致
//! - `fps`: 时间戳使用的帧率，默认 30

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{DisplaySurface, OutputError, Overlay, query_size},
};

const DEFAULT_FPS: u64 = 30;
const PIPELINE_DESCRIPTION: &str =
  "appsrc name=src is-live=true ! videoconvert ! autovideosink sync=false";

struct DisplayPipeline {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  dimensions: (u32, u32),
}

pub struct GStreamerDisplay {
  size: Option<(u32, u32)>,
  fps: u64,
  frame_count: u64,
  pipeline: Option<DisplayPipeline>,
}

impl FromUrlWithScheme for GStreamerDisplay {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerDisplay {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("display") {
      return Err(OutputError::SchemeMismatch(url.to_string()));
    }

    let fps = url
      .query_pairs()
      .find(|(k, _)| k == "fps")
      .and_then(|(_, v)| v.parse::<u64>().ok())
      .filter(|&v| v > 0)
      .unwrap_or(DEFAULT_FPS);

    Ok(GStreamerDisplay {
      size: query_size(url),
      fps,
      frame_count: 0,
      pipeline: None,
    })
  }
}

fn gst_error(message: &str, e: impl std::fmt::Display) -> OutputError {
  OutputError::GStreamerError(format!("{}: {}", message, e))
}

fn frame_caps(width: u32, height: u32, fps: u64) -> gst::Caps {
  gst::Caps::builder("video/x-raw")
    .field("format", "RGB")
    .field("width", width as i32)
    .field("height", height as i32)
    .field("framerate", gst::Fraction::new(fps as i32, 1))
    .build()
}

impl DisplayPipeline {
  fn launch(width: u32, height: u32, fps: u64) -> Result<Self, OutputError> {
    gst::init().map_err(|e| gst_error("无法初始化 GStreamer", e))?;

    let pipeline = gst::parse::launch(PIPELINE_DESCRIPTION)
      .map_err(|e| gst_error("无法创建显示管道", e))?
      .downcast::<gst::Pipeline>()
      .map_err(|_| OutputError::GStreamerError("无法创建显示管道".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .and_then(|e| e.downcast::<gst_app::AppSrc>().ok())
      .ok_or_else(|| OutputError::GStreamerError("无法获取 appsrc 元素".to_string()))?;

    appsrc.set_caps(Some(&frame_caps(width, height, fps)));
    appsrc.set_format(gst::Format::Time);

    pipeline
      .set_state(gst::State::Playing)
      .map_err(|e| gst_error("无法启动显示管道", e))?;
    info!("显示窗口已打开: {}x{} @ {} fps", width, height, fps);

    Ok(Self {
      pipeline,
      appsrc,
      dimensions: (width, height),
    })
  }
}

impl Drop for DisplayPipeline {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer display pipeline: {}", e);
    }
  }
}

impl GStreamerDisplay {
  fn pipeline_for(&mut self, width: u32, height: u32) -> Result<&DisplayPipeline, OutputError> {
    match self.pipeline.take() {
      Some(mut pipeline) => {
        if pipeline.dimensions != (width, height) {
          info!("显示尺寸变化: {}x{}", width, height);
          pipeline
            .appsrc
            .set_caps(Some(&frame_caps(width, height, self.fps)));
          pipeline.dimensions = (width, height);
        }
        Ok(self.pipeline.insert(pipeline))
      }
      None => {
        let pipeline = DisplayPipeline::launch(width, height, self.fps)?;
        Ok(self.pipeline.insert(pipeline))
      }
    }
  }
}

impl DisplaySurface for GStreamerDisplay {
  fn surface_size(&self, source_w: u32, source_h: u32) -> (u32, u32) {
    self.size.unwrap_or((source_w, source_h))
  }

  fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), OutputError> {
    let (width, height) = overlay.rendered.dimensions();
    let frame_duration = 1_000_000_000 / self.fps;
    let timestamp = self.frame_count * frame_duration;
    self.frame_count += 1;

    let mut buffer = gst::Buffer::from_slice(overlay.rendered.as_raw().clone());
    if let Some(buffer_ref) = buffer.get_mut() {
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(timestamp));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_duration));
    }

    let pipeline = self.pipeline_for(width, height)?;
    pipeline
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| gst_error("无法推送帧", format!("{:?}", e)))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_url_reads_size_and_fps() {
    let url = Url::parse("gst://display?width=1280&height=720&fps=60").unwrap();
    let display = GStreamerDisplay::from_url(&url).unwrap();
    assert_eq!(display.surface_size(640, 480), (1280, 720));
    assert_eq!(display.fps, 60);
  }

  #[test]
  fn non_display_host_is_rejected() {
    let url = Url::parse("gst://camera/dev/video0").unwrap();
    assert!(GStreamerDisplay::from_url(&url).is_err());
  }
}
