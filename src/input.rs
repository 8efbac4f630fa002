// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/input.rs - 摄像头/视频输入
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

use image::RgbImage;
use thiserror::Error;

use crate::{FromUrl, error::PipelineError};

/// 摄像头朝向偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
  /// 后置（环境）摄像头
  #[default]
  Environment,
  /// 前置摄像头
  User,
}

/// 摄像头请求：仅视频，不含音频
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraRequest {
  pub facing: Facing,
  pub audio: bool,
}

/// 视频表面：每次读取都返回“当前帧”，不缓存历史帧
pub trait VideoSource {
  /// 当前帧；尚无有效尺寸时返回 `None`
  fn current_frame(&mut self) -> Result<Option<RgbImage>, InputError>;
}

/// 摄像头资源；释放即丢弃返回的流
pub trait Camera {
  type Stream: VideoSource;
  fn acquire(&mut self, request: &CameraRequest) -> Result<Self::Stream, PipelineError>;
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, StillImageStream};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerCamera, GStreamerStream};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 错误: {0}")]
  GStreamerError(String),
  #[error("视频流已结束")]
  EndOfStream,
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl From<InputError> for PipelineError {
  fn from(err: InputError) -> Self {
    let denied = matches!(
      &err,
      InputError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied
    );
    if denied {
      return PipelineError::permission_denied("没有访问摄像头的权限", err);
    }

    match err {
      InputError::SchemeMismatch(message) => PipelineError::unsupported(message),
      other => PipelineError::resource_unavailable("摄像头不可用", other),
    }
  }
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerCamera(GStreamerCamera),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerCamera::SCHEME {
        return Ok(InputWrapper::GStreamerCamera(GStreamerCamera::from_url(url)?));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?));
      }
    }
    Err(InputError::SchemeMismatch(format!(
      "不支持的输入方案: {}",
      url.scheme()
    )))
  }
}

pub enum InputStream {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(StillImageStream),
  #[cfg(feature = "gstreamer_input")]
  GStreamerCamera(GStreamerStream),
}

impl VideoSource for InputStream {
  fn current_frame(&mut self) -> Result<Option<RgbImage>, InputError> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputStream::ReadImageFile(stream) => stream.current_frame(),
      #[cfg(feature = "gstreamer_input")]
      InputStream::GStreamerCamera(stream) => stream.current_frame(),
    }
  }
}

impl Camera for InputWrapper {
  type Stream = InputStream;

  fn acquire(&mut self, request: &CameraRequest) -> Result<Self::Stream, PipelineError> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.acquire(request).map(InputStream::ReadImageFile),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerCamera(input) => {
        input.acquire(request).map(InputStream::GStreamerCamera)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_request_prefers_rear_camera_without_audio() {
    let request = CameraRequest::default();
    assert_eq!(request.facing, Facing::Environment);
    assert!(!request.audio);
  }

  #[test]
  fn permission_errors_keep_their_kind() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: PipelineError = InputError::from(io).into();
    assert!(matches!(err, PipelineError::PermissionDenied { .. }));

    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: PipelineError = InputError::from(io).into();
    assert!(matches!(err, PipelineError::ResourceUnavailable { .. }));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(_))
    ));
  }
}
