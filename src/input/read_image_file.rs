// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  error::PipelineError,
  input::{Camera, CameraRequest, InputError, VideoSource},
};

/// 把一张静态图片当作摄像头：每一帧都是同一张图
pub struct ImageFileInput {
  path: String,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(ImageFileInput {
      path: url.path().to_string(),
    })
  }
}

impl ImageFileInput {
  pub fn new(path: impl Into<String>) -> Self {
    Self { path: path.into() }
  }

  fn open(&self) -> Result<RgbImage, InputError> {
    let image = ImageReader::open(&self.path)?.decode()?;
    Ok(image.to_rgb8())
  }
}

impl Camera for ImageFileInput {
  type Stream = StillImageStream;

  fn acquire(&mut self, request: &CameraRequest) -> Result<Self::Stream, PipelineError> {
    info!("打开图像文件作为视频源: {} ({:?})", self.path, request.facing);
    let image = self.open()?;
    Ok(StillImageStream::new(image))
  }
}

pub struct StillImageStream {
  image: RgbImage,
}

impl StillImageStream {
  pub fn new(image: RgbImage) -> Self {
    Self { image }
  }
}

impl VideoSource for StillImageStream {
  fn current_frame(&mut self) -> Result<Option<RgbImage>, InputError> {
    let (width, height) = self.image.dimensions();
    if width == 0 || height == 0 {
      return Ok(None);
    }
    Ok(Some(self.image.clone()))
  }
}
