// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/output.rs - 显示表面定义
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
use url::Url;

use crate::{FromUrl, decoder::Detection, error::PipelineError, label::ClassLabels};

/// 一次 tick 交给显示表面的全部内容，坐标均在显示空间
pub struct Overlay<'a> {
  /// 缩放到显示尺寸、未叠加检测框的帧
  pub background: &'a RgbImage,
  /// 叠加了检测框和标签的帧
  pub rendered: &'a RgbImage,
  pub detections: &'a [Detection],
  pub labels: &'a ClassLabels,
}

/// 显示表面：只在一次 tick 中由渲染器写入
pub trait DisplaySurface {
  /// 本帧的显示尺寸，默认与源帧一致
  fn surface_size(&self, source_w: u32, source_h: u32) -> (u32, u32);

  fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), OutputError>;
}

/// 在显示尺寸的帧上叠加检测结果
pub trait Render {
  fn render_overlay(
    &self,
    background: &RgbImage,
    detections: &[Detection],
    labels: &ClassLabels,
  ) -> RgbImage;
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::SaveImageFileOutput;

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::DirectoryRecordOutput;

#[cfg(feature = "gstreamer_output")]
mod gstreamer_display;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_display::GStreamerDisplay;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 错误: {0}")]
  GStreamerError(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl From<OutputError> for PipelineError {
  fn from(err: OutputError) -> Self {
    PipelineError::render_surface("显示表面不可用", err)
  }
}

/// 从 URL 查询参数中读取可选的显示尺寸
pub(crate) fn query_size(url: &Url) -> Option<(u32, u32)> {
  let get = |key: &str| {
    url
      .query_pairs()
      .find(|(k, _)| k == key)
      .and_then(|(_, v)| v.parse::<u32>().ok())
      .filter(|&v| v > 0)
  };
  Some((get("width")?, get("height")?))
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
  #[cfg(feature = "gstreamer_output")]
  GStreamerDisplay(GStreamerDisplay),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(any(
      feature = "save_image_file",
      feature = "directory_record",
      feature = "gstreamer_output"
    ))]
    use crate::FromUrlWithScheme;

    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => Ok(OutputWrapper::SaveImageFileOutput(
        SaveImageFileOutput::from_url(url)?,
      )),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecordOutput(
        DirectoryRecordOutput::from_url(url)?,
      )),
      #[cfg(feature = "gstreamer_output")]
      GStreamerDisplay::SCHEME => Ok(OutputWrapper::GStreamerDisplay(GStreamerDisplay::from_url(
        url,
      )?)),
      other => Err(OutputError::SchemeMismatch(format!(
        "不支持的输出方案: {}",
        other
      ))),
    }
  }
}

impl DisplaySurface for OutputWrapper {
  fn surface_size(&self, source_w: u32, source_h: u32) -> (u32, u32) {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.surface_size(source_w, source_h),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.surface_size(source_w, source_h),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output.surface_size(source_w, source_h),
    }
  }

  fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), OutputError> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.present(overlay),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.present(overlay),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output.present(overlay),
    }
  }
}
