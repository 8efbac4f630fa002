// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{DisplaySurface, OutputError, Overlay, query_size},
};

/// 每个 tick 覆盖写同一个文件，适合单张图片调试
pub struct SaveImageFileOutput {
  path: PathBuf,
  size: Option<(u32, u32)>,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = OutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
      size: query_size(uri),
    })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      size: None,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl DisplaySurface for SaveImageFileOutput {
  fn surface_size(&self, source_w: u32, source_h: u32) -> (u32, u32) {
    self.size.unwrap_or((source_w, source_h))
  }

  fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), OutputError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    overlay.rendered.save(&self.path)?;
    debug!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;
  use crate::label::ClassLabels;

  #[test]
  fn from_url_reads_path_and_size() {
    let url = Url::parse("image:///tmp/out.png?width=800&height=600").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), Path::new("/tmp/out.png"));
    assert_eq!(output.surface_size(640, 480), (800, 600));

    let url = Url::parse("image:///tmp/out.png").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.surface_size(640, 480), (640, 480));
  }

  #[test]
  fn present_writes_rendered_frame() {
    let dir = std::env::temp_dir().join(format!("qiaoshi-save-{}", std::process::id()));
    let path = dir.join("nested").join("out.png");
    let mut output = SaveImageFileOutput::new(&path);

    let background = RgbImage::new(8, 6);
    let rendered = RgbImage::from_pixel(8, 6, image::Rgb([1, 2, 3]));
    let labels = ClassLabels::default();
    output
      .present(&Overlay {
        background: &background,
        rendered: &rendered,
        detections: &[],
        labels: &labels,
      })
      .unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.get_pixel(0, 0).0, [1, 2, 3]);
    std::fs::remove_dir_all(&dir).ok();
  }
}
