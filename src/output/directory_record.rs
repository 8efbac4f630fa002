// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

//! 按日期分目录保存每一帧：`folder:///data/frames?record=name&always`
//!
//! - 不带 `record` 时保存叠加了检测框的帧
//! - `record=name` / `record=id` 保存原始帧，并在同名 `.txt` 中逐行写
//!   `标签, 置信度, x1, y1, x2, y2`
//! - 默认只保存有检测结果的帧，带 `always` 时每帧都保存

use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decoder::Detection,
  label::ClassLabels,
  output::{DisplaySurface, OutputError, Overlay, query_size},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordMode {
  Draw,
  Record { label_with_name: bool },
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  frame_counter: u16,
  always: bool,
  size: Option<(u32, u32)>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = OutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(uri.scheme().to_string()));
    }

    let mode = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| RecordMode::Record {
        label_with_name: v != "id",
      })
      .unwrap_or(RecordMode::Draw);
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      mode,
      frame_counter: 0,
      always,
      size: query_size(uri),
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&mut self) -> Result<PathBuf, OutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    let id = self.frame_id();
    Ok(directory.join(format!("{}-{:04X}.png", now.format("%H-%M-%S"), id)))
  }
}

fn record_lines(detections: &[Detection], labels: &ClassLabels, label_with_name: bool) -> String {
  detections
    .iter()
    .map(|det| {
      let name = if label_with_name {
        labels.label(det.class_index).into_owned()
      } else {
        det.class_index.to_string()
      };
      format!(
        "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        name, det.score, det.x1, det.y1, det.x2, det.y2
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn write_record(
  path: &Path,
  detections: &[Detection],
  labels: &ClassLabels,
  label_with_name: bool,
) -> Result<(), std::io::Error> {
  std::fs::write(
    path.with_extension("txt"),
    record_lines(detections, labels, label_with_name),
  )
}

impl DisplaySurface for DirectoryRecordOutput {
  fn surface_size(&self, source_w: u32, source_h: u32) -> (u32, u32) {
    self.size.unwrap_or((source_w, source_h))
  }

  fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), OutputError> {
    if !self.always && overlay.detections.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;
    match self.mode {
      RecordMode::Draw => overlay.rendered.save(&path)?,
      RecordMode::Record { label_with_name } => {
        overlay.background.save(&path)?;
        write_record(&path, overlay.detections, overlay.labels, label_with_name)?;
      }
    }
    debug!("记录帧: {}", path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;

  fn detection() -> Detection {
    Detection {
      x1: 10.0,
      y1: 20.0,
      x2: 30.5,
      y2: 40.25,
      score: 0.875,
      class_index: 0,
    }
  }

  #[test]
  fn from_url_parses_record_mode() {
    let url = Url::parse("folder:///tmp/frames?record=id&always").unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(
      output.mode,
      RecordMode::Record {
        label_with_name: false
      }
    );
    assert!(output.always);

    let url = Url::parse("folder:///tmp/frames").unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.mode, RecordMode::Draw);
    assert!(!output.always);
  }

  #[test]
  fn record_lines_use_label_or_id() {
    let labels = ClassLabels::default();
    assert_eq!(
      record_lines(&[detection()], &labels, true),
      "Puente, 0.8750, 10.0000, 20.0000, 30.5000, 40.2500"
    );
    assert_eq!(
      record_lines(&[detection()], &labels, false),
      "0, 0.8750, 10.0000, 20.0000, 30.5000, 40.2500"
    );
  }

  #[test]
  fn frame_counter_wraps() {
    let url = Url::parse("folder:///tmp/frames").unwrap();
    let mut output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.frame_counter = u16::MAX;
    assert_eq!(output.frame_id(), 0);
    assert_eq!(output.frame_id(), 1);
  }

  #[test]
  fn empty_frames_are_skipped_unless_always() {
    let dir = std::env::temp_dir().join(format!("qiaoshi-record-{}", std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    let url = Url::parse(&format!("folder://{}", dir.display())).unwrap();
    let mut output = DirectoryRecordOutput::from_url(&url).unwrap();

    let image = RgbImage::new(4, 4);
    let labels = ClassLabels::default();
    let overlay = Overlay {
      background: &image,
      rendered: &image,
      detections: &[],
      labels: &labels,
    };
    output.present(&overlay).unwrap();
    assert!(!dir.exists());

    let detections = [detection()];
    output.mode = RecordMode::Record {
      label_with_name: true,
    };
    output
      .present(&Overlay {
        detections: &detections,
        ..overlay
      })
      .unwrap();
    assert!(dir.exists());
    std::fs::remove_dir_all(&dir).ok();
  }
}
