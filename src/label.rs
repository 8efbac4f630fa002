// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/label.rs - 类别标签表
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

use std::{borrow::Cow, path::Path};

use crate::error::PipelineError;

/// 默认模型只有一个类别
pub const DEFAULT_CLASS_NAMES: [&str; 1] = ["Puente"];

/// 有序的类别名称表，按类别索引寻址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
  names: Vec<String>,
}

impl Default for ClassLabels {
  fn default() -> Self {
    Self::new(DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect())
  }
}

impl ClassLabels {
  pub fn new(names: Vec<String>) -> Self {
    Self { names }
  }

  /// 从 JSON 字符串数组文件加载，例如 `["person", "bicycle"]`
  pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
      PipelineError::invalid_config(format!("无法读取标签文件 {}: {}", path.display(), e))
    })?;
    Self::from_json_str(&text)
  }

  pub fn from_json_str(text: &str) -> Result<Self, PipelineError> {
    let names: Vec<String> = serde_json::from_str(text)
      .map_err(|e| PipelineError::invalid_config(format!("标签文件格式错误: {}", e)))?;
    Ok(Self::new(names))
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// 类别名称；越界时退回到原始整数
  pub fn label(&self, class_index: i64) -> Cow<'_, str> {
    usize::try_from(class_index)
      .ok()
      .and_then(|i| self.names.get(i))
      .map(|name| Cow::Borrowed(name.as_str()))
      .unwrap_or_else(|| Cow::Owned(class_index.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_index_maps_to_name() {
    let labels = ClassLabels::default();
    assert_eq!(labels.label(0), "Puente");
  }

  #[test]
  fn out_of_range_falls_back_to_integer() {
    let labels = ClassLabels::default();
    assert_eq!(labels.label(3), "3");
    assert_eq!(labels.label(-1), "-1");
  }

  #[test]
  fn loads_json_array() {
    let labels = ClassLabels::from_json_str(r#"["person", "bicycle", "car"]"#).unwrap();
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.label(2), "car");
  }

  #[test]
  fn rejects_non_array_json() {
    assert!(ClassLabels::from_json_str(r#"{"0": "person"}"#).is_err());
  }
}
