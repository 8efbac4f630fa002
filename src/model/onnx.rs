// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
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

use std::path::Path;

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  error::PipelineError,
  frame::InputTensor,
  model::{InferenceEngine, ModelLoader},
};

const DEFAULT_INTRA_THREADS: usize = 4;

pub struct OnnxEngine {
  session: Session,
  input_name: String,
  output_name: String,
}

/// `onnx:///assets/best.onnx?threads=4`
#[derive(Debug, Clone)]
pub struct OnnxEngineBuilder {
  model_path: String,
  intra_threads: usize,
}

impl FromUrlWithScheme for OnnxEngineBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxEngineBuilder {
  type Error = PipelineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(PipelineError::invalid_config(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let intra_threads = url
      .query_pairs()
      .find(|(k, _)| k == "threads")
      .and_then(|(_, v)| v.parse::<usize>().ok())
      .unwrap_or(DEFAULT_INTRA_THREADS);

    Ok(OnnxEngineBuilder {
      model_path: url.path().to_string(),
      intra_threads,
    })
  }
}

impl OnnxEngineBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      intra_threads: DEFAULT_INTRA_THREADS,
    }
  }

  pub fn intra_threads(mut self, intra_threads: usize) -> Self {
    self.intra_threads = intra_threads;
    self
  }

  pub fn build(&self) -> Result<OnnxEngine, PipelineError> {
    info!("加载模型文件: {}", self.model_path);
    if !Path::new(&self.model_path).is_file() {
      error!("模型文件不存在: {}", self.model_path);
      return Err(PipelineError::ModelLoadFailure {
        message: format!("模型文件不存在: {}", self.model_path),
        source: None,
      });
    }

    let session = Session::builder()
      .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
      .and_then(|b| b.with_intra_threads(self.intra_threads))
      .and_then(|b| b.commit_from_file(&self.model_path))
      .map_err(|e| PipelineError::model_load(format!("无法创建会话: {}", self.model_path), e))?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .ok_or_else(|| PipelineError::ModelLoadFailure {
        message: "模型没有声明输入".to_string(),
        source: None,
      })?;
    let output_name = session
      .outputs
      .first()
      .map(|output| output.name.clone())
      .ok_or_else(|| PipelineError::ModelLoadFailure {
        message: "模型没有声明输出".to_string(),
        source: None,
      })?;

    for input in &session.inputs {
      debug!("模型输入: {} {:?}", input.name, input.input_type);
    }
    for output in &session.outputs {
      debug!("模型输出: {} {:?}", output.name, output.output_type);
    }
    info!("ONNX 会话创建完成: 输入 {}, 输出 {}", input_name, output_name);

    Ok(OnnxEngine {
      session,
      input_name,
      output_name,
    })
  }
}

impl ModelLoader for OnnxEngineBuilder {
  type Engine = OnnxEngine;

  fn load(&self) -> Result<Self::Engine, PipelineError> {
    self.build()
  }
}

impl InferenceEngine for OnnxEngine {
  fn input_name(&self) -> &str {
    &self.input_name
  }

  fn output_name(&self) -> &str {
    &self.output_name
  }

  fn run(&mut self, input: &InputTensor) -> Result<Vec<f32>, PipelineError> {
    let tensor = Tensor::from_array((input.shape(), input.as_planar().to_vec()))
      .map_err(|e| PipelineError::inference("无法创建输入张量", e))?;

    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(|e| PipelineError::inference("推理执行失败", e))?;

    let output = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| PipelineError::InferenceFailure {
        message: format!("缺少输出 {}", self.output_name),
        source: None,
      })?;
    let (shape, data) = output
      .try_extract_tensor::<f32>()
      .map_err(|e| PipelineError::inference("无法读取输出张量", e))?;
    debug!("输出形状: {:?}", shape);

    Ok(data.to_vec())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_reads_path_and_threads() {
    let url = Url::parse("onnx:///assets/best.onnx?threads=2").unwrap();
    let builder = OnnxEngineBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/assets/best.onnx");
    assert_eq!(builder.intra_threads, 2);
  }

  #[test]
  fn builder_rejects_other_scheme() {
    let url = Url::parse("tflite:///assets/best.tflite").unwrap();
    assert!(OnnxEngineBuilder::from_url(&url).is_err());
  }

  #[test]
  fn missing_model_is_load_failure() {
    let err = OnnxEngineBuilder::new("/nonexistent/best.onnx")
      .build()
      .err()
      .unwrap();
    assert!(matches!(err, PipelineError::ModelLoadFailure { .. }));
  }
}
