// 该文件是 Qiaoshi （桥视） 项目的一部分。
// src/model.rs - 推理引擎边界
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

use tracing::debug;

use crate::{decoder::RawDetectionBuffer, error::PipelineError, frame::InputTensor};

/// 外部推理引擎
///
/// 输入绑定到模型声明的输入槽，输出取自第一个输出槽，
/// 槽名由加载的模型决定。`run` 阻塞直到推理完成。
pub trait InferenceEngine {
  fn input_name(&self) -> &str;
  fn output_name(&self) -> &str;
  fn run(&mut self, input: &InputTensor) -> Result<Vec<f32>, PipelineError>;
}

/// 延迟创建推理会话，首次启动时调用一次，之后复用
pub trait ModelLoader {
  type Engine: InferenceEngine;
  fn load(&self) -> Result<Self::Engine, PipelineError>;
}

/// 执行推理并检查输出长度
pub fn infer<E: InferenceEngine + ?Sized>(
  engine: &mut E,
  input: &InputTensor,
) -> Result<RawDetectionBuffer, PipelineError> {
  debug!(
    "执行模型推理: {} -> {}",
    engine.input_name(),
    engine.output_name()
  );
  let output = engine.run(input)?;
  RawDetectionBuffer::try_from(output)
}

#[cfg(feature = "onnx_runtime")]
mod onnx;
#[cfg(feature = "onnx_runtime")]
pub use self::onnx::{OnnxEngine, OnnxEngineBuilder};
