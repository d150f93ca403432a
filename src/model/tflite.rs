// 该文件是 Xiangsu （像素） 项目的一部分。
// src/model/tflite.rs - TFLite 分割模型
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

use thiserror::Error;
use tracing::{debug, error, info};
use tract_core::prelude::{Framework, TypedModel, TypedRunnableModel, tvec};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameError, RGB_CHANNELS, Tensor, TensorShape},
  model::Model,
};

/// 宿主环境中模型文件的固定位置
pub const DEFAULT_MODEL_PATH: &str = "/model_float32.tflite";

const SEGMENTER_NUM_INPUTS: usize = 1;
const SEGMENTER_NUM_OUTPUTS: usize = 1;

#[derive(Error, Debug)]
pub enum TfliteSegmenterError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理引擎错误: {0}")]
  EngineError(String),
  #[error("张量错误: {0}")]
  TensorError(#[from] FrameError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl TfliteSegmenterError {
  fn engine(e: anyhow::Error) -> Self {
    TfliteSegmenterError::EngineError(format!("{e:#}"))
  }
}

pub struct TfliteSegmenterBuilder {
  model_path: PathBuf,
}

impl Default for TfliteSegmenterBuilder {
  fn default() -> Self {
    Self::from_path(DEFAULT_MODEL_PATH)
  }
}

impl FromUrlWithScheme for TfliteSegmenterBuilder {
  const SCHEME: &'static str = "tflite";
}

impl FromUrl for TfliteSegmenterBuilder {
  type Error = TfliteSegmenterError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TfliteSegmenterError::ModelPathError(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(Self::from_path(url.path()))
  }
}

impl TfliteSegmenterBuilder {
  pub fn from_path(path: impl AsRef<Path>) -> Self {
    Self {
      model_path: path.as_ref().to_path_buf(),
    }
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn build(self) -> Result<TfliteSegmenter, TfliteSegmenterError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("解析 TFLite 模型");
    let model: TypedModel = tract_tflite::tflite()
      .model_for_read(&mut model_data.as_slice())
      .map_err(TfliteSegmenterError::engine)?;

    let num_inputs = model.inputs.len();
    let num_outputs = model.outputs.len();
    debug!("模型输入数量: {}", num_inputs);
    debug!("模型输出数量: {}", num_outputs);

    if num_inputs != SEGMENTER_NUM_INPUTS || num_outputs < SEGMENTER_NUM_OUTPUTS {
      error!(
        "预期模型输入数量为 {}, 输出数量至少为 {}, 实际为 {} / {}",
        SEGMENTER_NUM_INPUTS, SEGMENTER_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(TfliteSegmenterError::ModelInvalid(format!(
        "输入/输出数量不符: {} / {}",
        num_inputs, num_outputs
      )));
    }

    let model = model.into_optimized().map_err(TfliteSegmenterError::engine)?;
    let input_shape = {
      let fact = model.input_fact(0).map_err(TfliteSegmenterError::engine)?;
      let dims = fact.shape.as_concrete().ok_or_else(|| {
        TfliteSegmenterError::ModelInvalid("输入张量形状不是固定值".to_string())
      })?;
      nhwc_shape(dims)?
    };
    debug!(
      "模型输入形状: 1x{}x{}x{}",
      input_shape.height, input_shape.width, input_shape.channels
    );

    if input_shape.channels != RGB_CHANNELS {
      return Err(TfliteSegmenterError::ModelInvalid(format!(
        "预期输入通道数为 {}, 实际为 {}",
        RGB_CHANNELS, input_shape.channels
      )));
    }

    let plan = model.into_runnable().map_err(TfliteSegmenterError::engine)?;
    info!("模型加载完成");

    Ok(TfliteSegmenter { plan, input_shape })
  }
}

/// 将 `[1, H, W, C]` 或 `[H, W, C]` 解析为张量形状
fn nhwc_shape(dims: &[usize]) -> Result<TensorShape, TfliteSegmenterError> {
  match dims {
    [1, height, width, channels] | [height, width, channels] => Ok(TensorShape {
      height: *height,
      width: *width,
      channels: *channels,
    }),
    other => Err(TfliteSegmenterError::ModelInvalid(format!(
      "不支持的张量形状: {:?}",
      other
    ))),
  }
}

pub struct TfliteSegmenter {
  plan: TypedRunnableModel<TypedModel>,
  input_shape: TensorShape,
}

impl Model for TfliteSegmenter {
  type Error = TfliteSegmenterError;

  fn input_shape(&self) -> TensorShape {
    self.input_shape
  }

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    let shape = input.shape();
    if shape != self.input_shape {
      return Err(TfliteSegmenterError::ModelInvalid(format!(
        "输入张量形状 {:?} 与模型 {:?} 不符",
        shape, self.input_shape
      )));
    }

    debug!("设置模型输入");
    let tensor = tract_core::prelude::Tensor::from_shape(
      &[1, shape.height, shape.width, shape.channels],
      input.data(),
    )
    .map_err(TfliteSegmenterError::engine)?;

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(TfliteSegmenterError::engine)?;

    debug!("获取模型输出");
    let output = outputs
      .first()
      .ok_or_else(|| TfliteSegmenterError::ModelInvalid("模型没有输出".to_string()))?;
    let output_shape = nhwc_shape(output.shape())?;
    let data = output
      .as_slice::<f32>()
      .map_err(TfliteSegmenterError::engine)?
      .to_vec();

    Ok(Tensor::from_vec(output_shape, data)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_requires_tflite_scheme() {
    let url = Url::parse("tflite:///models/meet.tflite").expect("合法 URL");
    let builder = TfliteSegmenterBuilder::from_url(&url).expect("方案正确");
    assert_eq!(builder.model_path(), Path::new("/models/meet.tflite"));

    let url = Url::parse("onnx:///models/meet.onnx").expect("合法 URL");
    assert!(matches!(
      TfliteSegmenterBuilder::from_url(&url),
      Err(TfliteSegmenterError::ModelPathError(_))
    ));
  }

  #[test]
  fn default_builder_points_at_host_model() {
    let builder = TfliteSegmenterBuilder::default();
    assert_eq!(builder.model_path(), Path::new(DEFAULT_MODEL_PATH));
  }

  #[test]
  fn missing_model_file_is_load_error() {
    let builder = TfliteSegmenterBuilder::from_path("/nonexistent/xiangsu/model.tflite");
    assert!(matches!(
      builder.build(),
      Err(TfliteSegmenterError::ModelLoadError(_))
    ));
  }

  #[test]
  fn nhwc_shape_accepts_batch_one_only() {
    assert_eq!(
      nhwc_shape(&[1, 144, 256, 2]).expect("合法形状"),
      TensorShape {
        height: 144,
        width: 256,
        channels: 2
      }
    );
    assert!(nhwc_shape(&[2, 144, 256, 3]).is_err());
    assert!(nhwc_shape(&[144, 256]).is_err());
  }
}
