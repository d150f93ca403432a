// 该文件是 Xiangsu （像素） 项目的一部分。
// src/model.rs - 模型
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

use crate::frame::{Tensor, TensorShape};

/// 分割模型：输入 NHWC RGB 浮点张量，输出同尺寸的多通道掩码张量
pub trait Model {
  type Error;

  fn input_shape(&self) -> TensorShape;
  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error>;
}

impl<M: Model + ?Sized> Model for Box<M> {
  type Error = M::Error;

  fn input_shape(&self) -> TensorShape {
    (**self).input_shape()
  }

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    (**self).infer(input)
  }
}

#[cfg(feature = "model_segmentation")]
mod tflite;
#[cfg(feature = "model_segmentation")]
pub use self::tflite::{
  DEFAULT_MODEL_PATH, TfliteSegmenter, TfliteSegmenterBuilder, TfliteSegmenterError,
};
