// 该文件是 Xiangsu （像素） 项目的一部分。
// src/filter/segmentation.rs - 人像分割背景虚化滤镜
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

use std::{fmt::Display, time::Instant};

use image::{
  GrayImage, ImageBuffer, Rgb, Rgba, Rgba32FImage, RgbaImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::{debug, error, trace};

use crate::{
  filter::Filter,
  frame::{FrameError, FrameRef, MAX_HEIGHT, MAX_WIDTH, RGB_CHANNELS, RGBA_CHANNELS, Tensor},
  model::Model,
  timing::StageDurations,
};

/// 9x9 高斯核在 sigma 取 0 时由 OpenCV 推导出的 sigma
const DEFAULT_BLUR_SIGMA: f32 = 1.7;
const DEFAULT_MASK_THRESHOLD: u8 = 0;
const DEFAULT_FOREGROUND_CHANNEL: usize = 1;

#[derive(Error, Debug)]
pub enum SegmentationError {
  #[error("模型尚未加载")]
  ModelNotLoaded,
  #[error("推理错误: {0}")]
  Inference(String),
  #[error("模型输入通道数应为 3, 实际为 {0}")]
  UnsupportedInput(usize),
  #[error("模型输出为空张量")]
  EmptyMask,
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationConfig {
  blur_sigma: f32,
  mask_threshold: u8,
  foreground_channel: usize,
}

impl Default for SegmentationConfig {
  fn default() -> Self {
    Self {
      blur_sigma: DEFAULT_BLUR_SIGMA,
      mask_threshold: DEFAULT_MASK_THRESHOLD,
      foreground_channel: DEFAULT_FOREGROUND_CHANNEL,
    }
  }
}

impl SegmentationConfig {
  /// sigma 不大于 0 时不做模糊，背景直接使用原图
  pub fn with_blur_sigma(mut self, sigma: f32) -> Self {
    self.blur_sigma = sigma;
    self
  }

  /// 掩码值严格大于阈值的像素保留原图，其余使用模糊图
  pub fn with_mask_threshold(mut self, threshold: u8) -> Self {
    self.mask_threshold = threshold;
    self
  }

  pub fn with_foreground_channel(mut self, channel: usize) -> Self {
    self.foreground_channel = channel;
    self
  }

  pub fn blur_sigma(&self) -> f32 {
    self.blur_sigma
  }

  pub fn mask_threshold(&self) -> u8 {
    self.mask_threshold
  }

  pub fn foreground_channel(&self) -> usize {
    self.foreground_channel
  }
}

/// 按掩码合成：`mask > threshold` 处取 `original`，否则取 `blurred`。
///
/// 四个切片均为同一尺寸的图像，`mask` 为单通道，其余为 RGBA。
pub fn composite_by_mask(
  original: &[u8],
  blurred: &[u8],
  mask: &[u8],
  threshold: u8,
  output: &mut [u8],
) {
  for (((dst, src), bg), &m) in output
    .chunks_exact_mut(RGBA_CHANNELS)
    .zip(original.chunks_exact(RGBA_CHANNELS))
    .zip(blurred.chunks_exact(RGBA_CHANNELS))
    .zip(mask)
  {
    if m > threshold {
      dst.copy_from_slice(src);
    } else {
      dst.copy_from_slice(bg);
    }
  }
}

/// 在浮点域做高斯模糊，结果只取整一次，均匀区域（包括不透明的 Alpha）保持不变
pub fn blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
  let (width, height) = image.dimensions();
  let float = Rgba32FImage::from_fn(width, height, |x, y| {
    Rgba(image.get_pixel(x, y).0.map(f32::from))
  });
  let blurred = imageproc::filter::gaussian_blur_f32(&float, sigma);
  RgbaImage::from_fn(width, height, |x, y| {
    Rgba(
      blurred
        .get_pixel(x, y)
        .0
        .map(|v| v.round().clamp(0.0, 255.0) as u8),
    )
  })
}

pub struct Segmentation<M> {
  model: Option<M>,
  config: SegmentationConfig,
  // RGB 浮点暂存区，容量按最大分辨率一次性分配
  scratch: Vec<f32>,
}

impl<M> Default for Segmentation<M> {
  fn default() -> Self {
    Self::new(SegmentationConfig::default())
  }
}

impl<M> Segmentation<M> {
  pub fn new(config: SegmentationConfig) -> Self {
    Self {
      model: None,
      config,
      scratch: Vec::with_capacity(RGB_CHANNELS * MAX_WIDTH as usize * MAX_HEIGHT as usize),
    }
  }

  pub fn with_model(mut self, model: M) -> Self {
    self.model = Some(model);
    self
  }

  /// 替换当前模型，返回旧模型
  pub fn load_model(&mut self, model: M) -> Option<M> {
    self.model.replace(model)
  }

  pub fn has_model(&self) -> bool {
    self.model.is_some()
  }

  pub fn config(&self) -> &SegmentationConfig {
    &self.config
  }

  pub fn config_mut(&mut self) -> &mut SegmentationConfig {
    &mut self.config
  }
}

impl<M: Model> Segmentation<M>
where
  M::Error: Display,
{
  /// RGBA -> RGB, u8 -> f32 (除以 255)，再用 Lanczos 缩放到模型输入尺寸
  fn preprocess(
    scratch: &mut Vec<f32>,
    model: &M,
    input: FrameRef<'_>,
  ) -> Result<Tensor, SegmentationError> {
    let shape = model.input_shape();
    if shape.channels != RGB_CHANNELS {
      return Err(SegmentationError::UnsupportedInput(shape.channels));
    }

    scratch.clear();
    scratch.extend(
      input
        .data()
        .chunks_exact(RGBA_CHANNELS)
        .flat_map(|px| px[..RGB_CHANNELS].iter().map(|&v| v as f32 / 255.0)),
    );

    let rgb: ImageBuffer<Rgb<f32>, &[f32]> =
      ImageBuffer::from_raw(input.width(), input.height(), scratch.as_slice()).ok_or(
        FrameError::LengthMismatch {
          expected: input.size().pixels() * RGB_CHANNELS,
          actual: scratch.len(),
        },
      )?;

    let resized = imageops::resize(
      &rgb,
      shape.width as u32,
      shape.height as u32,
      FilterType::Lanczos3,
    );

    Ok(Tensor::from_vec(shape, resized.into_raw())?)
  }

  /// 取出前景通道，转换为 u8 掩码并用双三次插值缩放到输出尺寸
  fn resize_mask(
    &self,
    mask: &Tensor,
    width: u32,
    height: u32,
  ) -> Result<GrayImage, SegmentationError> {
    let shape = mask.shape();
    if shape.is_empty() {
      return Err(SegmentationError::EmptyMask);
    }

    let channel = self.config.foreground_channel.min(shape.channels - 1);
    let foreground = mask.channel(channel).ok_or(SegmentationError::EmptyMask)?;
    let pixels = foreground
      .iter()
      .map(|p| (p * 255.0).round().clamp(0.0, 255.0) as u8)
      .collect::<Vec<_>>();

    let mask_image = GrayImage::from_raw(shape.width as u32, shape.height as u32, pixels).ok_or(
      FrameError::LengthMismatch {
        expected: shape.width * shape.height,
        actual: foreground.len(),
      },
    )?;

    Ok(imageops::resize(
      &mask_image,
      width,
      height,
      FilterType::CatmullRom,
    ))
  }
}

impl<M: Model> Filter for Segmentation<M>
where
  M::Error: Display,
{
  type Error = SegmentationError;

  fn apply(
    &mut self,
    input: FrameRef<'_>,
    output: &mut [u8],
  ) -> Result<StageDurations, Self::Error> {
    if output.len() != input.data().len() {
      return Err(
        FrameError::LengthMismatch {
          expected: input.data().len(),
          actual: output.len(),
        }
        .into(),
      );
    }

    let Some(model) = self.model.as_ref() else {
      error!("模型尚未加载，无法执行分割");
      return Err(SegmentationError::ModelNotLoaded);
    };

    trace!("exec {}x{}", input.width(), input.height());

    // 前处理
    trace!("start preprocess");
    let start_preprocess = Instant::now();
    let tensor = Self::preprocess(&mut self.scratch, model, input)?;
    let preprocess = start_preprocess.elapsed();
    trace!("preprocessing done.");

    // 推理
    trace!("start inference");
    let start_inference = Instant::now();
    let mask = model.infer(&tensor).map_err(|e| {
      error!("inference error: {}", e);
      SegmentationError::Inference(e.to_string())
    })?;
    let inference = start_inference.elapsed();
    trace!("inference done.");
    debug!("掩码张量形状: {:?}", mask.shape());

    // 后处理
    trace!("start postprocess");
    let start_postprocess = Instant::now();
    let original = input.to_image();
    let blurred = if self.config.blur_sigma > 0.0 {
      blur_rgba(&original, self.config.blur_sigma)
    } else {
      original.clone()
    };
    let mask = self.resize_mask(&mask, input.width(), input.height())?;
    composite_by_mask(
      original.as_raw(),
      blurred.as_raw(),
      mask.as_raw(),
      self.config.mask_threshold,
      output,
    );
    let postprocess = start_postprocess.elapsed();
    trace!("postprocess done.");

    Ok(StageDurations {
      preprocess,
      inference,
      postprocess,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;
  use crate::frame::{FrameSize, TensorShape};

  /// 输出固定前景概率的模型
  struct ConstantModel {
    shape: TensorShape,
    foreground: f32,
    calls: Cell<usize>,
  }

  impl ConstantModel {
    fn new(foreground: f32) -> Self {
      Self {
        shape: TensorShape {
          height: 6,
          width: 8,
          channels: 3,
        },
        foreground,
        calls: Cell::new(0),
      }
    }
  }

  impl Model for ConstantModel {
    type Error = String;

    fn input_shape(&self) -> TensorShape {
      self.shape
    }

    fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
      self.calls.set(self.calls.get() + 1);
      assert_eq!(input.shape(), self.shape);
      let shape = TensorShape {
        channels: 2,
        ..self.shape
      };
      let data = (0..shape.height * shape.width)
        .flat_map(|_| [1.0 - self.foreground, self.foreground])
        .collect();
      Ok(Tensor::from_vec(shape, data).map_err(|e| e.to_string())?)
    }
  }

  struct FailingModel;

  impl Model for FailingModel {
    type Error = String;

    fn input_shape(&self) -> TensorShape {
      TensorShape {
        height: 2,
        width: 2,
        channels: 3,
      }
    }

    fn infer(&self, _input: &Tensor) -> Result<Tensor, Self::Error> {
      Err("invoke failed".to_string())
    }
  }

  fn gradient(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
      .flat_map(|i| {
        let x = i % width;
        let y = i / width;
        [(x * 20) as u8, (y * 30) as u8, ((x + y) * 9) as u8, 255]
      })
      .collect()
  }

  fn run<M: Model>(filter: &mut Segmentation<M>, pixels: &[u8], size: FrameSize) -> Vec<u8>
  where
    M::Error: Display,
  {
    let input = FrameRef::new(size, pixels).expect("长度匹配");
    let mut output = vec![0u8; pixels.len()];
    filter.apply(input, &mut output).expect("分割成功");
    output
  }

  #[test]
  fn foreground_everywhere_keeps_original() {
    let size = FrameSize {
      width: 12,
      height: 9,
    };
    let pixels = gradient(size.width, size.height);
    let mut filter = Segmentation::default().with_model(ConstantModel::new(1.0));
    assert_eq!(run(&mut filter, &pixels, size), pixels);
  }

  #[test]
  fn background_everywhere_is_blurred() {
    let size = FrameSize {
      width: 12,
      height: 9,
    };
    let pixels = gradient(size.width, size.height);
    let mut filter = Segmentation::default().with_model(ConstantModel::new(0.0));
    let output = run(&mut filter, &pixels, size);

    let original = RgbaImage::from_raw(size.width, size.height, pixels.clone()).expect("长度匹配");
    assert_eq!(output, blur_rgba(&original, DEFAULT_BLUR_SIGMA).into_raw());
    assert_ne!(output, pixels);
    assert!(output.chunks_exact(RGBA_CHANNELS).all(|px| px[3] == 255));
  }

  #[test]
  fn uniform_background_survives_the_blur() {
    let size = FrameSize {
      width: 24,
      height: 24,
    };
    let mut filter = Segmentation::default().with_model(ConstantModel::new(0.0));
    for px in [[0, 0, 0, 255], [1, 1, 1, 255], [5, 5, 5, 255], [9, 8, 7, 6], [255; 4]] {
      let pixels = px.repeat(size.pixels());
      assert_eq!(run(&mut filter, &pixels, size), pixels, "{:?}", px);
    }
  }

  #[test]
  fn threshold_decides_between_original_and_blurred() {
    let size = FrameSize {
      width: 10,
      height: 10,
    };
    let pixels = gradient(size.width, size.height);
    // 0.5 * 255 = 127.5 -> 128
    let config = SegmentationConfig::default().with_mask_threshold(128);
    let mut filter = Segmentation::new(config).with_model(ConstantModel::new(0.5));
    let output = run(&mut filter, &pixels, size);
    assert_ne!(output, pixels);

    filter.config_mut().mask_threshold = 127;
    assert_eq!(run(&mut filter, &pixels, size), pixels);
  }

  #[test]
  fn composite_selects_per_pixel() {
    let original = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3];
    let blurred = [9, 9, 9, 9, 8, 8, 8, 8, 7, 7, 7, 7];
    let mask = [255, 10, 11];
    let mut output = [0u8; 12];
    composite_by_mask(&original, &blurred, &mask, 10, &mut output);
    assert_eq!(output, [1, 1, 1, 1, 8, 8, 8, 8, 3, 3, 3, 3]);
  }

  #[test]
  fn exec_is_idempotent() {
    let size = FrameSize {
      width: 16,
      height: 8,
    };
    let pixels = gradient(size.width, size.height);
    let mut filter = Segmentation::default().with_model(ConstantModel::new(0.3));
    let first = run(&mut filter, &pixels, size);
    let second = run(&mut filter, &pixels, size);
    assert_eq!(first, second);
  }

  #[test]
  fn missing_model_is_reported() {
    let pixels = gradient(2, 2);
    let input = FrameRef::new(
      FrameSize {
        width: 2,
        height: 2,
      },
      &pixels,
    )
    .expect("长度匹配");
    let mut output = vec![0u8; pixels.len()];
    let mut filter = Segmentation::<ConstantModel>::default();
    assert!(matches!(
      filter.apply(input, &mut output),
      Err(SegmentationError::ModelNotLoaded)
    ));
  }

  #[test]
  fn inference_failure_is_reported() {
    let pixels = gradient(4, 4);
    let input = FrameRef::new(
      FrameSize {
        width: 4,
        height: 4,
      },
      &pixels,
    )
    .expect("长度匹配");
    let mut output = vec![0u8; pixels.len()];
    let mut filter = Segmentation::default().with_model(FailingModel);
    assert!(matches!(
      filter.apply(input, &mut output),
      Err(SegmentationError::Inference(msg)) if msg == "invoke failed"
    ));
  }

  #[test]
  fn model_is_invoked_once_per_exec() {
    let size = FrameSize {
      width: 5,
      height: 5,
    };
    let pixels = gradient(size.width, size.height);
    let mut filter = Segmentation::default().with_model(ConstantModel::new(1.0));
    run(&mut filter, &pixels, size);
    run(&mut filter, &pixels, size);
    assert_eq!(filter.model.as_ref().map(|m| m.calls.get()), Some(2));
  }
}
