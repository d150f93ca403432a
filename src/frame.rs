// 该文件是 Xiangsu （像素） 项目的一部分。
// src/frame.rs - 固定容量的 RGBA 像素缓冲区与张量定义
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

use image::RgbaImage;
use thiserror::Error;

pub const RGBA_CHANNELS: usize = 4;
pub const RGB_CHANNELS: usize = 3;

/// 宿主缓冲区的最大宽度
pub const MAX_WIDTH: u32 = 640;
/// 宿主缓冲区的最大高度
pub const MAX_HEIGHT: u32 = 480;

/// 宿主会话使用的输入/输出缓冲区类型
pub type HostFrame = RgbaFrame<MAX_WIDTH, MAX_HEIGHT>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("图像尺寸无效: {width}x{height}, 缓冲区容量 {capacity} 像素")]
  InvalidSize {
    width: i64,
    height: i64,
    capacity: usize,
  },
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 一次 exec 调用中有效的图像区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
  pub width: u32,
  pub height: u32,
}

impl FrameSize {
  /// 校验宿主传入的宽高：必须为正，且像素数不超过缓冲区容量。
  ///
  /// 只限制面积而不是分别限制宽高，竖屏帧（例如 480x640）同样可以放入缓冲区。
  pub fn checked(width: i64, height: i64, capacity: usize) -> Result<Self, FrameError> {
    let invalid = FrameError::InvalidSize {
      width,
      height,
      capacity,
    };

    if width <= 0 || height <= 0 {
      return Err(invalid);
    }

    let pixels = (width as u64).checked_mul(height as u64).ok_or(invalid.clone())?;
    if pixels > capacity as u64 {
      return Err(invalid);
    }

    Ok(Self {
      width: width as u32,
      height: height as u32,
    })
  }

  pub fn pixels(&self) -> usize {
    self.width as usize * self.height as usize
  }

  pub fn rgba_len(&self) -> usize {
    self.pixels() * RGBA_CHANNELS
  }
}

/// 借用的 RGBA 图像区域，交给滤镜读取
#[derive(Debug, Clone, Copy)]
pub struct FrameRef<'a> {
  size: FrameSize,
  data: &'a [u8],
}

impl<'a> FrameRef<'a> {
  pub fn new(size: FrameSize, data: &'a [u8]) -> Result<Self, FrameError> {
    if data.len() != size.rgba_len() {
      return Err(FrameError::LengthMismatch {
        expected: size.rgba_len(),
        actual: data.len(),
      });
    }
    Ok(Self { size, data })
  }

  pub fn size(&self) -> FrameSize {
    self.size
  }

  pub fn width(&self) -> u32 {
    self.size.width
  }

  pub fn height(&self) -> u32 {
    self.size.height
  }

  pub fn data(&self) -> &'a [u8] {
    self.data
  }

  pub fn to_image(&self) -> RgbaImage {
    // 长度已在构造时校验
    RgbaImage::from_raw(self.width(), self.height(), self.data.to_vec())
      .unwrap_or_else(|| RgbaImage::new(self.width(), self.height()))
  }
}

/// 固定容量的 RGBA 缓冲区，创建后不再重新分配，地址在整个会话内保持不变
#[derive(Debug, Clone)]
pub struct RgbaFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> Default for RgbaFrame<W, H> {
  fn default() -> Self {
    let size = RGBA_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> RgbaFrame<W, H> {
  pub const fn max_width() -> u32 {
    W
  }

  pub const fn max_height() -> u32 {
    H
  }

  /// 缓冲区可容纳的像素数
  pub const fn capacity() -> usize {
    W as usize * H as usize
  }

  pub fn size(&self, width: i64, height: i64) -> Result<FrameSize, FrameError> {
    FrameSize::checked(width, height, Self::capacity())
  }

  pub fn as_mut_ptr(&mut self) -> *mut u8 {
    self.data.as_mut_ptr()
  }

  pub fn pixels(&self, size: FrameSize) -> &[u8] {
    &self.data[..size.rgba_len()]
  }

  pub fn pixels_mut(&mut self, size: FrameSize) -> &mut [u8] {
    &mut self.data[..size.rgba_len()]
  }

  pub fn frame_ref(&self, size: FrameSize) -> FrameRef<'_> {
    FrameRef {
      size,
      data: self.pixels(size),
    }
  }

  pub fn to_image(&self, size: FrameSize) -> RgbaImage {
    self.frame_ref(size).to_image()
  }

  /// 将图像写入缓冲区头部，相当于宿主向输入缓冲区写入像素
  pub fn write_image(&mut self, image: &RgbaImage) -> Result<FrameSize, FrameError> {
    let size = self.size(image.width() as i64, image.height() as i64)?;
    self.pixels_mut(size).copy_from_slice(image.as_raw());
    Ok(size)
  }
}

impl<const W: u32, const H: u32> AsRef<[u8]> for RgbaFrame<W, H> {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl<const W: u32, const H: u32> AsMut<[u8]> for RgbaFrame<W, H> {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

/// NHWC 张量形状（batch 固定为 1）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorShape {
  pub height: usize,
  pub width: usize,
  pub channels: usize,
}

impl TensorShape {
  pub fn len(&self) -> usize {
    self.height * self.width * self.channels
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 推理引擎输入输出使用的 NHWC 浮点张量
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  shape: TensorShape,
  data: Box<[f32]>,
}

impl Tensor {
  pub fn from_vec(shape: TensorShape, data: Vec<f32>) -> Result<Self, FrameError> {
    if data.len() != shape.len() {
      return Err(FrameError::LengthMismatch {
        expected: shape.len(),
        actual: data.len(),
      });
    }
    Ok(Self {
      shape,
      data: data.into_boxed_slice(),
    })
  }

  pub fn filled(shape: TensorShape, value: f32) -> Self {
    Self {
      shape,
      data: vec![value; shape.len()].into_boxed_slice(),
    }
  }

  pub fn shape(&self) -> TensorShape {
    self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  /// 取出单个通道的平面数据（行优先）
  pub fn channel(&self, c: usize) -> Option<Vec<f32>> {
    if c >= self.shape.channels {
      return None;
    }
    Some(
      self
        .data
        .chunks_exact(self.shape.channels)
        .map(|px| px[c])
        .collect(),
    )
  }
}
