// 该文件是 Xiangsu （像素） 项目的一部分。
// src/filter.rs - 滤镜定义
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

use crate::{frame::FrameRef, timing::StageDurations};

/// 作用于宿主像素缓冲区的滤镜。
///
/// `output` 与 `input` 的有效区域等长（`width * height * 4` 字节），
/// 实现必须完整覆盖 `output`，且不能依赖上一次调用留下的输出内容。
pub trait Filter {
  type Error;

  fn apply(
    &mut self,
    input: FrameRef<'_>,
    output: &mut [u8],
  ) -> Result<StageDurations, Self::Error>;
}

mod color_shift;
pub use self::color_shift::ColorShift;

mod segmentation;
pub use self::segmentation::{
  Segmentation, SegmentationConfig, SegmentationError, blur_rgba, composite_by_mask,
};
