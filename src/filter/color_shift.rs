// 该文件是 Xiangsu （像素） 项目的一部分。
// src/filter/color_shift.rs - 颜色偏移滤镜
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

use std::time::Instant;

use tracing::trace;

use crate::{
  filter::Filter,
  frame::{FrameError, FrameRef, RGBA_CHANNELS},
  timing::StageDurations,
};

const DEFAULT_RED_OFFSET: i16 = 60;
const DEFAULT_GREEN_OFFSET: i16 = -10;
const DEFAULT_BLUE_OFFSET: i16 = -10;

/// 对 R/G/B 通道分别加上固定偏移并截断到 `0..=255`，Alpha 原样保留
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorShift {
  red: i16,
  green: i16,
  blue: i16,
}

impl Default for ColorShift {
  fn default() -> Self {
    Self {
      red: DEFAULT_RED_OFFSET,
      green: DEFAULT_GREEN_OFFSET,
      blue: DEFAULT_BLUE_OFFSET,
    }
  }
}

impl ColorShift {
  pub fn new(red: i16, green: i16, blue: i16) -> Self {
    Self { red, green, blue }
  }

  pub fn offsets(&self) -> [i16; 3] {
    [self.red, self.green, self.blue]
  }

  #[inline]
  fn shift(value: u8, offset: i16) -> u8 {
    (i32::from(value) + i32::from(offset)).clamp(0, i32::from(u8::MAX)) as u8
  }

  pub fn shift_pixel(&self, px: [u8; 4]) -> [u8; 4] {
    [
      Self::shift(px[0], self.red),
      Self::shift(px[1], self.green),
      Self::shift(px[2], self.blue),
      px[3],
    ]
  }
}

impl Filter for ColorShift {
  type Error = FrameError;

  fn apply(
    &mut self,
    input: FrameRef<'_>,
    output: &mut [u8],
  ) -> Result<StageDurations, Self::Error> {
    if output.len() != input.data().len() {
      return Err(FrameError::LengthMismatch {
        expected: input.data().len(),
        actual: output.len(),
      });
    }

    trace!("start exec");
    let start = Instant::now();
    for (src, dst) in input
      .data()
      .chunks_exact(RGBA_CHANNELS)
      .zip(output.chunks_exact_mut(RGBA_CHANNELS))
    {
      dst.copy_from_slice(&self.shift_pixel([src[0], src[1], src[2], src[3]]));
    }
    trace!("done.");

    // 没有推理阶段，整个像素变换计入后处理
    Ok(StageDurations {
      postprocess: start.elapsed(),
      ..Default::default()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::FrameSize;

  fn run(filter: &mut ColorShift, pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let size = FrameSize { width, height };
    let input = FrameRef::new(size, pixels).expect("长度匹配");
    let mut output = vec![0u8; pixels.len()];
    filter.apply(input, &mut output).expect("颜色偏移不会失败");
    output
  }

  #[test]
  fn shifts_and_saturates_channels() {
    let mut filter = ColorShift::default();
    let pixels = [
      0, 0, 0, 0, //
      200, 5, 10, 128, //
      195, 255, 9, 255, //
      100, 100, 100, 7,
    ];
    let out = run(&mut filter, &pixels, 2, 2);
    assert_eq!(
      out,
      vec![
        60, 0, 0, 0, //
        255, 0, 0, 128, //
        255, 245, 0, 255, //
        160, 90, 90, 7,
      ]
    );
  }

  #[test]
  fn every_value_follows_the_offset_rule() {
    let filter = ColorShift::default();
    for v in 0..=255u8 {
      let out = filter.shift_pixel([v, v, v, v]);
      assert_eq!(out[0] as i32, (v as i32 + 60).min(255));
      assert_eq!(out[1] as i32, (v as i32 - 10).max(0));
      assert_eq!(out[2] as i32, (v as i32 - 10).max(0));
      assert_eq!(out[3], v);
    }
  }

  #[test]
  fn extreme_offsets_saturate() {
    let filter = ColorShift::new(i16::MAX, i16::MIN, 0);
    assert_eq!(filter.shift_pixel([10, 250, 7, 1]), [255, 0, 7, 1]);
    assert_eq!(filter.shift_pixel([0, 255, 255, 0]), [255, 0, 255, 0]);
  }

  #[test]
  fn repeated_exec_is_idempotent() {
    let mut filter = ColorShift::new(-30, 40, 0);
    let pixels: Vec<u8> = (0..(3 * 5 * 4)).map(|i| (i * 17 % 256) as u8).collect();
    let first = run(&mut filter, &pixels, 3, 5);
    let second = run(&mut filter, &pixels, 3, 5);
    assert_eq!(first, second);
  }

  #[test]
  fn rejects_mismatched_output() {
    let mut filter = ColorShift::default();
    let pixels = [0u8; 8];
    let input = FrameRef::new(FrameSize { width: 2, height: 1 }, &pixels).expect("长度匹配");
    let mut output = [0u8; 4];
    assert!(filter.apply(input, &mut output).is_err());
  }
}
