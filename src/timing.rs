// 该文件是 Xiangsu （像素） 项目的一部分。
// src/timing.rs - 分阶段耗时统计
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

use std::{collections::VecDeque, time::Duration};

use serde_json::{Value, json};

/// 宿主侧图表保留的采样数量
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// 一次 exec 调用的分阶段耗时
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageDurations {
  pub preprocess: Duration,
  pub inference: Duration,
  pub postprocess: Duration,
}

fn as_millis_f64(d: Duration) -> f64 {
  d.as_nanos() as f64 / 1_000_000.0
}

impl StageDurations {
  pub fn total(&self) -> Duration {
    self.preprocess + self.inference + self.postprocess
  }

  pub fn preprocess_ms(&self) -> f64 {
    as_millis_f64(self.preprocess)
  }

  pub fn inference_ms(&self) -> f64 {
    as_millis_f64(self.inference)
  }

  pub fn postprocess_ms(&self) -> f64 {
    as_millis_f64(self.postprocess)
  }

  pub fn to_json(&self) -> Value {
    json!({
      "preprocessDuration": self.preprocess_ms(),
      "inferenceDuration": self.inference_ms(),
      "postprocessDuration": self.postprocess_ms(),
      "totalDuration": as_millis_f64(self.total()),
    })
  }
}

/// 有界的耗时历史窗口，超出容量时丢弃最旧的采样
#[derive(Debug, Clone)]
pub struct DurationHistory {
  capacity: usize,
  warmup: usize,
  samples: VecDeque<StageDurations>,
  // 已经记录过的采样总数，用于跳过预热
  recorded: usize,
}

impl Default for DurationHistory {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
  }
}

impl DurationHistory {
  pub fn with_capacity(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      capacity,
      warmup: 0,
      samples: VecDeque::with_capacity(capacity),
      recorded: 0,
    }
  }

  /// 前 `warmup` 个采样不计入统计
  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }

  pub fn push(&mut self, sample: StageDurations) {
    self.recorded += 1;
    if self.recorded <= self.warmup {
      return;
    }
    if self.samples.len() == self.capacity {
      self.samples.pop_front();
    }
    self.samples.push_back(sample);
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn latest(&self) -> Option<&StageDurations> {
    self.samples.back()
  }

  pub fn iter(&self) -> impl Iterator<Item = &StageDurations> {
    self.samples.iter()
  }

  pub fn mean(&self) -> Option<StageDurations> {
    if self.samples.is_empty() {
      return None;
    }
    let n = self.samples.len() as u32;
    let sum = self
      .samples
      .iter()
      .fold(StageDurations::default(), |acc, s| StageDurations {
        preprocess: acc.preprocess + s.preprocess,
        inference: acc.inference + s.inference,
        postprocess: acc.postprocess + s.postprocess,
      });
    Some(StageDurations {
      preprocess: sum.preprocess / n,
      inference: sum.inference / n,
      postprocess: sum.postprocess / n,
    })
  }

  pub fn to_json(&self) -> Value {
    json!({
      "samples": self.samples.len(),
      "mean": self.mean().map(|m| m.to_json()),
      "history": self.samples.iter().map(StageDurations::to_json).collect::<Vec<_>>(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample(ms: u64) -> StageDurations {
    StageDurations {
      preprocess: Duration::from_millis(ms),
      inference: Duration::from_millis(2 * ms),
      postprocess: Duration::from_millis(3 * ms),
    }
  }

  #[test]
  fn millisecond_accessors() {
    let s = StageDurations {
      preprocess: Duration::from_micros(1500),
      ..Default::default()
    };
    assert_eq!(s.preprocess_ms(), 1.5);
    assert_eq!(s.inference_ms(), 0.0);
    assert_eq!(s.to_json()["preprocessDuration"], 1.5);
  }

  #[test]
  fn history_drops_oldest_when_full() {
    let mut history = DurationHistory::with_capacity(2);
    history.push(sample(1));
    history.push(sample(2));
    history.push(sample(3));
    assert_eq!(history.len(), 2);
    assert_eq!(history.latest(), Some(&sample(3)));
    assert_eq!(
      history.mean(),
      Some(StageDurations {
        preprocess: Duration::from_micros(2500),
        inference: Duration::from_millis(5),
        postprocess: Duration::from_micros(7500),
      })
    );
  }

  #[test]
  fn history_skips_warmup() {
    let mut history = DurationHistory::with_capacity(10).with_warmup(2);
    history.push(sample(100));
    history.push(sample(100));
    history.push(sample(4));
    assert_eq!(history.len(), 1);
    assert_eq!(history.mean(), Some(sample(4)));
  }

  #[test]
  fn empty_history_has_no_mean() {
    let history = DurationHistory::default();
    assert!(history.is_empty());
    assert_eq!(history.mean(), None);
    assert!(history.to_json()["mean"].is_null());
  }
}
