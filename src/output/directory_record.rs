// 该文件是 Xiangsu （像素） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::{Mutex, PoisonError},
};

use chrono::{Datelike, Utc};
use image::RgbaImage;
use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, FromUrlWithScheme, output::Render, timing::StageDurations};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分目录保存每一帧：`YYYY/MM/DD/HH-MM-SS-XXXX.png`。
///
/// URL 带 `?durations` 时，同名 `.json` 文件记录该帧的分阶段耗时。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: Mutex<u16>,
  durations: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let durations = uri.query_pairs().any(|(k, _)| k == "durations");
    Ok(DirectoryRecordOutput::new(uri.path()).with_durations(durations))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      frame_counter: Mutex::new(0),
      durations: false,
    }
  }

  pub fn with_durations(mut self, durations: bool) -> Self {
    self.durations = durations;
    self
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RgbaImage, StageDurations> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbaImage, result: &StageDurations) -> Result<(), Self::Error> {
    let path = self.frame_path()?;
    frame.save(&path)?;
    debug!("保存帧到 {}", path.display());

    if self.durations {
      let record = serde_json::to_string_pretty(&result.to_json())?;
      std::fs::write(path.with_extension("json"), record)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in std::fs::read_dir(dir).expect("读取目录") {
      let path = entry.expect("目录项").path();
      if path.is_dir() {
        collect_files(&path, out);
      } else {
        out.push(path);
      }
    }
  }

  #[test]
  fn records_frames_under_dated_directories() {
    let root = std::env::temp_dir().join(format!("xiangsu-record-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let url =
      url::Url::parse(&format!("folder://{}?durations", root.display())).expect("合法 URL");
    let output = DirectoryRecordOutput::from_url(&url).expect("方案正确");

    let durations = StageDurations {
      inference: Duration::from_millis(3),
      ..Default::default()
    };
    output
      .render_result(&RgbaImage::new(2, 2), &durations)
      .expect("保存成功");
    output
      .render_result(&RgbaImage::new(2, 2), &durations)
      .expect("保存成功");

    let mut files = Vec::new();
    collect_files(&root, &mut files);
    files.sort();
    assert_eq!(files.len(), 4);

    let png = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "png"))
      .expect("有 png 文件");
    // root/YYYY/MM/DD/file
    let depth = png.strip_prefix(&root).expect("位于根目录下").components().count();
    assert_eq!(depth, 4);
    let name = png.to_string_lossy();
    assert!(name.ends_with("-0001.png") || name.ends_with("-0002.png"));

    let json = std::fs::read_to_string(png.with_extension("json")).expect("耗时记录");
    let value: serde_json::Value = serde_json::from_str(&json).expect("合法 JSON");
    assert_eq!(value["inferenceDuration"], 3.0);

    let _ = std::fs::remove_dir_all(&root);
  }
}
