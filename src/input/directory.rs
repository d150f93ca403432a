// 该文件是 Xiangsu （像素） 项目的一部分。
// src/input/directory.rs - 目录图像序列输入
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
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::{ImageFormat, ImageReader, RgbaImage};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 目录中的图像文件按文件名排序，每个文件一帧。
///
/// 无法解码的文件会被记录并跳过。
pub struct DirectoryInput {
  paths: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch(url.scheme().to_string()));
    }
    Self::open(url.path())
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file() && ImageFormat::from_path(path).is_ok()
}

impl DirectoryInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, DirectoryInputError> {
    let directory = directory.as_ref();
    let mut paths = std::fs::read_dir(directory)?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<Result<Vec<_>, _>>()?;
    paths.retain(|p| is_image_file(p));
    paths.sort();
    info!("目录 {} 中共有 {} 张图像", directory.display(), paths.len());

    Ok(Self {
      paths: paths.into(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = RgbaImage;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.paths.pop_front() {
      debug!("读取 {}", path.display());
      match ImageReader::open(&path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => match reader.decode() {
          Ok(image) => return Some(image.into_rgba8()),
          Err(e) => error!("无法解码 {}: {}", path.display(), e),
        },
        Err(e) => error!("无法打开 {}: {}", path.display(), e),
      }
    }
    None
  }
}
