// 该文件是 Xiangsu （像素） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use image::RgbaImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, timing::StageDurations};

/// 每一帧结果都覆盖写入同一个文件
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput::new(uri.path()))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Render<RgbaImage, StageDurations> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbaImage, result: &StageDurations) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    frame.save(&self.path)?;
    info!(
      "保存图像到文件: {} (总耗时 {:.2?})",
      self.path.display(),
      result.total()
    );

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn creates_parent_directories() {
    let root = std::env::temp_dir().join(format!("xiangsu-save-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let path = root.join("nested/out.png");
    let url = Url::parse(&format!("image://{}", path.display())).expect("合法 URL");
    let output = SaveImageFileOutput::from_url(&url).expect("方案正确");
    assert_eq!(output.path(), path.as_path());

    let mut frame = RgbaImage::new(2, 2);
    frame.put_pixel(1, 0, image::Rgba([1, 2, 3, 4]));
    output
      .render_result(&frame, &StageDurations::default())
      .expect("保存成功");

    let saved = image::open(&path).expect("读取图像").into_rgba8();
    assert_eq!(saved, frame);
    let _ = std::fs::remove_dir_all(&root);
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("folder:///tmp/out").expect("合法 URL");
    assert!(SaveImageFileOutput::from_url(&url).is_err());
  }
}
