// 该文件是 Xiangsu （像素） 项目的一部分。
// src/input.rs - 离线图像输入
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

#[cfg(feature = "read_image_file")]
use image::RgbaImage;
use thiserror::Error;

use crate::FromUrl;

#[cfg(feature = "read_image_file")]
mod image_file;
#[cfg(feature = "read_image_file")]
pub use self::image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "read_image_file")]
mod directory;
#[cfg(feature = "read_image_file")]
pub use self::directory::{DirectoryInput, DirectoryInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "read_image_file")]
  #[error("目录输入错误: {0}")]
  DirectoryInputError(#[from] DirectoryInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 按 URL 方案选择的输入来源，逐帧产出 RGBA 图像
pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileInput),
  #[cfg(feature = "read_image_file")]
  Directory(DirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?));
      }
      if url.scheme() == DirectoryInput::SCHEME {
        return Ok(InputWrapper::Directory(DirectoryInput::from_url(url)?));
      }
    }
    tracing::error!("不支持的输入方案: {}", url.scheme());
    Err(InputError::SchemeMismatch)
  }
}

#[cfg(feature = "read_image_file")]
impl Iterator for InputWrapper {
  type Item = RgbaImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::Directory(input) => input.next(),
    }
  }
}
