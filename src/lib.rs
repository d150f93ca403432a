// 该文件是 Xiangsu （像素） 项目的一部分。
// src/lib.rs - 库主文件
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

#[cfg(all(feature = "host_color_shift", feature = "host_segmentation"))]
compile_error!("host_color_shift 与 host_segmentation 只能启用其中一个：两者都导出 exec 符号");

// 计时依赖 Instant::now，模型从宿主虚拟文件系统读取，浏览器宿主只支持 emscripten
#[cfg(all(
  any(feature = "host_color_shift", feature = "host_segmentation"),
  target_arch = "wasm32",
  not(target_os = "emscripten")
))]
compile_error!("浏览器宿主需要 wasm32-unknown-emscripten 目标");

pub mod filter;
pub mod frame;
pub mod host;
pub mod input;
pub mod logging;
pub mod model;
pub mod output;
pub mod task;
pub mod timing;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}
