// 该文件是 Xiangsu （像素） 项目的一部分。
// src/bin/simple_oneshot.rs - 颜色偏移单帧处理
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use xiangsu::{
  FromUrl,
  filter::ColorShift,
  host::HostSession,
  input::InputWrapper,
  logging::{LogLevel, init_logging},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// 颜色偏移滤镜：R+60, G-10, B-10
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 红色通道偏移
  #[arg(long, default_value_t = 60, allow_hyphen_values = true)]
  pub red: i16,
  /// 绿色通道偏移
  #[arg(long, default_value_t = -10, allow_hyphen_values = true)]
  pub green: i16,
  /// 蓝色通道偏移
  #[arg(long, default_value_t = -10, allow_hyphen_values = true)]
  pub blue: i16,
  /// 日志级别
  #[arg(long, value_enum, default_value_t = LogLevel::Info)]
  pub log_level: LogLevel,
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(args.log_level);

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("颜色偏移: ({}, {}, {})", args.red, args.green, args.blue);

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let session = HostSession::new(ColorShift::new(args.red, args.green, args.blue));

  OneShotTask.run_task(input, session, output)?;

  Ok(())
}
