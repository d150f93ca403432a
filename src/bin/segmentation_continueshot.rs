// 该文件是 Xiangsu （像素） 项目的一部分。
// src/bin/segmentation_continueshot.rs - 人像分割背景虚化连续处理
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use xiangsu::{
  FromUrl,
  filter::{Segmentation, SegmentationConfig},
  host::HostSession,
  input::InputWrapper,
  logging::{LogLevel, init_logging},
  model::TfliteSegmenterBuilder,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

/// 逐帧处理目录中的图像，直到输入结束、达到帧数或收到 Ctrl-C
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TFLite 模型文件路径
  #[arg(long, value_name = "MODEL", default_value = "tflite:///model_float32.tflite")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 最多处理的帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 耗时记录（JSON）输出文件
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,
  /// 掩码阈值，高于该值的像素视为前景
  #[arg(long, default_value_t = 0)]
  pub threshold: u8,
  /// 背景高斯模糊的 sigma，0 表示不模糊
  #[arg(long, default_value_t = 1.7)]
  pub sigma: f32,
  /// 日志级别
  #[arg(long, value_enum, default_value_t = LogLevel::Info)]
  pub log_level: LogLevel,
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(args.log_level);

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let model = TfliteSegmenterBuilder::from_url(&args.model)?.build()?;
  let config = SegmentationConfig::default()
    .with_mask_threshold(args.threshold)
    .with_blur_sigma(args.sigma);
  let session = HostSession::new(Segmentation::new(config).with_model(model));

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_report(args.report)
    .run_task(input, session, output)?;

  Ok(())
}
