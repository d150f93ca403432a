// 该文件是 Xiangsu （像素） 项目的一部分。
// src/task.rs - 离线驱动任务：单次、重复基准与连续处理
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
  thread,
  time::Duration,
};

use image::RgbaImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  filter::Filter,
  frame::FrameError,
  host::{HostError, HostSession},
  output::Render,
  timing::{DurationHistory, StageDurations},
};

const DEFAULT_REPEAT_TIMES: usize = 1000;
const REPEAT_WARMUP: usize = 2;

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("没有输入帧")]
  NoInput,
  #[error("输入帧错误: {0}")]
  Frame(#[from] FrameError),
  #[error("exec 返回状态 {status}: {message}")]
  Exec { status: i32, message: String },
}

pub trait Task<I, F, O>: Sized {
  type Error;
  fn run_task(self, input: I, session: HostSession<F>, output: O) -> Result<(), Self::Error>;
}

/// 按宿主的方式处理一帧：写入输入缓冲区，调用 exec，再读回输出缓冲区
pub fn exec_frame<F: Filter>(
  session: &mut HostSession<F>,
  frame: &RgbaImage,
) -> Result<(RgbaImage, StageDurations), TaskError>
where
  HostError: From<F::Error>,
{
  let size = session.input_mut().write_image(frame)?;
  let status = session.exec(size.width as i32, size.height as i32);
  if status != 0 {
    return Err(TaskError::Exec {
      status,
      message: session.last_error().unwrap_or_default().to_string(),
    });
  }
  Ok((session.output().to_image(size), session.durations()))
}

fn write_report(path: &Path, history: &DurationHistory) -> anyhow::Result<()> {
  let report = serde_json::to_string_pretty(&history.to_json())?;
  std::fs::write(path, report)?;
  info!("耗时记录已写入 {}", path.display());
  Ok(())
}

fn log_durations(prefix: &str, durations: &StageDurations) {
  info!(
    "{}前处理 {:.2?} / 推理 {:.2?} / 后处理 {:.2?}",
    prefix, durations.preprocess, durations.inference, durations.postprocess
  );
}

pub struct OneShotTask;

impl<F, RE, I, O> Task<I, F, O> for OneShotTask
where
  F: Filter,
  HostError: From<F::Error>,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbaImage>,
  O: Render<RgbaImage, StageDurations, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut session: HostSession<F>, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let frame = input.next().ok_or(TaskError::NoInput)?;
    info!("输入帧获取成功 ({}x{})，开始处理...", frame.width(), frame.height());
    let (result, durations) = exec_frame(&mut session, &frame)?;
    log_durations("处理完成：", &durations);
    output.render_result(&result, &durations)?;
    info!("渲染完成");

    Ok(())
  }
}

/// 对同一帧重复执行，统计跳过预热之后的平均耗时
pub struct RepeatShotTask {
  times: usize,
  report: Option<PathBuf>,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      times: DEFAULT_REPEAT_TIMES,
      report: None,
    }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }

  pub fn with_report(mut self, report: Option<PathBuf>) -> Self {
    self.report = report;
    self
  }
}

impl<F, RE, I, O> Task<I, F, O> for RepeatShotTask
where
  F: Filter,
  HostError: From<F::Error>,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbaImage>,
  O: Render<RgbaImage, StageDurations, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut session: HostSession<F>, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let frame = input.next().ok_or(TaskError::NoInput)?;
    info!("输入帧获取成功，重复 {} 次...", self.times);

    let mut history = DurationHistory::with_capacity(self.times).with_warmup(REPEAT_WARMUP);
    for i in 0..self.times {
      let (result, durations) = exec_frame(&mut session, &frame)?;
      log_durations(&format!("({}) ", i), &durations);
      output.render_result(&result, &durations)?;
      history.push(durations);
    }

    match history.mean() {
      Some(mean) => warn!(
        "平均耗时: 前处理 {:.2?} / 推理 {:.2?} / 后处理 {:.2?}",
        mean.preprocess, mean.inference, mean.postprocess
      ),
      None => warn!("执行次数不超过 {} 次预热，没有统计结果", REPEAT_WARMUP),
    }

    if let Some(path) = self.report.as_deref() {
      write_report(path, &history)?;
    }
    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  report: Option<PathBuf>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_report(mut self, report: Option<PathBuf>) -> Self {
    self.report = report;
    self
  }
}

impl<F, RE, I, O> Task<I, F, O> for ContinuousTask
where
  F: Filter,
  HostError: From<F::Error>,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbaImage>,
  O: Render<RgbaImage, StageDurations, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut session: HostSession<F>, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    let installed = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = installed {
      warn!("无法注册 Ctrl-C 处理函数: {}", e);
    }

    let mut history = DurationHistory::default();
    let mut frame_index = 0usize;
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);
      let (result, durations) = exec_frame(&mut session, &frame)?;
      log_durations("", &durations);
      output.render_result(&result, &durations)?;
      history.push(durations);

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    if let Some(mean) = history.mean() {
      info!("共 {} 帧，平均总耗时 {:.2?}", frame_index, mean.total());
    }
    if let Some(path) = self.report.as_deref() {
      write_report(path, &history)?;
    }

    info!("任务完成，退出");
    Ok(())
  }
}
