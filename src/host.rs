// 该文件是 Xiangsu （像素） 项目的一部分。
// src/host.rs - 宿主会话：固定缓冲区、状态码与错误记录
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
  fmt::Display,
  panic::{self, AssertUnwindSafe},
};

use thiserror::Error;
use tracing::{error, info, trace};

use crate::{
  filter::{Filter, Segmentation, SegmentationError},
  frame::{FrameError, HostFrame},
  model::Model,
  timing::StageDurations,
};

mod exports;

/// 返回给宿主的状态码，非 0 表示本次调用失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
  Ok = 0,
  ModelLoadFailed = 1,
  InferenceFailed = -1,
  InvalidSize = 2,
  ModelNotLoaded = 3,
  Panicked = 4,
}

impl From<Status> for i32 {
  fn from(status: Status) -> Self {
    status as i32
  }
}

#[derive(Error, Debug)]
pub enum HostError {
  #[error("缓冲区错误: {0}")]
  Frame(#[from] FrameError),
  #[error("模型加载失败: {0}")]
  ModelLoad(String),
  #[error("推理失败: {0}")]
  Inference(String),
  #[error("模型尚未加载")]
  ModelNotLoaded,
  #[error("exec 内部 panic: {0}")]
  Panicked(String),
}

impl HostError {
  pub fn status(&self) -> Status {
    match self {
      HostError::Frame(_) => Status::InvalidSize,
      HostError::ModelLoad(_) => Status::ModelLoadFailed,
      HostError::Inference(_) => Status::InferenceFailed,
      HostError::ModelNotLoaded => Status::ModelNotLoaded,
      HostError::Panicked(_) => Status::Panicked,
    }
  }
}

impl From<SegmentationError> for HostError {
  fn from(err: SegmentationError) -> Self {
    match err {
      SegmentationError::ModelNotLoaded => HostError::ModelNotLoaded,
      SegmentationError::Frame(e) => HostError::Frame(e),
      other => HostError::Inference(other.to_string()),
    }
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

/// 一个宿主会话：输入/输出缓冲区在创建时分配，会话存续期间地址不变
pub struct HostSession<F> {
  input: HostFrame,
  output: HostFrame,
  filter: F,
  durations: StageDurations,
  last_error: Option<String>,
}

impl<F: Filter> HostSession<F>
where
  HostError: From<F::Error>,
{
  pub fn new(filter: F) -> Self {
    Self {
      input: HostFrame::default(),
      output: HostFrame::default(),
      filter,
      durations: StageDurations::default(),
      last_error: None,
    }
  }

  pub fn input_ptr(&mut self) -> *mut u8 {
    self.input.as_mut_ptr()
  }

  pub fn output_ptr(&mut self) -> *mut u8 {
    self.output.as_mut_ptr()
  }

  pub fn input(&self) -> &HostFrame {
    &self.input
  }

  pub fn input_mut(&mut self) -> &mut HostFrame {
    &mut self.input
  }

  pub fn output(&self) -> &HostFrame {
    &self.output
  }

  pub fn filter(&self) -> &F {
    &self.filter
  }

  pub fn filter_mut(&mut self) -> &mut F {
    &mut self.filter
  }

  /// 最近一次成功 exec 的分阶段耗时
  pub fn durations(&self) -> StageDurations {
    self.durations
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  /// 记录错误并返回对应的状态码
  pub fn record_error(&mut self, err: &HostError) -> Status {
    error!("{}", err);
    self.last_error = Some(err.to_string());
    err.status()
  }

  /// 记录宿主侧抛出的异常信息；`None` 时重新输出最近一次记录的错误
  pub fn report_exception(&self, message: Option<&str>) -> Option<String> {
    let message = message.or(self.last_error.as_deref())?;
    error!("exception->what: {}", message);
    Some(message.to_string())
  }

  /// 校验尺寸并执行滤镜，filter 内部的 panic 会被转换为错误
  pub fn try_exec(&mut self, width: i64, height: i64) -> Result<StageDurations, HostError> {
    let size = self.input.size(width, height)?;
    let input = self.input.frame_ref(size);
    let output = self.output.pixels_mut(size);
    let filter = &mut self.filter;

    let result = panic::catch_unwind(AssertUnwindSafe(|| filter.apply(input, output)))
      .map_err(|payload| HostError::Panicked(panic_message(payload.as_ref())))?;
    let durations = result?;
    self.durations = durations;
    Ok(durations)
  }

  /// 宿主入口：返回 0 表示成功，否则为 [`Status`] 中的错误码
  pub fn exec(&mut self, width: i32, height: i32) -> i32 {
    trace!("exec {}x{}", width, height);
    match self.try_exec(width as i64, height as i64) {
      Ok(_) => Status::Ok.into(),
      Err(e) => self.record_error(&e).into(),
    }
  }
}

impl<M: Model> HostSession<Segmentation<M>>
where
  M::Error: Display,
{
  /// 加载模型并交给分割滤镜，失败时保留原有模型
  pub fn load_model<E: Display>(&mut self, loader: impl FnOnce() -> Result<M, E>) -> i32 {
    trace!("loadModel");
    match loader() {
      Ok(model) => {
        self.filter.load_model(model);
        info!("Load Model Success");
        Status::Ok.into()
      }
      Err(e) => self.record_error(&HostError::ModelLoad(e.to_string())).into(),
    }
  }
}
