// 该文件是 Xiangsu （像素） 项目的一部分。
// src/logging.rs - 日志初始化与运行时日志级别
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

use std::sync::OnceLock;

use clap::ValueEnum;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::{Registry, filter::LevelFilter, fmt, prelude::*, reload};

static RELOAD_HANDLE: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

/// 宿主使用的整数日志级别：0 trace ... 6 off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
  Trace = 0,
  Debug = 1,
  #[default]
  Info = 2,
  Warn = 3,
  Error = 4,
  Critical = 5,
  Off = 6,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无效的日志级别: {0}")]
pub struct InvalidLogLevel(pub i32);

impl TryFrom<i32> for LogLevel {
  type Error = InvalidLogLevel;

  fn try_from(value: i32) -> Result<Self, InvalidLogLevel> {
    match value {
      0 => Ok(LogLevel::Trace),
      1 => Ok(LogLevel::Debug),
      2 => Ok(LogLevel::Info),
      3 => Ok(LogLevel::Warn),
      4 => Ok(LogLevel::Error),
      5 => Ok(LogLevel::Critical),
      6 => Ok(LogLevel::Off),
      other => Err(InvalidLogLevel(other)),
    }
  }
}

impl From<LogLevel> for LevelFilter {
  fn from(level: LogLevel) -> Self {
    match level {
      LogLevel::Trace => LevelFilter::TRACE,
      LogLevel::Debug => LevelFilter::DEBUG,
      LogLevel::Info => LevelFilter::INFO,
      LogLevel::Warn => LevelFilter::WARN,
      // tracing 没有 critical，归入 error
      LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
      LogLevel::Off => LevelFilter::OFF,
    }
  }
}

/// 安装全局日志订阅器；重复调用只会调整级别。
///
/// 如果进程中已经有其他全局订阅器，则保留它，本模块的级别设置不再生效。
pub fn init_logging(level: LogLevel) {
  if RELOAD_HANDLE.get().is_some() {
    set_log_level(level);
    return;
  }

  let (filter, handle) = reload::Layer::new(LevelFilter::from(level));
  let installed = tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer())
    .try_init()
    .is_ok();

  if installed {
    // 并发初始化时只有一个句柄生效，另一个订阅器 try_init 已失败
    let _ = RELOAD_HANDLE.set(handle);
  }
}

/// 调整日志级别，未初始化时先完成初始化
pub fn set_log_level(level: LogLevel) {
  match RELOAD_HANDLE.get() {
    Some(handle) => {
      if let Err(e) = handle.reload(LevelFilter::from(level)) {
        warn!("无法调整日志级别: {}", e);
      }
    }
    None => init_logging(level),
  }
}

/// 宿主入口：接受整数级别，越界时保留原级别并给出警告
pub fn set_log_level_raw(level: i32) -> Result<LogLevel, InvalidLogLevel> {
  let level = LogLevel::try_from(level).inspect_err(|e| warn!("{}", e))?;
  set_log_level(level);
  Ok(level)
}

/// 当前生效的日志级别
pub fn current_level() -> Option<LevelFilter> {
  RELOAD_HANDLE
    .get()
    .and_then(|handle| handle.clone_current())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integer_levels_follow_host_numbering() {
    assert_eq!(LogLevel::try_from(0), Ok(LogLevel::Trace));
    assert_eq!(LogLevel::try_from(4), Ok(LogLevel::Error));
    assert_eq!(LogLevel::try_from(6), Ok(LogLevel::Off));
    assert_eq!(LogLevel::try_from(7), Err(InvalidLogLevel(7)));
    assert_eq!(LogLevel::try_from(-1), Err(InvalidLogLevel(-1)));
  }

  #[test]
  fn critical_maps_to_error() {
    assert_eq!(LevelFilter::from(LogLevel::Critical), LevelFilter::ERROR);
    assert_eq!(LevelFilter::from(LogLevel::Off), LevelFilter::OFF);
  }

  #[test]
  fn runtime_level_changes() {
    init_logging(LogLevel::Info);
    // 测试进程里可能已有别的订阅器，此时没有句柄可以检查
    if current_level().is_none() {
      return;
    }
    assert_eq!(set_log_level_raw(1), Ok(LogLevel::Debug));
    assert_eq!(current_level(), Some(LevelFilter::DEBUG));
    assert!(set_log_level_raw(42).is_err());
    assert_eq!(current_level(), Some(LevelFilter::DEBUG));
    set_log_level(LogLevel::Warn);
    assert_eq!(current_level(), Some(LevelFilter::WARN));
  }
}
