// 该文件是 Xiangsu （像素） 项目的一部分。
// src/host/exports.rs - 导出给宿主的 C ABI 函数
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

//! 每个构建只导出一个滤镜（`host_color_shift` 或 `host_segmentation`），
//! 两者导出同名符号。

use std::ffi::{CStr, c_char};

/// 把宿主传入的整数指针解码为消息，0 表示没有消息。
///
/// # Safety
///
/// 非 0 的 `ptr` 必须指向以 NUL 结尾的字符串。
#[cfg_attr(
  not(any(feature = "host_color_shift", feature = "host_segmentation")),
  allow(dead_code)
)]
pub unsafe fn exception_message(ptr: usize) -> Option<String> {
  if ptr == 0 {
    return None;
  }
  let text = unsafe { CStr::from_ptr(ptr as *const c_char) };
  Some(text.to_string_lossy().into_owned())
}

/// 两个滤镜共用的导出函数，`$session` 为 `LazyLock<Mutex<HostSession<_>>>`
#[allow(unused_macros)]
macro_rules! export_host_common {
  ($session:ident) => {
    fn session() -> std::sync::MutexGuard<'static, $crate::host::HostSession<SessionFilter>> {
      $session
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[allow(non_snake_case)]
    #[unsafe(no_mangle)]
    pub extern "C" fn setLogLevel(level: i32) {
      let _ = $crate::logging::set_log_level_raw(level);
    }

    /// 输出宿主捕获的异常信息；`ptr` 为 0 时输出最近一次记录的错误。
    ///
    /// # Safety
    ///
    /// 非 0 的 `ptr` 必须指向以 NUL 结尾的字符串。
    #[allow(non_snake_case)]
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn showExceptionMsg(ptr: usize) {
      let message = unsafe { $crate::host::exports::exception_message(ptr) };
      session().report_exception(message.as_deref());
    }

    #[allow(non_snake_case)]
    #[unsafe(no_mangle)]
    pub extern "C" fn getInputImageBuffer() -> *mut u8 {
      session().input_ptr()
    }

    #[allow(non_snake_case)]
    #[unsafe(no_mangle)]
    pub extern "C" fn getOutputImageBuffer() -> *mut u8 {
      session().output_ptr()
    }

    #[allow(non_snake_case)]
    #[unsafe(no_mangle)]
    pub extern "C" fn getMaxWidth() -> u32 {
      $crate::frame::MAX_WIDTH
    }

    #[allow(non_snake_case)]
    #[unsafe(no_mangle)]
    pub extern "C" fn getMaxHeight() -> u32 {
      $crate::frame::MAX_HEIGHT
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn exec(width: i32, height: i32) -> i32 {
      session().exec(width, height)
    }
  };
}

#[cfg(feature = "host_color_shift")]
pub mod color_shift {
  use std::sync::{LazyLock, Mutex};

  use crate::{filter::ColorShift, host::HostSession};

  type SessionFilter = ColorShift;

  static SESSION: LazyLock<Mutex<HostSession<SessionFilter>>> =
    LazyLock::new(|| Mutex::new(HostSession::new(ColorShift::default())));

  export_host_common!(SESSION);

}

#[cfg(feature = "host_segmentation")]
pub mod segmentation {
  use std::sync::{LazyLock, Mutex};

  use crate::{
    filter::Segmentation,
    host::HostSession,
    model::{TfliteSegmenter, TfliteSegmenterBuilder},
  };

  type SessionFilter = Segmentation<TfliteSegmenter>;

  static SESSION: LazyLock<Mutex<HostSession<SessionFilter>>> =
    LazyLock::new(|| Mutex::new(HostSession::new(Segmentation::default())));

  export_host_common!(SESSION);

  /// 从宿主文件系统的 `/model_float32.tflite` 加载模型
  #[allow(non_snake_case)]
  #[unsafe(no_mangle)]
  pub extern "C" fn loadModel() -> i32 {
    session().load_model(|| TfliteSegmenterBuilder::default().build())
  }

  #[allow(non_snake_case)]
  #[unsafe(no_mangle)]
  pub extern "C" fn getPreprocessDuration() -> f64 {
    session().durations().preprocess_ms()
  }

  #[allow(non_snake_case)]
  #[unsafe(no_mangle)]
  pub extern "C" fn getInferenceDuration() -> f64 {
    session().durations().inference_ms()
  }

  #[allow(non_snake_case)]
  #[unsafe(no_mangle)]
  pub extern "C" fn getPostprocessDuration() -> f64 {
    session().durations().postprocess_ms()
  }

  #[cfg(test)]
  mod tests {
    use super::*;
    use crate::host::Status;

    #[test]
    fn exports_report_missing_model() {
      assert_eq!(exec(4, 4), Status::ModelNotLoaded as i32);
      assert_eq!(getPreprocessDuration(), 0.0);
      assert_eq!(getInferenceDuration(), 0.0);
      assert_eq!(getPostprocessDuration(), 0.0);

      if !std::path::Path::new(crate::model::DEFAULT_MODEL_PATH).exists() {
        assert_eq!(loadModel(), Status::ModelLoadFailed as i32);
        assert!(
          session()
            .last_error()
            .is_some_and(|e| e.starts_with("模型加载失败"))
        );
        assert_eq!(exec(4, 4), Status::ModelNotLoaded as i32);
      }
      assert_eq!(exec(0, 0), Status::InvalidSize as i32);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn null_pointer_has_no_message() {
    assert_eq!(unsafe { exception_message(0) }, None);
  }

  #[test]
  fn host_message_is_decoded() {
    let message = c"std::bad_alloc";
    assert_eq!(
      unsafe { exception_message(message.as_ptr() as usize) },
      Some("std::bad_alloc".to_string())
    );
  }

  #[test]
  fn invalid_utf8_is_replaced() {
    let bytes = b"bad \xff byte\0";
    let decoded = unsafe { exception_message(bytes.as_ptr() as usize) };
    assert_eq!(decoded.as_deref(), Some("bad \u{fffd} byte"));
  }
}
