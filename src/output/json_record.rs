// 该文件是 Jianbox （检框） 项目的一部分。
// src/output/json_record.rs - JSON Lines 检测记录
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

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Image,
  model::{DetectResult, Detection},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  frame: usize,
  width: u32,
  height: u32,
  detections: &'a [Detection],
}

/// 每帧追加一行 JSON；路径为 `-` 时写到标准输出
///
/// `json:///tmp/out.jsonl`，`json:-`
pub struct JsonRecordOutput {
  path: Option<PathBuf>,
  frame_counter: AtomicUsize,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = match uri.path() {
      "-" | "" => None,
      path => {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent()
          && !parent.as_os_str().is_empty()
        {
          std::fs::create_dir_all(parent)?;
        }
        // 新的一次运行覆盖旧记录
        std::fs::File::create(&path)?;
        Some(path)
      }
    };

    Ok(JsonRecordOutput {
      path,
      frame_counter: AtomicUsize::new(0),
    })
  }
}

impl JsonRecordOutput {
  fn write_line(&self, line: &str) -> Result<(), JsonRecordOutputError> {
    match &self.path {
      Some(path) => {
        let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
        writeln!(file, "{}", line)?;
      }
      None => {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
      }
    }
    Ok(())
  }
}

impl Render<Image, DetectResult> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, frame: &Image, result: &DetectResult) -> Result<(), Self::Error> {
    let record = FrameRecord {
      frame: self.frame_counter.fetch_add(1, Ordering::Relaxed),
      width: frame.width(),
      height: frame.height(),
      detections: &result.items,
    };
    let line = serde_json::to_string(&record)?;
    debug!("写入 JSON 记录: {} 字节", line.len());
    self.write_line(&line)
  }
}
