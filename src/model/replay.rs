// 该文件是 Jianbox （检框） 项目的一部分。
// src/model/replay.rs - 回放已录制的原始输出张量
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

use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::InputTensor,
  model::{EngineOutput, InferenceEngine},
};

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum ReplayEngineError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: &'static str, actual: String },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量形状无效: {0}")]
  InvalidShape(String),
  #[error("张量文件大小不匹配: 形状 {shape:?} 需要 {expected} 字节, 文件为 {actual} 字节")]
  SizeMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
  #[error("输入尺寸不匹配: 期望 {expected}, 实际 {actual}")]
  InputSizeMismatch { expected: u32, actual: u32 },
}

/// 从磁盘回放一份原始输出张量的推理引擎
///
/// 张量文件为小端 f32 的连续转储，URL 形如
/// `tensor:///path/out.bin?shape=1,84,8400&input=640`。
/// 每次 `run` 都返回同一份输出，可用于离线复现和回归测试。
#[derive(Debug, Clone)]
pub struct ReplayEngine {
  output: EngineOutput,
  input_size: Option<u32>,
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for ReplayEngine {
  type Error = ReplayEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayEngineError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let mut shape = None;
    let mut input_size = None;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "shape" => shape = Some(parse_shape(&v)?),
        "input" => {
          input_size = Some(
            v.parse::<u32>()
              .map_err(|_| ReplayEngineError::InvalidShape(format!("输入尺寸无效: {}", v)))?,
          )
        }
        _ => debug!("忽略未知参数: {}={}", k, v),
      }
    }
    let shape = shape.ok_or_else(|| ReplayEngineError::InvalidShape("缺少 shape 参数".into()))?;

    let engine = Self::load(url.path(), shape)?;
    Ok(match input_size {
      Some(size) => engine.input_size(size),
      None => engine,
    })
  }
}

impl ReplayEngine {
  pub fn new(output: EngineOutput) -> Self {
    Self {
      output,
      input_size: None,
    }
  }

  /// 要求输入张量为指定的方形尺寸
  pub fn input_size(mut self, size: u32) -> Self {
    self.input_size = Some(size);
    self
  }

  pub fn load<P: AsRef<Path>>(path: P, shape: Vec<usize>) -> Result<Self, ReplayEngineError> {
    let path = path.as_ref();
    info!("加载张量文件: {}", path.display());
    let bytes = std::fs::read(path)?;
    let data = decode_f32_le(&bytes, &shape)?;
    debug!("张量形状: {:?}, 元素数: {}", shape, data.len());
    Ok(Self::new(EngineOutput { shape, data }))
  }

  pub fn output(&self) -> &EngineOutput {
    &self.output
  }
}

impl InferenceEngine for ReplayEngine {
  type Error = ReplayEngineError;

  fn run(&self, input: &InputTensor) -> Result<Vec<EngineOutput>, Self::Error> {
    if let Some(expected) = self.input_size
      && input.size() != expected
    {
      return Err(ReplayEngineError::InputSizeMismatch {
        expected,
        actual: input.size(),
      });
    }
    Ok(vec![self.output.clone()])
  }
}

fn parse_shape(text: &str) -> Result<Vec<usize>, ReplayEngineError> {
  let shape = text
    .split(',')
    .map(|d| d.trim().parse::<usize>())
    .collect::<Result<Vec<_>, _>>()
    .map_err(|_| ReplayEngineError::InvalidShape(text.to_string()))?;
  if shape.is_empty() || shape.contains(&0) {
    return Err(ReplayEngineError::InvalidShape(text.to_string()));
  }
  Ok(shape)
}

fn decode_f32_le(bytes: &[u8], shape: &[usize]) -> Result<Vec<f32>, ReplayEngineError> {
  let expected = shape.iter().product::<usize>() * F32_BYTES;
  if bytes.len() != expected {
    return Err(ReplayEngineError::SizeMismatch {
      shape: shape.to_vec(),
      expected,
      actual: bytes.len(),
    });
  }
  Ok(
    bytes
      .chunks_exact(F32_BYTES)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect(),
  )
}

/// 把张量写为小端 f32 转储，与 [`ReplayEngine`] 的读取格式一致
pub fn encode_f32_le(data: &[f32]) -> Vec<u8> {
  data.iter().flat_map(|v| v.to_le_bytes()).collect()
}
