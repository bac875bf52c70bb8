// 该文件是 Jianbox （检框） 项目的一部分。
// src/config.rs - 检测器配置
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::postprocess::{
  DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS, DecodeOptions,
  ScoreActivation, TensorOrder,
};
use crate::preprocess::{DEFAULT_TARGET_SIZE, LETTERBOX_PAD_VALUE, Letterbox};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("配置项 {field} 无效: {reason}")]
  InvalidValue { field: &'static str, reason: String },
}

/// 检测器的全部可调参数
///
/// `target_size` 必须与模型的输入尺寸一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
  pub target_size: u32,
  pub pad_value: u8,
  pub order: TensorOrder,
  pub activation: ScoreActivation,
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub max_detections: usize,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      target_size: DEFAULT_TARGET_SIZE,
      pad_value: LETTERBOX_PAD_VALUE,
      order: TensorOrder::BoxMajor,
      activation: ScoreActivation::Identity,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_detections: DEFAULT_MAX_DETECTIONS,
    }
  }
}

impl DetectorConfig {
  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    Self::from_json_str(&std::fs::read_to_string(path)?)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.target_size == 0 {
      return Err(ConfigError::InvalidValue {
        field: "target_size",
        reason: "必须大于 0".into(),
      });
    }
    self
      .decode_options()
      .validate()
      .map_err(|e| ConfigError::InvalidValue {
        field: "decode",
        reason: e.to_string(),
      })
  }

  pub fn letterbox(&self) -> Letterbox {
    Letterbox::new(self.target_size).pad_value(self.pad_value)
  }

  pub fn decode_options(&self) -> DecodeOptions {
    DecodeOptions::new(
      self.confidence_threshold,
      self.iou_threshold,
      self.max_detections,
    )
    .activation(self.activation)
  }
}
