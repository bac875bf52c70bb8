// 该文件是 Jianbox （检框） 项目的一部分。
// src/postprocess.rs - 检测结果解码与抑制
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

//! 把检测模型的原始输出 `[1, 4 + C, N]` 变为带标签的检测结果。
//!
//! 处理顺序：逐锚点取最高类别分数并按置信度过滤，转为角点形式，
//! 按类别做贪心 NMS，合并后按分数排序截断，最后经 letterbox 逆变换
//! 归一化到原图并裁剪到 `[0, 1]`。相同输入总是得到完全相同的输出。

use thiserror::Error;
use tracing::debug;

use crate::model::{BoundingBox, Detection};
use crate::preprocess::LetterboxTransform;

mod decode;
mod layout;
mod nms;

pub use self::decode::{Candidate, decode_candidates};
pub use self::layout::{BOX_ROWS, OutputLayout, RawOutputTensor, ScoreActivation, TensorOrder};
pub use self::nms::{class_aware_nms, iou, rank_and_truncate};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostprocessError {
  #[error("输出张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  ShapeMismatch { expected: usize, actual: usize },
  #[error("输出张量形状无效: {0:?}")]
  InvalidShape(Vec<usize>),
  #[error("类别索引 {index} 超出标签范围 (共 {len} 个标签)")]
  LabelIndexOutOfRange { index: usize, len: usize },
  #[error("参数无效: {0}")]
  InvalidParameter(String),
}

/// 解码参数，均由调用方显式给出
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub max_detections: usize,
  pub activation: ScoreActivation,
}

impl Default for DecodeOptions {
  fn default() -> Self {
    Self::new(
      DEFAULT_CONFIDENCE_THRESHOLD,
      DEFAULT_IOU_THRESHOLD,
      DEFAULT_MAX_DETECTIONS,
    )
  }
}

impl DecodeOptions {
  pub fn new(confidence_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
    Self {
      confidence_threshold,
      iou_threshold,
      max_detections,
      activation: ScoreActivation::Identity,
    }
  }

  pub fn activation(mut self, activation: ScoreActivation) -> Self {
    self.activation = activation;
    self
  }

  pub fn validate(&self) -> Result<(), PostprocessError> {
    let conf = self.confidence_threshold;
    if !(conf > 0.0 && conf <= 1.0) {
      return Err(PostprocessError::InvalidParameter(format!(
        "置信度阈值须在 (0, 1] 内，实际为 {}",
        conf
      )));
    }
    let iou = self.iou_threshold;
    if !(0.0..=1.0).contains(&iou) {
      return Err(PostprocessError::InvalidParameter(format!(
        "IoU 阈值须在 [0, 1] 内，实际为 {}",
        iou
      )));
    }
    Ok(())
  }
}

/// 解码、抑制并映射回原图
///
/// 任何错误都在产生结果之前返回，不会得到部分结果。
pub fn postprocess<S: AsRef<str>>(
  raw: &RawOutputTensor<'_>,
  transform: &LetterboxTransform,
  class_labels: &[S],
  options: &DecodeOptions,
) -> Result<Vec<Detection>, PostprocessError> {
  options.validate()?;

  let candidates = decode_candidates(raw, options.activation, options.confidence_threshold);
  debug!(
    "置信度过滤: {} 个锚点中保留 {} 个候选框",
    raw.num_anchors(),
    candidates.len()
  );

  let keep = class_aware_nms(&candidates, options.iou_threshold);
  debug!("NMS 后剩余 {} 个候选框", keep.len());

  let keep = rank_and_truncate(&candidates, keep, options.max_detections);

  let mut detections = Vec::with_capacity(keep.len());
  for i in keep {
    let candidate = &candidates[i];
    let Some(bbox) = to_source_box(&candidate.bbox, transform) else {
      continue;
    };
    let class_name = class_labels
      .get(candidate.class_index)
      .ok_or(PostprocessError::LabelIndexOutOfRange {
        index: candidate.class_index,
        len: class_labels.len(),
      })?
      .as_ref()
      .to_string();

    detections.push(Detection {
      class_index: candidate.class_index,
      class_name,
      confidence: candidate.score,
      bbox,
    });
  }

  debug!("输出 {} 个检测结果", detections.len());
  Ok(detections)
}

/// 模型空间角点框 → 原图归一化框，裁剪后面积为零则丢弃
fn to_source_box(bbox: &[f32; 4], transform: &LetterboxTransform) -> Option<BoundingBox> {
  let (x1, y1) = transform.to_normalized(bbox[0], bbox[1]);
  let (x2, y2) = transform.to_normalized(bbox[2], bbox[3]);
  let (x1, y1) = (x1.clamp(0.0, 1.0), y1.clamp(0.0, 1.0));
  let (x2, y2) = (x2.clamp(0.0, 1.0), y2.clamp(0.0, 1.0));

  let (width, height) = (x2 - x1, y2 - y1);
  // NaN 坐标也在这里被排除
  if !(width > 0.0 && height > 0.0) {
    return None;
  }

  Some(BoundingBox {
    x: x1,
    y: y1,
    width,
    height,
  })
}
