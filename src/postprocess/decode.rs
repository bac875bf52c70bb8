// 该文件是 Jianbox （检框） 项目的一部分。
// src/postprocess/decode.rs - 逐锚点解码与置信度过滤
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

use super::layout::{RawOutputTensor, ScoreActivation};

/// 通过置信度过滤的候选框，坐标为模型输入像素空间的角点形式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub anchor: usize,
  pub class_index: usize,
  pub score: f32,
  /// [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
}

impl Candidate {
  pub fn area(&self) -> f32 {
    box_area(&self.bbox)
  }
}

pub(crate) fn box_area(b: &[f32; 4]) -> f32 {
  (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

/// 找出每个锚点得分最高的类别，丢弃低于阈值的锚点
///
/// 取最大值时使用原始分数（sigmoid 单调），并列时保留索引最小的类别，
/// NaN 永远不会被选中。框参数只在通过阈值后才读取。输出分数不超过 1。
pub fn decode_candidates(
  raw: &RawOutputTensor<'_>,
  activation: ScoreActivation,
  confidence_threshold: f32,
) -> Vec<Candidate> {
  let mut candidates = Vec::new();

  for anchor in 0..raw.num_anchors() {
    let mut best = f32::NEG_INFINITY;
    let mut class_index = 0usize;
    for c in 0..raw.num_classes() {
      let value = raw.class_score(anchor, c);
      if value > best {
        best = value;
        class_index = c;
      }
    }

    let score = activation.apply(best);
    if !(score >= confidence_threshold) {
      continue;
    }
    // Identity 下超过 1 的分数视为 1
    let score = score.min(1.0);

    let cx = raw.get(anchor, 0);
    let cy = raw.get(anchor, 1);
    let w = raw.get(anchor, 2);
    let h = raw.get(anchor, 3);

    candidates.push(Candidate {
      anchor,
      class_index,
      score,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }

  candidates
}
