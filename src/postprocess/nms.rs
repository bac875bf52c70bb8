// 该文件是 Jianbox （检框） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use super::decode::{Candidate, box_area};

/// 计算两个角点形式框 `[x_min, y_min, x_max, y_max]` 的 IoU
///
/// 任一框面积为零时返回 0。
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let area_a = box_area(a);
  let area_b = box_area(b);
  if area_a <= 0.0 || area_b <= 0.0 {
    return 0.0;
  }

  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 分数降序，同分时锚点索引升序
fn by_rank(a: &Candidate, b: &Candidate) -> Ordering {
  b.score
    .total_cmp(&a.score)
    .then_with(|| a.anchor.cmp(&b.anchor))
}

/// 按类别独立进行贪心 NMS，返回保留的候选索引
///
/// 候选保存在一个固定数组中，抑制状态用一个布尔标记数组表示。
pub fn class_aware_nms(candidates: &[Candidate], iou_threshold: f32) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len()).collect();
  order.sort_by(|&i, &j| {
    let (a, b) = (&candidates[i], &candidates[j]);
    a.class_index
      .cmp(&b.class_index)
      .then_with(|| by_rank(a, b))
  });

  let mut suppressed = vec![false; candidates.len()];
  let mut keep = Vec::new();

  for group in order.chunk_by(|&i, &j| candidates[i].class_index == candidates[j].class_index) {
    for (pos, &i) in group.iter().enumerate() {
      if suppressed[i] {
        continue;
      }
      keep.push(i);
      let selected = &candidates[i].bbox;
      for &j in &group[pos + 1..] {
        if !suppressed[j] && iou(selected, &candidates[j].bbox) > iou_threshold {
          suppressed[j] = true;
        }
      }
    }
  }

  keep
}

/// 合并所有类别的保留结果，按分数降序排序并截断
pub fn rank_and_truncate(
  candidates: &[Candidate],
  mut keep: Vec<usize>,
  max_detections: usize,
) -> Vec<usize> {
  keep.sort_by(|&i, &j| by_rank(&candidates[i], &candidates[j]));
  keep.truncate(max_detections);
  keep
}
