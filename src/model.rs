// 该文件是 Jianbox （检框） 项目的一部分。
// src/model.rs - 模型边界与检测结果
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

use serde::{Deserialize, Serialize};

use crate::frame::InputTensor;

/// 推理引擎边界：接收固定形状的输入张量，返回一个或多个输出张量
///
/// 引擎的后端、精度与硬件加速都与解码无关。
pub trait InferenceEngine {
  type Error;

  fn run(&self, input: &InputTensor) -> Result<Vec<EngineOutput>, Self::Error>;
}

/// 引擎输出的一个张量
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

/// 归一化到原图 `[0, 1]` 的框，左上角加宽高
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn x_max(&self) -> f32 {
    self.x + self.width
  }

  pub fn y_max(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  /// [x_min, y_min, x_max, y_max]
  pub fn corners(&self) -> [f32; 4] {
    [self.x, self.y, self.x_max(), self.y_max()]
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class_index: usize,
  pub class_name: String,
  pub confidence: f32,
  pub bbox: BoundingBox,
}

/// 一帧图像的检测结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod labels;
mod replay;

pub use self::labels::{COCO_LABELS, ClassLabels};
pub use self::replay::{ReplayEngine, ReplayEngineError, encode_f32_le};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bbox_corners() {
    let b = BoundingBox {
      x: 0.25,
      y: 0.5,
      width: 0.5,
      height: 0.25,
    };
    assert_eq!(b.corners(), [0.25, 0.5, 0.75, 0.75]);
    assert_eq!(b.area(), 0.125);
  }

  #[test]
  fn detection_serializes_to_json() {
    let det = Detection {
      class_index: 16,
      class_name: "dog".to_string(),
      confidence: 0.5,
      bbox: BoundingBox {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
      },
    };
    let json = serde_json::to_value(&det).unwrap();
    assert_eq!(json["class_name"], "dog");
    assert_eq!(json["bbox"]["width"], 1.0);
    let back: Detection = serde_json::from_value(json).unwrap();
    assert_eq!(back, det);
  }
}
