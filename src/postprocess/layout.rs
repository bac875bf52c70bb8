// 该文件是 Jianbox （检框） 项目的一部分。
// src/postprocess/layout.rs - 原始输出张量布局描述
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

use super::PostprocessError;

/// 每个锚点的框参数个数: cx, cy, w, h
pub const BOX_ROWS: usize = 4;

/// 输出张量的轴顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorOrder {
  /// `[1, 4 + C, N]`，YOLOv8 / YOLO11 默认导出格式
  #[default]
  BoxMajor,
  /// `[1, N, 4 + C]`，转置后的导出格式
  AnchorMajor,
}

/// 类别分数是否需要激活
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreActivation {
  /// 分数已经是概率，超过 1 的值在解码时截为 1
  #[default]
  Identity,
  /// 分数为 logits，需要 sigmoid
  Sigmoid,
}

impl ScoreActivation {
  pub fn apply(self, x: f32) -> f32 {
    match self {
      ScoreActivation::Identity => x,
      ScoreActivation::Sigmoid => sigmoid(x),
    }
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 原始输出的布局描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
  pub order: TensorOrder,
  pub num_classes: usize,
  pub num_anchors: usize,
}

impl OutputLayout {
  pub fn box_major(num_classes: usize, num_anchors: usize) -> Self {
    Self {
      order: TensorOrder::BoxMajor,
      num_classes,
      num_anchors,
    }
  }

  pub fn anchor_major(num_classes: usize, num_anchors: usize) -> Self {
    Self {
      order: TensorOrder::AnchorMajor,
      num_classes,
      num_anchors,
    }
  }

  /// 按声明的轴顺序解析形状，可带也可不带值为 1 的批次维
  pub fn from_shape(shape: &[usize], order: TensorOrder) -> Result<Self, PostprocessError> {
    let dims = match shape {
      [1, a, b] | [a, b] => (*a, *b),
      _ => return Err(PostprocessError::InvalidShape(shape.to_vec())),
    };
    let (features, anchors) = match order {
      TensorOrder::BoxMajor => dims,
      TensorOrder::AnchorMajor => (dims.1, dims.0),
    };
    if features <= BOX_ROWS {
      return Err(PostprocessError::InvalidShape(shape.to_vec()));
    }

    Ok(Self {
      order,
      num_classes: features - BOX_ROWS,
      num_anchors: anchors,
    })
  }

  pub fn features(&self) -> usize {
    BOX_ROWS + self.num_classes
  }

  pub fn expected_len(&self) -> usize {
    self.features() * self.num_anchors
  }

  #[inline]
  fn index(&self, anchor: usize, row: usize) -> usize {
    match self.order {
      TensorOrder::BoxMajor => row * self.num_anchors + anchor,
      TensorOrder::AnchorMajor => anchor * self.features() + row,
    }
  }
}

/// 对引擎原始输出的只读视图
#[derive(Debug, Clone, Copy)]
pub struct RawOutputTensor<'a> {
  data: &'a [f32],
  layout: OutputLayout,
}

impl<'a> RawOutputTensor<'a> {
  pub fn new(data: &'a [f32], layout: OutputLayout) -> Result<Self, PostprocessError> {
    if layout.num_classes == 0 {
      return Err(PostprocessError::InvalidShape(vec![
        1,
        layout.features(),
        layout.num_anchors,
      ]));
    }
    let expected = layout.expected_len();
    if data.len() != expected {
      return Err(PostprocessError::ShapeMismatch {
        expected,
        actual: data.len(),
      });
    }
    Ok(Self { data, layout })
  }

  pub fn layout(&self) -> &OutputLayout {
    &self.layout
  }

  pub fn num_anchors(&self) -> usize {
    self.layout.num_anchors
  }

  pub fn num_classes(&self) -> usize {
    self.layout.num_classes
  }

  #[inline]
  pub fn get(&self, anchor: usize, row: usize) -> f32 {
    self.data[self.layout.index(anchor, row)]
  }

  #[inline]
  pub fn class_score(&self, anchor: usize, class: usize) -> f32 {
    self.get(anchor, BOX_ROWS + class)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_box_major_shape() {
    let layout = OutputLayout::from_shape(&[1, 84, 8400], TensorOrder::BoxMajor).unwrap();
    assert_eq!(layout.num_classes, 80);
    assert_eq!(layout.num_anchors, 8400);
    assert_eq!(layout.expected_len(), 84 * 8400);
  }

  #[test]
  fn parse_anchor_major_shape() {
    let layout = OutputLayout::from_shape(&[1, 8400, 84], TensorOrder::AnchorMajor).unwrap();
    assert_eq!(layout.num_classes, 80);
    assert_eq!(layout.num_anchors, 8400);
  }

  #[test]
  fn parse_shape_without_batch() {
    let layout = OutputLayout::from_shape(&[6, 3], TensorOrder::BoxMajor).unwrap();
    assert_eq!(layout, OutputLayout::box_major(2, 3));
  }

  #[test]
  fn reject_invalid_shapes() {
    for shape in [&[2, 84, 8400][..], &[84][..], &[1, 4, 10][..], &[1, 1, 2, 3][..]] {
      assert!(matches!(
        OutputLayout::from_shape(shape, TensorOrder::BoxMajor),
        Err(PostprocessError::InvalidShape(_))
      ));
    }
  }

  #[test]
  fn both_orders_address_the_same_logical_value() {
    // 2 个类别，3 个锚点
    let box_major: Vec<f32> = (0..18).map(|v| v as f32).collect();
    let mut anchor_major = vec![0.0; 18];
    for row in 0..6 {
      for anchor in 0..3 {
        anchor_major[anchor * 6 + row] = box_major[row * 3 + anchor];
      }
    }
    let a = RawOutputTensor::new(&box_major, OutputLayout::box_major(2, 3)).unwrap();
    let b = RawOutputTensor::new(&anchor_major, OutputLayout::anchor_major(2, 3)).unwrap();
    for anchor in 0..3 {
      for row in 0..6 {
        assert_eq!(a.get(anchor, row), b.get(anchor, row));
      }
    }
    assert_eq!(a.class_score(1, 1), 16.0);
  }

  #[test]
  fn length_mismatch_is_reported() {
    let data = vec![0.0; 10];
    assert_eq!(
      RawOutputTensor::new(&data, OutputLayout::box_major(1, 3)).unwrap_err(),
      PostprocessError::ShapeMismatch {
        expected: 15,
        actual: 10
      }
    );
  }

  #[test]
  fn sigmoid_activation() {
    assert_eq!(ScoreActivation::Identity.apply(3.0), 3.0);
    assert!((ScoreActivation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-6);
    assert!(ScoreActivation::Sigmoid.apply(10.0) > 0.999);
  }
}
