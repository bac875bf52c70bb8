// 该文件是 Jianbox （检框） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{
  frame::Image,
  model::{BoundingBox, DetectResult},
};

const BOX_THICKNESS: i32 = 2;

// 按类别索引循环取色
const PALETTE: [[u8; 3]; 8] = [
  [255, 56, 56],
  [255, 157, 151],
  [255, 112, 31],
  [255, 178, 29],
  [207, 210, 49],
  [72, 249, 10],
  [26, 147, 52],
  [0, 0, 255],
];

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for Image {
  fn to_rgb_image(&self) -> RgbImage {
    self.to_rgb8()
  }
}

pub struct Draw {
  thickness: i32,
  palette: Vec<[u8; 3]>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      palette: PALETTE.to_vec(),
    }
  }
}

impl Draw {
  pub fn with_thickness(mut self, thickness: i32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  pub fn color_of(&self, class_index: usize) -> [u8; 3] {
    self.palette[class_index % self.palette.len()]
  }

  // 在图像上绘制一个矩形边框，bbox 为归一化坐标
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BoundingBox, color: [u8; 3]) {
    let (w, h) = (image.width() as f32, image.height() as f32);

    let x_min = ((bbox.x * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((bbox.y * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((bbox.x_max() * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((bbox.y_max() * h).ceil() as i32).clamp(0, h as i32 - 1);

    // 向内加粗
    for t in 0..self.thickness {
      let (x0, y0) = (x_min + t, y_min + t);
      let (x1, y1) = (x_max - t, y_max - t);
      if x0 >= x1 || y0 >= y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for det in result.iter() {
      self.draw_bbox(image, &det.bbox, self.color_of(det.class_index));
    }
  }

  pub fn draw_detection<F: ToRgbImage>(&self, frame: &F, result: &DetectResult) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

/// 文本记录，每行 `name, score, x_min, y_min, x_max, y_max`
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn format(&self, result: &DetectResult) -> String {
    result
      .iter()
      .map(|det| {
        let name = if self.label_with_name {
          det.class_name.clone()
        } else {
          det.class_index.to_string()
        };
        let [x_min, y_min, x_max, y_max] = det.bbox.corners();
        format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          name, det.confidence, x_min, y_min, x_max, y_max
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn record(&self, result: &DetectResult, path: &std::path::Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(result))
  }
}
