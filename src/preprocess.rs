// 该文件是 Jianbox （检框） 项目的一部分。
// src/preprocess.rs - Letterbox 预处理
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
use thiserror::Error;
use tracing::debug;

use image::imageops::{self, FilterType};

use crate::frame::{Image, InputTensor, RGB_CHANNELS, RGBA_CHANNELS};

/// YOLO 系列训练时使用的 letterbox 灰色填充值
pub const LETTERBOX_PAD_VALUE: u8 = 114;
pub const DEFAULT_TARGET_SIZE: u32 = 640;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreprocessError {
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidImage { width: u32, height: u32 },
  #[error("不支持的通道数: {0}，仅支持 3 (RGB) 或 4 (RGBA)")]
  UnsupportedFormat(usize),
  #[error("目标尺寸无效: {0}")]
  InvalidTargetSize(u32),
}

/// 一次预处理所记录的缩放与填充，用于把模型空间的框映射回原图
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub src_width: u32,
  pub src_height: u32,
  pub target_size: u32,
}

impl LetterboxTransform {
  pub fn new(src_width: u32, src_height: u32, target_size: u32) -> Self {
    let target = target_size as f32;
    let scale = (target / src_width as f32).min(target / src_height as f32);
    Self {
      scale,
      pad_x: (target - src_width as f32 * scale) / 2.0,
      pad_y: (target - src_height as f32 * scale) / 2.0,
      src_width,
      src_height,
      target_size,
    }
  }

  /// 模型输入像素坐标 → 原图像素坐标
  pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
    ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
  }

  /// 模型输入像素坐标 → 原图归一化坐标（不裁剪）
  pub fn to_normalized(&self, x: f32, y: f32) -> (f32, f32) {
    let (sx, sy) = self.to_source(x, y);
    (sx / self.src_width as f32, sy / self.src_height as f32)
  }

  /// 原图归一化坐标 → 模型输入像素坐标
  pub fn to_model(&self, nx: f32, ny: f32) -> (f32, f32) {
    (
      nx * self.src_width as f32 * self.scale + self.pad_x,
      ny * self.src_height as f32 * self.scale + self.pad_y,
    )
  }
}

/// Letterbox 预处理器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
  target_size: u32,
  pad_value: u8,
}

impl Default for Letterbox {
  fn default() -> Self {
    Self::new(DEFAULT_TARGET_SIZE)
  }
}

impl Letterbox {
  pub fn new(target_size: u32) -> Self {
    Self {
      target_size,
      pad_value: LETTERBOX_PAD_VALUE,
    }
  }

  pub fn pad_value(mut self, pad_value: u8) -> Self {
    self.pad_value = pad_value;
    self
  }

  pub fn target_size(&self) -> u32 {
    self.target_size
  }

  pub fn apply(&self, image: &Image) -> Result<(InputTensor, LetterboxTransform), PreprocessError> {
    let (src_w, src_h) = (image.width(), image.height());
    if src_w == 0 || src_h == 0 {
      return Err(PreprocessError::InvalidImage {
        width: src_w,
        height: src_h,
      });
    }
    let channels = image.channels();
    if channels != RGB_CHANNELS && channels != RGBA_CHANNELS {
      return Err(PreprocessError::UnsupportedFormat(channels));
    }
    if self.target_size == 0 {
      return Err(PreprocessError::InvalidTargetSize(self.target_size));
    }

    let transform = LetterboxTransform::new(src_w, src_h, self.target_size);
    let (new_w, new_h) = content_size(src_w, src_h, self.target_size);
    let off_x = (self.target_size - new_w) / 2;
    let off_y = (self.target_size - new_h) / 2;

    debug!(
      "Letterbox: {}x{} -> {}x{}, 缩放 {:.4}, 偏移 ({}, {})",
      src_w, src_h, new_w, new_h, transform.scale, off_x, off_y
    );

    let rgb = image.to_rgb8();
    let resized = if (new_w, new_h) == (src_w, src_h) {
      rgb
    } else {
      imageops::resize(&rgb, new_w, new_h, FilterType::Triangle)
    };

    let mut tensor = InputTensor::filled(self.target_size, self.pad_value as f32 / 255.0);
    let size = self.target_size as usize;
    let plane = size * size;
    let out = tensor.as_mut();

    for (x, y, pixel) in resized.enumerate_pixels() {
      let dst = (y + off_y) as usize * size + (x + off_x) as usize;
      for (c, &value) in pixel.0.iter().enumerate() {
        out[c * plane + dst] = value as f32 / 255.0;
      }
    }

    Ok((tensor, transform))
  }
}

/// 以默认填充值对图像做 letterbox
pub fn preprocess(
  image: &Image,
  target_size: u32,
) -> Result<(InputTensor, LetterboxTransform), PreprocessError> {
  Letterbox::new(target_size).apply(image)
}

// 缩放后内容区的尺寸，向下取整且至少为 1
fn content_size(src_w: u32, src_h: u32, target: u32) -> (u32, u32) {
  let (w, h, t) = (src_w as u64, src_h as u64, target as u64);
  let (new_w, new_h) = if w >= h { (t, h * t / w) } else { (w * t / h, t) };
  (new_w.max(1) as u32, new_h.max(1) as u32)
}
