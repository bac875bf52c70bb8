// 该文件是 Jianbox （检框） 项目的一部分。
// src/frame.rs - 图像与输入张量定义
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
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;
pub const RGBA_CHANNELS: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 解码后的图像，按行存储的交错像素 (HWC)
///
/// 通道顺序固定为 RGB，若有第四个通道则视为 alpha，预处理时丢弃。
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
  width: u32,
  height: u32,
  channels: usize,
  data: Box<[u8]>,
}

impl Image {
  pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = width as usize * height as usize * channels;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      channels,
      data: data.into_boxed_slice(),
    })
  }

  /// 以单一颜色填充的 RGB 图像
  pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
    let pixels = width as usize * height as usize;
    let data = rgb.iter().copied().cycle().take(pixels * RGB_CHANNELS).collect::<Vec<_>>();
    Self {
      width,
      height,
      channels: RGB_CHANNELS,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.data
  }

  /// 读取 (x, y) 处像素的 RGB 分量
  pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = (y as usize * self.width as usize + x as usize) * self.channels;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 丢弃 alpha 后的 RGB 副本
  pub fn to_rgb8(&self) -> RgbImage {
    if self.channels == RGB_CHANNELS
      && let Some(image) = RgbImage::from_raw(self.width, self.height, self.data.to_vec())
    {
      return image;
    }
    RgbImage::from_fn(self.width, self.height, |x, y| Rgb(self.rgb_at(x, y)))
  }
}

impl From<image::DynamicImage> for Image {
  fn from(image: image::DynamicImage) -> Self {
    let (width, height) = (image.width(), image.height());
    if image.color().has_alpha() {
      Self {
        width,
        height,
        channels: RGBA_CHANNELS,
        data: image.to_rgba8().into_raw().into_boxed_slice(),
      }
    } else {
      Self {
        width,
        height,
        channels: RGB_CHANNELS,
        data: image.to_rgb8().into_raw().into_boxed_slice(),
      }
    }
  }
}

impl From<RgbImage> for Image {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      channels: RGB_CHANNELS,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

/// 模型输入张量，形状 `[1, 3, size, size]`，NCHW 排布，取值 `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
  size: u32,
  data: Box<[f32]>,
}

impl InputTensor {
  /// 以常数填充的方形张量
  pub fn filled(size: u32, value: f32) -> Self {
    let len = RGB_CHANNELS * size as usize * size as usize;
    Self {
      size,
      data: vec![value; len].into_boxed_slice(),
    }
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn shape(&self) -> [usize; 4] {
    let s = self.size as usize;
    [1, RGB_CHANNELS, s, s]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn into_inner(self) -> Box<[f32]> {
    self.data
  }

  /// 单个通道平面，c ∈ {0: R, 1: G, 2: B}
  pub fn plane(&self, c: usize) -> &[f32] {
    let plane = self.size as usize * self.size as usize;
    &self.data[c * plane..(c + 1) * plane]
  }

  pub fn value_at(&self, c: usize, x: u32, y: u32) -> f32 {
    self.plane(c)[y as usize * self.size as usize + x as usize]
  }
}

impl AsMut<[f32]> for InputTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn image_rejects_wrong_length() {
    let err = Image::new(2, 2, 3, vec![0; 11]).unwrap_err();
    assert_eq!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 11
      }
    );
  }

  #[test]
  fn image_accepts_zero_dimensions() {
    let image = Image::new(0, 5, 3, Vec::new()).unwrap();
    assert_eq!(image.width(), 0);
    assert_eq!(image.height(), 5);
  }

  #[test]
  fn filled_image_repeats_color() {
    let image = Image::filled(3, 2, [1, 2, 3]);
    assert_eq!(image.as_slice().len(), 18);
    assert_eq!(image.rgb_at(2, 1), [1, 2, 3]);
  }

  #[test]
  fn tensor_planes_are_channel_first() {
    let mut tensor = InputTensor::filled(2, 0.0);
    tensor.as_mut()[4] = 1.0;
    assert_eq!(tensor.shape(), [1, 3, 2, 2]);
    assert_eq!(tensor.plane(1)[0], 1.0);
    assert_eq!(tensor.value_at(1, 0, 0), 1.0);
    assert_eq!(tensor.value_at(0, 0, 0), 0.0);
  }
}
