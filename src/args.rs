// 该文件是 Jianbox （检框） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use url::Url;

use crate::{
  config::DetectorConfig,
  model::ClassLabels,
  postprocess::{ScoreActivation, TensorOrder},
};

/// Jianbox 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出来源，例如 `tensor:///data/out.bin?shape=1,84,8400&input=640`
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 单张图片: image:///path/to/a.jpg
  /// - 图片目录: folder:///path/to/images
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - JSON 行: json:///path/to/out.jsonl 或 json:-
  /// - 图片: image:///path/to/out.png
  /// - 目录记录: folder:///path/to/record?record=name&always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// JSON 配置文件，命令行参数优先
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 类别名称文件，每行一个；缺省为 COCO 80 类
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 模型输入边长
  #[arg(long, value_name = "PIXELS")]
  pub size: Option<u32>,

  /// 置信度阈值 (0.0 - 1.0]
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// NMS IOU 阈值 [0.0 - 1.0]
  #[arg(long, value_name = "THRESHOLD")]
  pub nms_threshold: Option<f32>,

  /// 每帧最多保留的检测数
  #[arg(long, value_name = "COUNT")]
  pub max_detections: Option<usize>,

  /// 类别分数为 logit，需要先做 sigmoid
  #[arg(long)]
  pub sigmoid: bool,

  /// 输出张量为 [1, N, 4+C] 排列
  #[arg(long)]
  pub anchor_major: bool,

  /// 最大处理帧数（仅对连续任务有效）
  #[arg(long, value_name = "COUNT")]
  pub frames: Option<usize>,
}

impl Args {
  /// 合并配置文件与命令行参数，并校验结果
  pub fn detector_config(&self) -> anyhow::Result<DetectorConfig> {
    let mut config = match self.config {
      Some(ref path) => DetectorConfig::from_json_file(path)?,
      None => DetectorConfig::default(),
    };

    if let Some(size) = self.size {
      config.target_size = size;
    }
    if let Some(confidence) = self.confidence {
      config.confidence_threshold = confidence;
    }
    if let Some(iou) = self.nms_threshold {
      config.iou_threshold = iou;
    }
    if let Some(max) = self.max_detections {
      config.max_detections = max;
    }
    if self.sigmoid {
      config.activation = ScoreActivation::Sigmoid;
    }
    if self.anchor_major {
      config.order = TensorOrder::AnchorMajor;
    }

    config.validate()?;
    info!("检测配置: {:?}", config);
    Ok(config)
  }

  pub fn class_labels(&self) -> anyhow::Result<ClassLabels> {
    let labels = match self.labels {
      Some(ref path) => ClassLabels::from_file(path)?,
      None => ClassLabels::coco(),
    };
    info!("共 {} 个类别", labels.len());
    Ok(labels)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_overrides_defaults() {
    let args = Args::parse_from([
      "detect",
      "--model",
      "tensor:///tmp/out.bin?shape=1,84,8400",
      "--input",
      "image:///tmp/a.jpg",
      "--output",
      "json:-",
      "--confidence",
      "0.5",
      "--max-detections",
      "10",
      "--sigmoid",
      "--anchor-major",
    ]);
    let config = args.detector_config().unwrap();
    assert_eq!(config.confidence_threshold, 0.5);
    assert_eq!(config.iou_threshold, 0.45);
    assert_eq!(config.max_detections, 10);
    assert_eq!(config.activation, ScoreActivation::Sigmoid);
    assert_eq!(config.order, TensorOrder::AnchorMajor);
    assert_eq!(args.class_labels().unwrap().len(), 80);
  }

  #[test]
  fn config_file_then_cli() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("detector.json");
    std::fs::write(&path, r#"{"target_size": 320, "iou_threshold": 0.6}"#).unwrap();

    let args = Args::parse_from([
      "detect",
      "--model",
      "tensor:///tmp/out.bin?shape=1,84,2100",
      "--input",
      "image:///tmp/a.jpg",
      "--output",
      "json:-",
      "--config",
      path.to_str().unwrap(),
      "--nms-threshold",
      "0.3",
    ]);
    let config = args.detector_config().unwrap();
    assert_eq!(config.target_size, 320);
    assert_eq!(config.iou_threshold, 0.3);
  }

  #[test]
  fn invalid_override_is_rejected() {
    let args = Args::parse_from([
      "detect",
      "--model",
      "tensor:///tmp/out.bin?shape=1,84,8400",
      "--input",
      "image:///tmp/a.jpg",
      "--output",
      "json:-",
      "--confidence",
      "0",
    ]);
    assert!(args.detector_config().is_err());
  }
}
