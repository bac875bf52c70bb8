// 该文件是 Jianbox （检框） 项目的一部分。
// tests/pipeline.rs - 预处理到后处理的整体测试
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

use approx::assert_abs_diff_eq;
use url::Url;

use jianbox::{
  FromUrl,
  config::DetectorConfig,
  frame::Image,
  model::{COCO_LABELS, ClassLabels, Detection, ReplayEngine, encode_f32_le},
  postprocess::{
    BOX_ROWS, DecodeOptions, OutputLayout, RawOutputTensor, ScoreActivation, postprocess,
  },
  preprocess::{LetterboxTransform, preprocess},
  task::Detector,
};

const COCO_ANCHORS: usize = 8400;

/// 按 [1, 4+C, N] 排列构造原始输出
struct TensorBuilder {
  num_classes: usize,
  num_anchors: usize,
  data: Vec<f32>,
}

impl TensorBuilder {
  fn new(num_classes: usize, num_anchors: usize) -> Self {
    Self {
      num_classes,
      num_anchors,
      data: vec![0.0; (BOX_ROWS + num_classes) * num_anchors],
    }
  }

  fn anchor(mut self, anchor: usize, bbox: [f32; 4], class: usize, score: f32) -> Self {
    let n = self.num_anchors;
    for (row, v) in bbox.into_iter().enumerate() {
      self.data[row * n + anchor] = v;
    }
    self.data[(BOX_ROWS + class) * n + anchor] = score;
    self
  }

  fn layout(&self) -> OutputLayout {
    OutputLayout::box_major(self.num_classes, self.num_anchors)
  }

  fn run(&self, transform: &LetterboxTransform, options: &DecodeOptions) -> Vec<Detection> {
    let raw = RawOutputTensor::new(&self.data, self.layout()).unwrap();
    postprocess(&raw, transform, &COCO_LABELS, options).unwrap()
  }
}

fn scenario_tensor() -> TensorBuilder {
  TensorBuilder::new(COCO_LABELS.len(), COCO_ANCHORS)
    // 图像中部的人
    .anchor(0, [320.0, 320.0, 100.0, 100.0], 0, 0.9)
    // 与上一个几乎重合，应被抑制
    .anchor(1, [322.0, 321.0, 100.0, 100.0], 0, 0.8)
    // 上半部分落在填充区，裁剪后保留
    .anchor(2, [100.0, 150.0, 50.0, 60.0], 2, 0.7)
    // 完全落在填充区，裁剪后面积为零
    .anchor(3, [300.0, 50.0, 40.0, 40.0], 5, 0.6)
    // 低于阈值
    .anchor(4, [500.0, 300.0, 30.0, 30.0], 16, 0.2)
}

#[test]
fn scenario_1280x720() {
  let image = Image::filled(1280, 720, [90, 90, 90]);
  let (tensor, transform) = preprocess(&image, 640).unwrap();
  assert_eq!(tensor.shape(), [1, 3, 640, 640]);
  assert_abs_diff_eq!(transform.scale, 0.5);
  assert_abs_diff_eq!(transform.pad_x, 0.0);
  assert_abs_diff_eq!(transform.pad_y, 140.0);

  let detections = scenario_tensor().run(&transform, &DecodeOptions::new(0.25, 0.45, 300));
  assert_eq!(detections.len(), 2);
  for d in &detections {
    assert!(d.bbox.y >= 0.0 && d.bbox.y_max() <= 1.0);
    assert!(d.bbox.x >= 0.0 && d.bbox.x_max() <= 1.0);
    assert!(d.bbox.width > 0.0 && d.bbox.height > 0.0);
  }

  let person = &detections[0];
  assert_eq!(person.class_name, "person");
  assert_abs_diff_eq!(person.confidence, 0.9);
  assert_abs_diff_eq!(person.bbox.x, 540.0 / 1280.0, epsilon = 1e-6);
  assert_abs_diff_eq!(person.bbox.y, 260.0 / 720.0, epsilon = 1e-6);
  assert_abs_diff_eq!(person.bbox.width, 200.0 / 1280.0, epsilon = 1e-6);
  assert_abs_diff_eq!(person.bbox.height, 200.0 / 720.0, epsilon = 1e-6);

  let car = &detections[1];
  assert_eq!(car.class_name, "car");
  assert_eq!(car.bbox.y, 0.0);
  assert_abs_diff_eq!(car.bbox.y_max(), 80.0 / 720.0, epsilon = 1e-6);
}

#[test]
fn corners_round_trip() {
  for &(w, h, t) in &[(1280, 720, 640), (3, 1000, 640), (17, 17, 320), (640, 640, 640)] {
    let transform = LetterboxTransform::new(w, h, t);
    let (x0, y0) = transform.to_model(0.0, 0.0);
    let (x1, y1) = transform.to_model(1.0, 1.0);
    let (nx0, ny0) = transform.to_normalized(x0, y0);
    let (nx1, ny1) = transform.to_normalized(x1, y1);
    assert_abs_diff_eq!(nx0, 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(ny0, 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(nx1, 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(ny1, 1.0, epsilon = 1e-5);
  }
}

/// 线性同余发生器，测试里只需要可复现的伪随机数
struct Lcg(u64);

impl Lcg {
  fn next_f32(&mut self) -> f32 {
    self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (self.0 >> 40) as f32 / (1u64 << 24) as f32
  }
}

fn noisy_tensor(num_classes: usize, num_anchors: usize) -> TensorBuilder {
  let mut rng = Lcg(7);
  let mut builder = TensorBuilder::new(num_classes, num_anchors);
  for anchor in 0..num_anchors {
    let bbox = [
      rng.next_f32() * 640.0,
      rng.next_f32() * 640.0,
      8.0 + rng.next_f32() * 120.0,
      8.0 + rng.next_f32() * 120.0,
    ];
    let class = (rng.next_f32() * num_classes as f32) as usize % num_classes;
    builder = builder.anchor(anchor, bbox, class, rng.next_f32());
  }
  builder
}

#[test]
fn raising_confidence_never_adds_detections() {
  let builder = noisy_tensor(4, 2000);
  let transform = LetterboxTransform::new(640, 480, 640);

  let mut last = usize::MAX;
  for threshold in [0.05, 0.1, 0.25, 0.4, 0.5, 0.75, 0.9, 0.99] {
    let n = builder
      .run(&transform, &DecodeOptions::new(threshold, 0.45, 10_000))
      .len();
    assert!(n <= last, "threshold {} gave {} > {}", threshold, n, last);
    last = n;
  }
}

#[test]
fn postprocess_is_deterministic() {
  let builder = noisy_tensor(3, 4000);
  let transform = LetterboxTransform::new(1920, 1080, 640);
  let options = DecodeOptions::new(0.3, 0.5, 300);
  let a = builder.run(&transform, &options);
  let b = builder.run(&transform, &options);
  assert!(!a.is_empty());
  assert_eq!(a, b);
}

#[test]
fn duplicate_boxes_keep_the_stronger() {
  let builder = TensorBuilder::new(2, 2)
    .anchor(0, [50.0, 50.0, 20.0, 20.0], 1, 0.8)
    .anchor(1, [50.0, 50.0, 20.0, 20.0], 1, 0.9);
  let raw = RawOutputTensor::new(&builder.data, builder.layout()).unwrap();
  let detections = postprocess(
    &raw,
    &LetterboxTransform::new(100, 100, 100),
    &["a", "b"],
    &DecodeOptions::new(0.25, 0.5, 300),
  )
  .unwrap();
  assert_eq!(detections.len(), 1);
  assert_abs_diff_eq!(detections[0].confidence, 0.9);
}

#[test]
fn classes_do_not_suppress_each_other() {
  let builder = TensorBuilder::new(2, 2)
    .anchor(0, [50.0, 50.0, 20.0, 20.0], 0, 0.9)
    .anchor(1, [50.0, 50.0, 20.0, 20.0], 1, 0.8);
  let raw = RawOutputTensor::new(&builder.data, builder.layout()).unwrap();
  let detections = postprocess(
    &raw,
    &LetterboxTransform::new(100, 100, 100),
    &["a", "b"],
    &DecodeOptions::new(0.25, 0.5, 300),
  )
  .unwrap();
  let classes: Vec<_> = detections.iter().map(|d| d.class_index).collect();
  assert_eq!(classes, vec![0, 1]);
}

#[test]
fn global_cap_keeps_the_top_scores() {
  // 500 个互不重叠的 10x10 框
  let mut builder = TensorBuilder::new(1, 500);
  for i in 0..500 {
    let (col, row) = ((i % 25) as f32, (i / 25) as f32);
    let bbox = [col * 25.0 + 10.0, row * 25.0 + 10.0, 10.0, 10.0];
    builder = builder.anchor(i, bbox, 0, 0.3 + i as f32 * 0.001);
  }
  let transform = LetterboxTransform::new(640, 640, 640);

  let all = builder.run(&transform, &DecodeOptions::new(0.25, 0.45, 1000));
  assert_eq!(all.len(), 500);

  let capped = builder.run(&transform, &DecodeOptions::new(0.25, 0.45, 100));
  assert_eq!(capped.len(), 100);
  assert!(capped.windows(2).all(|w| w[0].confidence >= w[1].confidence));
  assert_abs_diff_eq!(capped[0].confidence, 0.3 + 499.0 * 0.001);
  assert_eq!(capped[..], all[..100]);
}

#[test]
fn sigmoid_scores_are_activated() {
  let builder = TensorBuilder::new(1, 2)
    .anchor(0, [50.0, 50.0, 20.0, 20.0], 0, 2.0)
    .anchor(1, [20.0, 20.0, 10.0, 10.0], 0, -3.0);
  let raw = RawOutputTensor::new(&builder.data, builder.layout()).unwrap();
  let options = DecodeOptions::new(0.25, 0.45, 300).activation(ScoreActivation::Sigmoid);
  let detections = postprocess(
    &raw,
    &LetterboxTransform::new(100, 100, 100),
    &["only"],
    &options,
  )
  .unwrap();
  assert_eq!(detections.len(), 1);
  assert_abs_diff_eq!(detections[0].confidence, 1.0 / (1.0 + (-2.0f32).exp()), epsilon = 1e-6);
}

#[test]
fn replayed_tensor_through_detector() {
  let builder = scenario_tensor();
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("output.bin");
  std::fs::write(&path, encode_f32_le(&builder.data)).unwrap();

  let url = Url::parse(&format!(
    "tensor://{}?shape=1,84,8400&input=640",
    path.display()
  ))
  .unwrap();
  let detector = Detector::new(
    ReplayEngine::from_url(&url).unwrap(),
    DetectorConfig::default(),
    ClassLabels::coco(),
  );

  let image = Image::filled(1280, 720, [0, 0, 0]);
  let result = detector.detect(&image).unwrap();

  let transform = LetterboxTransform::new(1280, 720, 640);
  let expected = builder.run(&transform, &DecodeOptions::default());
  assert_eq!(result.iter().cloned().collect::<Vec<_>>(), expected);
  assert_eq!(result.len(), 2);
}

#[test]
fn replay_rejects_wrong_input_size() {
  let builder = scenario_tensor();
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("output.bin");
  std::fs::write(&path, encode_f32_le(&builder.data)).unwrap();

  let url = Url::parse(&format!(
    "tensor://{}?shape=1,84,8400&input=640",
    path.display()
  ))
  .unwrap();
  let config = DetectorConfig {
    target_size: 320,
    ..DetectorConfig::default()
  };
  let detector = Detector::new(ReplayEngine::from_url(&url).unwrap(), config, ClassLabels::coco());
  assert!(detector.detect(&Image::filled(64, 64, [0, 0, 0])).is_err());
}
