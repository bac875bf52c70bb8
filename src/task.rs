// 该文件是 Jianbox （检框） 项目的一部分。
// src/task.rs - 检测流水线与任务
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

use std::{thread, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::DetectorConfig,
  frame::Image,
  model::{ClassLabels, DetectResult, InferenceEngine},
  output::Render,
  postprocess::{OutputLayout, PostprocessError, RawOutputTensor, postprocess},
  preprocess::PreprocessError,
};

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("预处理失败: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("后处理失败: {0}")]
  Postprocess(#[from] PostprocessError),
  #[error("推理失败: {0}")]
  Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("模型输出数量应为 1, 实际为 {0}")]
  UnexpectedOutputCount(usize),
}

/// 预处理、推理、后处理串联成一次检测
///
/// 输入张量与 letterbox 变换在一次 `detect` 调用内成对产生、成对消费，
/// 不会跨请求保存。
pub struct Detector<E> {
  engine: E,
  config: DetectorConfig,
  labels: ClassLabels,
}

impl<E> Detector<E>
where
  E: InferenceEngine,
  E::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(engine: E, config: DetectorConfig, labels: ClassLabels) -> Self {
    Self {
      engine,
      config,
      labels,
    }
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn labels(&self) -> &ClassLabels {
    &self.labels
  }

  pub fn detect(&self, image: &Image) -> Result<DetectResult, DetectError> {
    let (tensor, transform) = self.config.letterbox().apply(image)?;

    debug!("执行模型推理");
    let outputs = self
      .engine
      .run(&tensor)
      .map_err(|e| DetectError::Engine(Box::new(e)))?;
    let [output] = outputs.as_slice() else {
      return Err(DetectError::UnexpectedOutputCount(outputs.len()));
    };

    let layout = OutputLayout::from_shape(&output.shape, self.config.order)?;
    debug!(
      "输出形状 {:?}: {} 个类别, {} 个锚点",
      output.shape, layout.num_classes, layout.num_anchors
    );
    let raw = RawOutputTensor::new(&output.data, layout)?;
    let detections = postprocess(
      &raw,
      &transform,
      self.labels.as_slice(),
      &self.config.decode_options(),
    )?;

    Ok(DetectResult::from(detections))
  }
}

pub trait Task<I, D, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: D, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<I, E, O> Task<I, Detector<E>, O> for OneShotTask
where
  I: Iterator<Item = Image>,
  E: InferenceEngine,
  E::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Image, DetectResult>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: Detector<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 ({}x{})，开始检测...", frame.width(), frame.height());
    let now = std::time::Instant::now();
    let result = detector.detect(&frame)?;
    let elapsed = now.elapsed();
    info!("检测完成，共 {} 个目标，耗时: {:.2?}", result.len(), elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧反复检测，统计平均耗时
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  /// 前两次视为预热，不计入平均值
  const WARMUP: usize = 2;

  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(Self::WARMUP + 1);
    self
  }
}

impl<I, E, O> Task<I, Detector<E>, O> for RepeatShotTask
where
  I: Iterator<Item = Image>,
  E: InferenceEngine,
  E::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Image, DetectResult>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: Detector<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");
    let mut times = Vec::with_capacity(self.repeat_times);
    let mut last = DetectResult::default();
    for i in 0..self.repeat_times {
      let now = std::time::Instant::now();
      let result = detector.detect(&frame)?;
      let elapsed = now.elapsed();
      debug!("({})检测完成，耗时: {:.2?}", i, elapsed);
      if i > 0 && result != last {
        warn!("({})检测结果与上一次不一致", i);
      }
      last = result;
      times.push(elapsed);
    }
    output.render_result(&frame, &last)?;

    warn!(
      "平均检测时间: {:.2?}",
      times.iter().skip(Self::WARMUP).sum::<Duration>()
        / (times.len() - Self::WARMUP) as u32
    );

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<I, E, O> Task<I, Detector<E>, O> for ContinuousTask
where
  I: Iterator<Item = Image>,
  E: InferenceEngine,
  E::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Image, DetectResult>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, detector: Detector<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    let mut frame_index = 0usize;
    let mut total_detections = 0usize;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let result = detector.detect(&frame)?;
      total_detections += result.len();
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!(
        "检测到 {} 个目标，耗时: {:.2?} / {:.2?}",
        result.len(),
        elapsed_a,
        elapsed_b
      );
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共 {} 帧，{} 个目标", frame_index, total_detections);
    Ok(())
  }
}
