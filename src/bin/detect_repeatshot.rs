// 该文件是 Jianbox （检框） 项目的一部分。
// src/bin/detect_repeatshot.rs - 重复检测同一帧，统计耗时
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use jianbox::{
  FromUrl,
  args::Args,
  input::InputWrapper,
  model::ReplayEngine,
  output::OutputWrapper,
  task::{Detector, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型输出来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let detector = Detector::new(
    ReplayEngine::from_url(&args.model)?,
    args.detector_config()?,
    args.class_labels()?,
  );
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let task = match args.frames {
    Some(n) => RepeatShotTask::default().with_repeat_times(n),
    None => RepeatShotTask::default(),
  };
  task.run_task(input, detector, output)?;

  Ok(())
}
