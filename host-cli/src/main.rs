//! # vn-headless
//!
//! 无窗口运行视觉小说脚本：用软件渲染后端驱动完整的帧循环，
//! 从命令行或标准输入读取输入令牌，每个令牌驱动一帧。
//!
//! ## 用法
//!
//! ```bash
//! vn-headless --config config.json --inputs "space,space,2"
//! vn-headless --config config.json --inputs "click:960:520,space" --screenshot out.png
//! echo -e "space\n2" | vn-headless --config config.json --history history.json
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use host::app::{AppState, create_audio, frame_timing, update};
use host::config::AppConfig;
use host::input::parse_tokens;
use host::render::{CosmicRasterizer, SoftwareBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vn-headless")]
#[command(about = "无窗口运行视觉小说脚本")]
#[command(version)]
struct Cli {
    /// 配置文件（默认：config.json）
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// 输入令牌，逗号分隔；缺省时从标准输入逐行读取
    #[arg(short, long)]
    inputs: Option<String>,

    /// 结束时保存截图（PNG）
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// 结束时导出对话历史（JSON）
    #[arg(long)]
    history: Option<PathBuf>,

    /// 输入耗尽后额外运行的空帧数，便于淡入完成
    #[arg(long, default_value = "0")]
    settle_frames: u32,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("无法加载配置: {}", cli.config.display()))?;
    config.validate().context("配置无效")?;
    let (width, height) = config.resolution()?;

    let audio = create_audio(&config);
    let mut app = AppState::new(
        config,
        SoftwareBackend::new(width, height),
        Box::new(CosmicRasterizer::new()),
        audio,
    )
    .context("初始化失败")?;
    app.boot().context("启动失败")?;

    let frames = match cli.inputs {
        Some(inputs) => parse_tokens(&inputs),
        None => {
            let stdin = io::read_to_string(io::stdin()).context("读取标准输入失败")?;
            parse_tokens(&stdin)
        }
    };

    // 无窗口运行不休眠，每帧使用固定 dt
    let (dt, _) = frame_timing(app.config.fps, Duration::ZERO);
    for events in &frames {
        if !app.running {
            break;
        }
        update(&mut app, events, dt);
    }
    for _ in 0..cli.settle_frames {
        update(&mut app, &[], dt);
    }

    if let Some(path) = &cli.screenshot {
        app.backend
            .save_screenshot(path)
            .with_context(|| format!("保存截图失败: {}", path.display()))?;
        info!(path = %path.display(), "截图已保存");
    }

    if let Some(path) = &cli.history {
        let json = serde_json::to_string_pretty(app.runtime.history())?;
        fs::write(path, json).with_context(|| format!("写入历史失败: {}", path.display()))?;
        info!(path = %path.display(), "对话历史已导出");
    }

    info!(state = %app.state(), frames = app.frame, "运行结束");

    if let Some(fault) = &app.fault {
        bail!("脚本会话异常停止: {fault}");
    }
    Ok(())
}
