//! # Host 层
//!
//! Visual Novel Engine 的宿主层实现。
//!
//! ## 架构说明
//!
//! Host 层负责：
//! - 控件树（保留模式，脏标记驱动的按需重算）
//! - 渲染表面 / 文本光栅化适配（附带无窗口的软件实现）
//! - 音频播放
//! - 输入采集
//! - 将 Runtime 的 Command 转换为控件与音频操作
//!
//! Host 层不包含脚本逻辑，只负责执行 Runtime 发出的 Command。

pub mod animation;
pub mod app;
pub mod audio;
pub mod config;
pub mod input;
pub mod render;
pub mod ui;

pub use animation::{AnimationManager, Tween, fade_in};
pub use app::{AppError, AppState, DialogPanel, create_audio, frame_timing, update};
pub use audio::{AudioBackend, AudioCall, RecordingAudio, SilentAudio};
pub use config::{AppConfig, ConfigError, PanelSide};
pub use input::{InputEvent, Key, MouseButton};
pub use render::{
    BlockRasterizer, CosmicRasterizer, FontError, FontManager, RenderBackend, RenderError, Rgba,
    SoftwareBackend, TextRasterizer,
};
pub use ui::{UiAction, UiError, WidgetId, WidgetTree};
