//! # App 模块
//!
//! 应用状态与主循环逻辑。
//!
//! `AppState` 把 Runtime、控件树、动画、音频和渲染后端接在一起：
//! 输入先分发给控件树，再按叙事状态决定是否恢复脚本；脚本产生的指令被转换为控件或音频操作。

mod command_handlers;
mod draw;
mod init;
mod update;

pub use command_handlers::*;
pub use draw::*;
pub use init::*;
pub use update::*;

use thiserror::Error;
use tracing::{info, warn};
use vn_runtime::{NarrativeState, RuntimeError, VNRuntime};

use crate::animation::AnimationManager;
use crate::audio::AudioBackend;
use crate::config::{AppConfig, ConfigError};
use crate::render::{FontError, FontManager, RenderBackend, RenderError, Rgba, TargetId, TextRasterizer};
use crate::ui::{RenderContext, UiError, WidgetId, WidgetTree};

/// 应用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("默认字体加载失败：{0}")]
    Font(#[from] FontError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Ui(#[from] UiError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// 应用状态
pub struct AppState<B: RenderBackend> {
    /// 应用配置
    pub config: AppConfig,
    pub backend: B,
    pub fonts: FontManager,
    pub tree: WidgetTree,
    pub animations: AnimationManager<WidgetTree>,
    pub audio: Box<dyn AudioBackend>,
    pub runtime: VNRuntime,
    /// 对话面板
    pub panel: DialogPanel,
    /// 主菜单根控件（仅 Menu 状态存在）
    pub menu: Option<WidgetId>,
    /// 默认文本颜色
    pub text_color: Rgba,
    pub background: Option<TargetId>,
    pub menu_background: Option<TargetId>,
    /// 主循环是否继续
    pub running: bool,
    /// 脚本会话是否因错误停止
    pub halted: bool,
    /// 使会话停止的错误
    pub fault: Option<RuntimeError>,
    /// 已处理的帧数
    pub frame: u64,
}

impl<B: RenderBackend> AppState<B> {
    /// 初始化应用
    ///
    /// 分辨率不受支持、默认字体或入口脚本加载失败都会中止启动。
    pub fn new(
        config: AppConfig,
        mut backend: B,
        rasterizer: Box<dyn TextRasterizer>,
        audio: Box<dyn AudioBackend>,
    ) -> Result<Self, AppError> {
        let screen = config.resolution()?;
        if backend.screen_size() != screen {
            warn!(
                screen = ?backend.screen_size(),
                resolution = ?screen,
                "渲染后端尺寸与配置分辨率不一致"
            );
        }

        let fonts = FontManager::new(
            rasterizer,
            &config.default_font_path(),
            config.default_font_size,
        )?;
        let runtime = VNRuntime::from_file(&config.script_path())?;

        let mut tree = WidgetTree::new();
        let panel = build_panel(&mut tree, &config, screen)?;
        let background = load_background(&mut backend, &config, config.background.as_deref());
        let menu_background =
            load_background(&mut backend, &config, config.main_menu.background.as_deref());
        let text_color = Rgba::from_hex_or(&config.default_text_color, Rgba::WHITE);

        info!(
            title = %config.title,
            version = %config.game_version,
            width = screen.0,
            height = screen.1,
            "应用初始化完成"
        );

        Ok(Self {
            config,
            backend,
            fonts,
            tree,
            animations: AnimationManager::new(),
            audio,
            runtime,
            panel,
            menu: None,
            text_color,
            background,
            menu_background,
            running: true,
            halted: false,
            fault: None,
            frame: 0,
        })
    }

    /// 启动：按配置显示主菜单，或直接开始脚本
    pub fn boot(&mut self) -> Result<(), AppError> {
        let show_menu = self.config.main_menu.enabled;
        if show_menu {
            let screen = self.backend.screen_size();
            let mut ctx = RenderContext {
                backend: &mut self.backend,
                fonts: &mut self.fonts,
            };
            let menu = build_main_menu(&mut self.tree, &mut ctx, &self.config, screen)?;
            self.menu = Some(menu);
        }
        drive(self, |runtime| runtime.boot(show_menu));
        Ok(())
    }

    /// 当前参与绘制与输入分发的根控件
    pub fn roots(&self) -> Vec<WidgetId> {
        match self.menu {
            Some(menu) => vec![menu],
            None => vec![self.panel.root],
        }
    }

    pub fn state(&self) -> NarrativeState {
        self.runtime.state()
    }
}

impl<B: RenderBackend> std::fmt::Debug for AppState<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("state", &self.runtime.state())
            .field("widgets", &self.tree.len())
            .field("animations", &self.animations.len())
            .field("running", &self.running)
            .field("halted", &self.halted)
            .field("frame", &self.frame)
            .finish()
    }
}
