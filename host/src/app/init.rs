//! 场景初始化
//!
//! 对话面板、主菜单与背景图的构建。

use tracing::{debug, info, warn};

use crate::config::{AppConfig, PanelSide};
use crate::render::{Rect, RenderBackend, Rgba, TargetId};
use crate::ui::{ButtonColors, RenderContext, UiAction, UiError, WidgetId, WidgetTree};

/// 对话列表的行间距
pub const DIALOG_SPACING: u32 = 20;

/// 主菜单按钮间距
pub const MENU_SPACING: u32 = 10;

/// 对话面板
#[derive(Debug, Clone, Copy)]
pub struct DialogPanel {
    /// 面板背景区域
    pub rect: Rect,
    pub color: Rgba,
    /// 对话列表，新内容插入在最前
    pub dialogs: WidgetId,
    pub scroll: WidgetId,
    /// 面板根控件
    pub root: WidgetId,
}

/// 构建对话面板：`Positioned(Scrollable(Limit(List)))`
pub fn build_panel(
    tree: &mut WidgetTree,
    config: &AppConfig,
    screen: (u32, u32),
) -> Result<DialogPanel, UiError> {
    let (sw, sh) = screen;
    let panel_w = ((sw as f64 * config.dialog_panel.width) as u32).clamp(1, sw.max(1));
    let panel_x = match config.dialog_panel.side() {
        PanelSide::Left => 0,
        PanelSide::Right => sw - panel_w,
    };

    let dialogs = tree.list(DIALOG_SPACING);
    let limit = tree.limit(dialogs, (panel_w - panel_w / 10).max(1))?;
    let scroll = tree.scrollable(limit, (sh * 5 / 8).max(1))?;
    let root = tree.positioned(
        scroll,
        (panel_x + panel_w / 20) as i32,
        (panel_w / 20) as i32,
    )?;

    debug!(x = panel_x, width = panel_w, "对话面板已构建");
    Ok(DialogPanel {
        rect: Rect::new(panel_x as i32, 0, panel_w, sh),
        color: Rgba::from_hex_or(&config.dialog_panel.color, Rgba::rgb(0x20, 0x20, 0x20)),
        dialogs,
        scroll,
        root,
    })
}

/// 构建居中的主菜单（开始 / 退出）
pub fn build_main_menu(
    tree: &mut WidgetTree,
    ctx: &mut RenderContext<'_>,
    config: &AppConfig,
    screen: (u32, u32),
) -> Result<WidgetId, UiError> {
    let menu = &config.main_menu;
    let colors = ButtonColors {
        background: Rgba::from_hex_or(&menu.background_color, Rgba::rgb(0x04, 0x51, 0x47)),
        foreground: Rgba::from_hex_or(&menu.color, Rgba::WHITE),
        hover_background: Rgba::from_hex_or(&menu.background_color_hover, Rgba::WHITE),
        hover_foreground: Rgba::from_hex_or(&menu.color_hover, Rgba::BLACK),
    };

    let list = tree.list(MENU_SPACING);
    // 插入在最前，逆序添加
    for (label, action) in [("Quit", UiAction::Quit), ("Start", UiAction::StartNovel)] {
        let text = tree.text(label, colors.foreground, ctx.fonts.default_font());
        let button = tree.button(text, colors)?;
        tree.set_on_click(button, Box::new(move |ctx| ctx.push_action(action)))?;
        tree.add_widget(list, button)?;
    }

    let size = tree.produce(list, ctx)?;
    let x = (screen.0.saturating_sub(size.w) / 2) as i32;
    let y = (screen.1.saturating_sub(size.h) / 2) as i32;
    let root = tree.positioned(list, x, y)?;

    info!("主菜单已构建");
    Ok(root)
}

/// 加载全屏背景图，失败时只记录警告
pub fn load_background(
    backend: &mut dyn RenderBackend,
    config: &AppConfig,
    path: Option<&str>,
) -> Option<TargetId> {
    let path = path.filter(|p| !p.is_empty())?;
    let full = config.resolve(path);
    match backend.load_image(&full) {
        Ok(target) => {
            info!(path = %full.display(), "背景图加载成功");
            Some(target)
        }
        Err(e) => {
            warn!(path = %full.display(), error = %e, "背景图加载失败，跳过");
            None
        }
    }
}
