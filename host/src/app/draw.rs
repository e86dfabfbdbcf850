//! 渲染逻辑

use tracing::trace;
use vn_runtime::NarrativeState;

use super::AppState;
use crate::render::{Rect, RenderBackend, Rgba};
use crate::ui::{RenderContext, UiError};

/// 渲染函数
///
/// 清屏为黑色后依次绘制：背景图、对话面板底色（主菜单时不绘制）、各根控件。
/// 任一步失败即放弃本帧。
pub fn draw<B: RenderBackend>(app: &mut AppState<B>) -> Result<(), UiError> {
    let (w, h) = app.backend.screen_size();
    let screen = Rect::new(0, 0, w, h);

    app.backend.set_draw_target(None)?;
    app.backend.clear(Rgba::BLACK)?;

    let in_menu = app.menu.is_some();
    let background = if in_menu {
        app.menu_background.or(app.background)
    } else {
        app.background
    };
    if let Some(bg) = background {
        app.backend.copy(bg, None, screen)?;
    }

    if !in_menu && app.runtime.state() != NarrativeState::Boot {
        app.backend.fill_rect(app.panel.rect, app.panel.color)?;
    }

    let roots = app.roots();
    let mut ctx = RenderContext {
        backend: &mut app.backend,
        fonts: &mut app.fonts,
    };
    for root in roots {
        let d = app.tree.draw_to_screen(root, &mut ctx)?;
        trace!(widget = ?root, x = d.x, y = d.y, w = d.w, h = d.h, "绘制根控件");
    }
    Ok(())
}
