//! 命令处理模块
//!
//! 把 Runtime 发出的 [`Command`] 转换为对话面板中的控件或音频操作。

mod audio;

pub use audio::*;

use tracing::{debug, warn};
use vn_runtime::{Character, Command, FontSpec, TextStyle};

use super::AppState;
use crate::animation::fade_in;
use crate::render::{FontId, RenderBackend, Rgba};
use crate::ui::{UiError, WidgetId};

/// 选项列表的行间距
pub const CHOICE_SPACING: u32 = 5;

/// 依次应用一批指令
pub fn apply_commands<B: RenderBackend>(
    app: &mut AppState<B>,
    commands: Vec<Command>,
) -> Result<(), UiError> {
    for cmd in commands {
        apply_command(app, cmd)?;
    }
    Ok(())
}

/// 应用单条指令
pub fn apply_command<B: RenderBackend>(app: &mut AppState<B>, cmd: Command) -> Result<(), UiError> {
    if handle_audio_command(app, &cmd) {
        return Ok(());
    }
    match cmd {
        Command::Narrate { text, style } => handle_narrate(app, &text, &style).map(|_| ()),
        Command::Say {
            character,
            text,
            style,
        } => handle_say(app, &character, &text, &style).map(|_| ()),
        Command::Choice { options, style } => handle_choice(app, &options, &style).map(|_| ()),
        other => {
            warn!(command = ?other, "未处理的指令");
            Ok(())
        }
    }
}

/// 旁白：追加一行文本并淡入
pub fn handle_narrate<B: RenderBackend>(
    app: &mut AppState<B>,
    text: &str,
    style: &TextStyle,
) -> Result<WidgetId, UiError> {
    let (color, font) = resolve_style(app, style);
    let line = app.tree.text(text, color, font);
    app.tree.add_widget(app.panel.dialogs, line)?;
    app.animations.add(fade_in(&mut app.tree, line)?);
    debug!(text = %text, "追加旁白");
    Ok(line)
}

/// 角色对话：角色名（角色颜色）+ 台词，两者分别淡入
pub fn handle_say<B: RenderBackend>(
    app: &mut AppState<B>,
    character: &Character,
    text: &str,
    style: &TextStyle,
) -> Result<WidgetId, UiError> {
    let (color, font) = resolve_style(app, style);
    let name_color = Rgba::from_hex(&character.color).unwrap_or_else(|| {
        warn!(color = %character.color, "角色颜色无效，使用红色");
        Rgba::RED
    });

    let name = app.tree.text(character.name.as_str(), name_color, font);
    let value = app.tree.text(text, color, font);
    let dialog = app.tree.dialog(name, value)?;
    app.tree.add_widget(app.panel.dialogs, dialog)?;
    app.animations.add(fade_in(&mut app.tree, name)?);
    app.animations.add(fade_in(&mut app.tree, value)?);
    debug!(character = %character.name, text = %text, "追加对话");
    Ok(dialog)
}

/// 选项：`"{i}- {text}"` 编号文本组成的选项块
pub fn handle_choice<B: RenderBackend>(
    app: &mut AppState<B>,
    options: &[String],
    style: &TextStyle,
) -> Result<WidgetId, UiError> {
    let (color, font) = resolve_style(app, style);
    let list = app.tree.list(CHOICE_SPACING);

    let mut lines = Vec::with_capacity(options.len());
    // 插入在最前，逆序添加使第 1 项位于顶部
    for (i, option) in options.iter().enumerate().rev() {
        let line = app.tree.text(format!("{}- {}", i + 1, option), color, font);
        app.tree.add_widget(list, line)?;
        lines.push(line);
    }

    let block = app.tree.options(list)?;
    app.tree.add_widget(app.panel.dialogs, block)?;
    for line in lines {
        app.animations.add(fade_in(&mut app.tree, line)?);
    }
    debug!(count = options.len(), "追加选项");
    Ok(block)
}

/// 解析样式覆盖，缺省使用配置中的默认值
///
/// 字体路径相对于资源根目录；加载失败时由字体管理器回退到默认字体。
fn resolve_style<B: RenderBackend>(app: &mut AppState<B>, style: &TextStyle) -> (Rgba, FontId) {
    let color = match &style.text_color {
        Some(hex) => Rgba::from_hex(hex).unwrap_or_else(|| {
            warn!(color = %hex, "文本颜色无效，使用默认颜色");
            app.text_color
        }),
        None => app.text_color,
    };

    let spec = style.font.as_ref().map(|f| FontSpec {
        name: f.name.clone(),
        path: app.config.resolve(&f.path).to_string_lossy().into_owned(),
    });
    let font = app.fonts.resolve(spec.as_ref(), style.font_size);
    (color, font)
}
