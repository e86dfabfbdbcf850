//! 暴露给脚本的原语
//!
//! 阻塞型原语（`narrate` / `say` / `choice`）由 Rust 端记录指令，
//! 再由 Lua 端包装函数调用 `coroutine.yield()` 挂起脚本线程。

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Lua, Table, Value};
use tracing::{debug, warn};

use crate::command::{Character, Command, FontSpec, MAX_FONT_SIZE, TextStyle};

/// 指令发件箱，由脚本原语写入、由会话在每次恢复后取出
pub(crate) type Outbox = Rc<RefCell<Vec<Command>>>;

/// Lua 端包装：记录指令后挂起，恢复值作为原语返回值
const PRELUDE: &str = r#"
local host = ...

function narrate(text, props)
    host.narrate(text, props)
    return coroutine.yield()
end

function say(character, text, props)
    host.say(character, text, props)
    return coroutine.yield()
end

function choice(options, props)
    host.choice(options, props)
    return coroutine.yield()
end

play_music = host.play_music
stop_music = host.stop_music
pause_music = host.pause_music
resume_music = host.resume_music
play_sound = host.play_sound
"#;

/// 在解释器中注册全部原语与辅助构造函数
pub(crate) fn install(lua: &Lua, outbox: Outbox) -> mlua::Result<()> {
    let host = lua.create_table()?;

    let out = Rc::clone(&outbox);
    host.set(
        "narrate",
        lua.create_function(move |_, (text, props): (String, Option<Table>)| {
            let style = parse_style(props)?;
            debug!(text = %text, "narrate");
            out.borrow_mut().push(Command::Narrate { text, style });
            Ok(())
        })?,
    )?;

    let out = Rc::clone(&outbox);
    host.set(
        "say",
        lua.create_function(
            move |_, (character, text, props): (Value, String, Option<Table>)| {
                let character = parse_character(character)?;
                let style = parse_style(props)?;
                debug!(character = %character.name, text = %text, "say");
                out.borrow_mut().push(Command::Say {
                    character,
                    text,
                    style,
                });
                Ok(())
            },
        )?,
    )?;

    let out = Rc::clone(&outbox);
    host.set(
        "choice",
        lua.create_function(move |_, (options, props): (Table, Option<Table>)| {
            let options = options
                .sequence_values::<String>()
                .collect::<mlua::Result<Vec<_>>>()?;
            if options.is_empty() {
                return Err(mlua::Error::RuntimeError(
                    "choice 至少需要一个选项".to_string(),
                ));
            }
            let style = parse_style(props)?;
            debug!(count = options.len(), "choice");
            out.borrow_mut().push(Command::Choice { options, style });
            Ok(())
        })?,
    )?;

    let out = Rc::clone(&outbox);
    host.set(
        "play_music",
        lua.create_function(move |_, (path, looping): (String, Option<bool>)| {
            out.borrow_mut().push(Command::PlayMusic {
                path,
                looping: looping.unwrap_or(false),
            });
            Ok(())
        })?,
    )?;

    let out = Rc::clone(&outbox);
    host.set(
        "stop_music",
        lua.create_function(move |_, ()| {
            out.borrow_mut().push(Command::StopMusic);
            Ok(())
        })?,
    )?;

    let out = Rc::clone(&outbox);
    host.set(
        "pause_music",
        lua.create_function(move |_, ()| {
            out.borrow_mut().push(Command::PauseMusic);
            Ok(())
        })?,
    )?;

    let out = Rc::clone(&outbox);
    host.set(
        "resume_music",
        lua.create_function(move |_, ()| {
            out.borrow_mut().push(Command::ResumeMusic);
            Ok(())
        })?,
    )?;

    let out = outbox;
    host.set(
        "play_sound",
        lua.create_function(move |_, path: String| {
            out.borrow_mut().push(Command::PlaySound { path });
            Ok(())
        })?,
    )?;

    let globals = lua.globals();
    globals.set(
        "character",
        lua.create_function(|lua, (name, color): (String, Option<String>)| {
            let character = Character::new(name, color);
            let table = lua.create_table()?;
            table.set("name", character.name)?;
            table.set("color", character.color)?;
            Ok(table)
        })?,
    )?;
    globals.set(
        "font",
        lua.create_function(|lua, (name, path): (String, String)| {
            let table = lua.create_table()?;
            table.set("name", name)?;
            table.set("path", path)?;
            Ok(table)
        })?,
    )?;

    lua.load(PRELUDE).set_name("prelude").call::<_, ()>(host)
}

/// 解析 `say` 的角色参数：`{ name, color }` 表或单独的名字字符串
fn parse_character(value: Value) -> mlua::Result<Character> {
    match value {
        Value::String(name) => Ok(Character::new(name.to_str()?, None)),
        Value::Table(table) => {
            let name: String = table.get("name")?;
            let color: Option<String> = table.get("color")?;
            Ok(Character::new(name, color))
        }
        other => Err(mlua::Error::RuntimeError(format!(
            "say 的角色参数必须是表或字符串，实际为 {}",
            other.type_name()
        ))),
    }
}

/// 解析样式覆盖：`text_color` / `color`、`font`、`font_size`
fn parse_style(props: Option<Table>) -> mlua::Result<TextStyle> {
    let Some(props) = props else {
        return Ok(TextStyle::default());
    };

    let text_color = match props.get::<_, Option<String>>("text_color")? {
        Some(color) => Some(color),
        None => props.get::<_, Option<String>>("color")?,
    };

    let font = match props.get::<_, Option<Table>>("font")? {
        Some(font) => {
            let name: Option<String> = font.get("name")?;
            let path: Option<String> = font.get("path")?;
            match (name, path) {
                (Some(name), Some(path)) => Some(FontSpec { name, path }),
                _ => {
                    warn!("font 属性缺少 name 或 path，已忽略");
                    None
                }
            }
        }
        None => None,
    };

    let font_size = props
        .get::<_, Option<f64>>("font_size")?
        .filter(|size| *size >= 1.0)
        .map(|size| {
            if size > MAX_FONT_SIZE as f64 {
                warn!(font_size = size, max = MAX_FONT_SIZE, "字号过大，已截断");
                MAX_FONT_SIZE
            } else {
                size.round() as u32
            }
        });

    Ok(TextStyle {
        text_color,
        font,
        font_size,
    })
}
