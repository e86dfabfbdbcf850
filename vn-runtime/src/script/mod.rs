//! # Script 模块
//!
//! 嵌入式 Lua 脚本会话。
//!
//! 整个脚本文件作为一个协程（脚本线程）执行。阻塞型原语把指令写入发件箱后
//! 挂起线程，控制权同步返回给调用者，直到下一次 [`ScriptSession::resume`]。
//!
//! ## 模块结构
//!
//! - [`bindings`]：暴露给脚本的原语与辅助函数

mod bindings;

use std::fs;
use std::path::Path;
use std::rc::Rc;

use mlua::{Lua, RegistryKey, Thread, ThreadStatus};
use tracing::{debug, info};

use crate::command::Command;
use crate::error::{RuntimeError, VnResult};
use bindings::Outbox;

/// 脚本线程挂起的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// 等待玩家确认当前行
    Line,
    /// 等待玩家从 `count` 个选项中选择
    Choice { count: usize },
    /// 脚本已执行完毕
    Finished,
}

/// 一次恢复的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeOutcome {
    /// 本次恢复期间脚本产生的指令（按调用顺序）
    pub commands: Vec<Command>,
    pub suspension: Suspension,
}

/// 脚本会话
///
/// 持有解释器、入口函数、脚本线程以及“是否已执行完毕”标记。
pub struct ScriptSession {
    lua: Lua,
    name: String,
    entry: RegistryKey,
    thread: Option<RegistryKey>,
    outbox: Outbox,
    finished: bool,
}

impl ScriptSession {
    /// 从源码创建会话（只编译，不执行）
    pub fn load(name: &str, source: &str) -> VnResult<Self> {
        let lua = Lua::new();
        let outbox = Outbox::default();

        let load_err = |e: mlua::Error| RuntimeError::ScriptLoad {
            name: name.to_string(),
            message: e.to_string(),
        };

        bindings::install(&lua, Rc::clone(&outbox)).map_err(load_err)?;
        let entry = lua
            .load(source)
            .set_name(name)
            .into_function()
            .map_err(load_err)?;
        let entry = lua.create_registry_value(entry).map_err(load_err)?;

        debug!(script = %name, "脚本编译完成");

        Ok(Self {
            lua,
            name: name.to_string(),
            entry,
            thread: None,
            outbox,
            finished: false,
        })
    }

    /// 从文件创建会话
    pub fn from_file(path: &Path) -> VnResult<Self> {
        let source = fs::read_to_string(path).map_err(|e| RuntimeError::ScriptLoad {
            name: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "加载脚本");
        Self::load(&path.display().to_string(), &source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 脚本线程是否已经开始
    pub fn is_started(&self) -> bool {
        self.thread.is_some()
    }

    /// 脚本线程是否已执行完毕（包括出错终止）
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 创建脚本线程并执行到第一个挂起点
    pub fn start(&mut self) -> VnResult<ResumeOutcome> {
        if self.thread.is_some() {
            return Err(RuntimeError::InvalidScriptResume {
                state: "Started".to_string(),
            });
        }

        let entry: mlua::Function = self
            .lua
            .registry_value(&self.entry)
            .map_err(RuntimeError::script)?;
        let thread = self.lua.create_thread(entry).map_err(RuntimeError::script)?;
        let key = self
            .lua
            .create_registry_value(thread)
            .map_err(RuntimeError::script)?;
        self.thread = Some(key);

        info!(script = %self.name, "脚本线程开始执行");
        self.step(None)
    }

    /// 恢复脚本线程
    ///
    /// `value` 为选择结果（从 1 开始）；普通推进传 `None`。
    /// 线程尚未开始或已结束时返回 [`RuntimeError::InvalidScriptResume`]。
    pub fn resume(&mut self, value: Option<usize>) -> VnResult<ResumeOutcome> {
        if self.finished {
            return Err(RuntimeError::InvalidScriptResume {
                state: "Finished".to_string(),
            });
        }
        if self.thread.is_none() {
            return Err(RuntimeError::InvalidScriptResume {
                state: "NotStarted".to_string(),
            });
        }
        self.step(value)
    }

    fn step(&mut self, value: Option<usize>) -> VnResult<ResumeOutcome> {
        let Some(key) = self.thread.as_ref() else {
            return Err(RuntimeError::InvalidScriptResume {
                state: "NotStarted".to_string(),
            });
        };

        let thread: Thread = self.lua.registry_value(key).map_err(RuntimeError::script)?;
        let result = match value {
            Some(index) => thread.resume::<_, ()>(index as i64),
            None => thread.resume::<_, ()>(()),
        };
        let status = thread.status();
        let commands: Vec<Command> = self.outbox.borrow_mut().drain(..).collect();

        if let Err(e) = result {
            self.finished = true;
            return Err(RuntimeError::script(e));
        }

        let suspension = if status == ThreadStatus::Resumable {
            match commands.last() {
                Some(Command::Choice { options, .. }) => Suspension::Choice {
                    count: options.len(),
                },
                _ => Suspension::Line,
            }
        } else {
            self.finished = true;
            Suspension::Finished
        };

        Ok(ResumeOutcome {
            commands,
            suspension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Character, TextStyle};

    #[test]
    fn test_narrate_suspends_until_resumed() {
        let mut session = ScriptSession::load(
            "test",
            r#"
            narrate("first")
            narrate("second")
            "#,
        )
        .unwrap();
        assert!(!session.is_started());

        let outcome = session.start().unwrap();
        assert_eq!(outcome.suspension, Suspension::Line);
        assert_eq!(
            outcome.commands,
            vec![Command::Narrate {
                text: "first".to_string(),
                style: TextStyle::default(),
            }]
        );

        let outcome = session.resume(None).unwrap();
        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(outcome.suspension, Suspension::Line);

        let outcome = session.resume(None).unwrap();
        assert!(outcome.commands.is_empty());
        assert_eq!(outcome.suspension, Suspension::Finished);
        assert!(session.is_finished());
    }

    #[test]
    fn test_resume_after_finish_is_error() {
        let mut session = ScriptSession::load("test", "local x = 1").unwrap();
        let outcome = session.start().unwrap();
        assert_eq!(outcome.suspension, Suspension::Finished);

        let err = session.resume(None).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidScriptResume { .. }));
    }

    #[test]
    fn test_resume_before_start_is_error() {
        let mut session = ScriptSession::load("test", "narrate('x')").unwrap();
        let err = session.resume(None).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidScriptResume { .. }));
    }

    #[test]
    fn test_choice_returns_resume_value() {
        let mut session = ScriptSession::load(
            "test",
            r#"
            local picked = choice({"Yes", "No"})
            narrate("picked " .. picked)
            "#,
        )
        .unwrap();

        let outcome = session.start().unwrap();
        assert_eq!(outcome.suspension, Suspension::Choice { count: 2 });

        let outcome = session.resume(Some(2)).unwrap();
        assert_eq!(
            outcome.commands,
            vec![Command::Narrate {
                text: "picked 2".to_string(),
                style: TextStyle::default(),
            }]
        );
    }

    #[test]
    fn test_audio_primitives_do_not_suspend() {
        let mut session = ScriptSession::load(
            "test",
            r##"
            play_music("bgm.ogg", true)
            pause_music()
            resume_music()
            play_sound("click.wav")
            stop_music()
            say(character("Ann", "#ff0000"), "Hello")
            "##,
        )
        .unwrap();

        let outcome = session.start().unwrap();
        assert_eq!(outcome.suspension, Suspension::Line);
        assert_eq!(
            outcome.commands,
            vec![
                Command::PlayMusic {
                    path: "bgm.ogg".to_string(),
                    looping: true,
                },
                Command::PauseMusic,
                Command::ResumeMusic,
                Command::PlaySound {
                    path: "click.wav".to_string(),
                },
                Command::StopMusic,
                Command::Say {
                    character: Character::new("Ann", Some("#ff0000".to_string())),
                    text: "Hello".to_string(),
                    style: TextStyle::default(),
                },
            ]
        );
    }

    #[test]
    fn test_style_props_parsed() {
        let mut session = ScriptSession::load(
            "test",
            r##"
            narrate("styled", {
                text_color = "#00ff00",
                font = font("serif", "fonts/serif.ttf"),
                font_size = 24,
            })
            "##,
        )
        .unwrap();

        let outcome = session.start().unwrap();
        let Command::Narrate { style, .. } = &outcome.commands[0] else {
            panic!("expected narrate");
        };
        assert_eq!(style.text_color.as_deref(), Some("#00ff00"));
        assert_eq!(style.font_size, Some(24));
        let font = style.font.as_ref().unwrap();
        assert_eq!(font.name, "serif");
        assert_eq!(font.path, "fonts/serif.ttf");
    }

    #[test]
    fn test_say_accepts_color_key_and_default_character_color() {
        let mut session = ScriptSession::load(
            "test",
            r##"say({ name = "Bob" }, "hi", { color = "#123456" })"##,
        )
        .unwrap();

        let outcome = session.start().unwrap();
        let Command::Say {
            character, style, ..
        } = &outcome.commands[0]
        else {
            panic!("expected say");
        };
        assert_eq!(character.color, crate::command::DEFAULT_CHARACTER_COLOR);
        assert_eq!(style.text_color.as_deref(), Some("#123456"));
    }

    #[test]
    fn test_huge_font_size_is_capped() {
        let mut session = ScriptSession::load(
            "test",
            r#"narrate("Hello world", { font_size = 4000000000 })"#,
        )
        .unwrap();

        let outcome = session.start().unwrap();
        let Command::Narrate { style, .. } = &outcome.commands[0] else {
            panic!("expected narrate");
        };
        assert_eq!(style.font_size, Some(crate::command::MAX_FONT_SIZE));
    }

    #[test]
    fn test_script_error_finishes_session() {
        let mut session = ScriptSession::load("test", "error('boom')").unwrap();
        let err = session.start().unwrap_err();
        assert!(matches!(err, RuntimeError::Script { .. }));
        assert!(session.is_finished());
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        let err = ScriptSession::load("broken", "narrate(").err().unwrap();
        assert!(matches!(err, RuntimeError::ScriptLoad { .. }));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScriptSession::from_file(&dir.path().join("missing.lua"))
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::ScriptLoad { .. }));
    }
}
