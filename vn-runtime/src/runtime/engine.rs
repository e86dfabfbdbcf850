//! # Engine 模块
//!
//! VN Runtime 核心执行引擎。
//!
//! ## 执行模型
//!
//! ```text
//! Boot ──boot(menu)──► Menu ──begin()──► Novel ◄──────────────┐
//!   └────boot(no menu)──────────────────► │                    │
//!                                          │ choice()          │ 选择结果
//!                                          ▼                   │
//!                                    AwaitingChoice ───────────┘
//!
//! 脚本执行完毕或出错 ──► End（不再接受恢复）
//! ```
//!
//! 每次恢复都同步执行到下一个挂起点，返回期间产生的 [`Command`]。

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::error::{RuntimeError, VnResult};
use crate::history::{History, HistoryEvent};
use crate::input::RuntimeInput;
use crate::script::{ResumeOutcome, ScriptSession, Suspension};
use crate::state::{NarrativeState, PendingChoice};

/// VN Runtime 执行引擎
///
/// # 使用示例
///
/// ```ignore
/// let mut runtime = VNRuntime::from_file(Path::new("main.lua"))?;
/// let commands = runtime.boot(false)?;
///
/// // 玩家按下空格
/// let commands = runtime.tick(RuntimeInput::Advance)?;
///
/// // 选项控件写入选择结果后，由帧循环统一消费
/// if let Some((index, commands)) = runtime.resolve_pending_choice()? { /* ... */ }
/// ```
pub struct VNRuntime {
    session: ScriptSession,
    state: NarrativeState,
    /// 选项控件写入、运行时每帧消费一次
    pending_choice: PendingChoice,
    /// 当前选项（仅 AwaitingChoice 时非空）
    current_options: Vec<String>,
    history: History,
}

impl VNRuntime {
    pub fn new(session: ScriptSession) -> Self {
        Self {
            session,
            state: NarrativeState::Boot,
            pending_choice: PendingChoice::new(),
            current_options: Vec::new(),
            history: History::new(),
        }
    }

    /// 从源码创建
    pub fn from_source(name: &str, source: &str) -> VnResult<Self> {
        Ok(Self::new(ScriptSession::load(name, source)?))
    }

    /// 从脚本文件创建
    pub fn from_file(path: &Path) -> VnResult<Self> {
        Ok(Self::new(ScriptSession::from_file(path)?))
    }

    pub fn state(&self) -> NarrativeState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// 当前等待选择的选项
    pub fn current_options(&self) -> &[String] {
        &self.current_options
    }

    pub fn pending_choice(&self) -> &PendingChoice {
        &self.pending_choice
    }

    /// 选项控件通过它写入选择结果
    pub fn pending_choice_mut(&mut self) -> &mut PendingChoice {
        &mut self.pending_choice
    }

    pub fn is_finished(&self) -> bool {
        self.state == NarrativeState::End
    }

    /// 启动：显示主菜单，或直接开始脚本线程
    pub fn boot(&mut self, show_menu: bool) -> VnResult<Vec<Command>> {
        self.expect_state(NarrativeState::Boot)?;
        if show_menu {
            info!("进入主菜单");
            self.state = NarrativeState::Menu;
            return Ok(Vec::new());
        }
        self.begin()
    }

    /// 开始脚本线程（Boot / Menu → Novel）
    pub fn begin(&mut self) -> VnResult<Vec<Command>> {
        if !matches!(self.state, NarrativeState::Boot | NarrativeState::Menu) {
            return Err(RuntimeError::StateMismatch {
                expected: "Boot | Menu".to_string(),
                actual: self.state.to_string(),
            });
        }
        self.state = NarrativeState::Novel;
        let result = self.session.start();
        self.apply(result)
    }

    /// 处理一次玩家输入
    ///
    /// - `Advance`：仅在 Novel 状态恢复脚本；AwaitingChoice 时忽略
    /// - `ChoiceSelected`：仅在 AwaitingChoice 状态有效，索引从 1 开始
    pub fn tick(&mut self, input: RuntimeInput) -> VnResult<Vec<Command>> {
        self.ensure_resumable()?;

        match input {
            RuntimeInput::Advance => {
                if self.state == NarrativeState::AwaitingChoice {
                    debug!("等待选择中，忽略推进输入");
                    return Ok(Vec::new());
                }
                let result = self.session.resume(None);
                self.apply(result)
            }
            RuntimeInput::ChoiceSelected { index } => {
                self.expect_state(NarrativeState::AwaitingChoice)?;
                let max = self.current_options.len();
                if index == 0 || index > max {
                    return Err(RuntimeError::InvalidChoiceIndex { index, max });
                }

                let options = std::mem::take(&mut self.current_options);
                info!(index, option = %options[index - 1], "玩家做出选择");
                self.history.push(HistoryEvent::choice_made(options, index));

                self.state = NarrativeState::Novel;
                let result = self.session.resume(Some(index));
                self.apply(result)
            }
        }
    }

    /// 消费待处理的选择结果
    ///
    /// 槽为空时返回 `Ok(None)`；否则取出结果、恢复脚本，返回选中的索引与产生的指令。
    pub fn resolve_pending_choice(&mut self) -> VnResult<Option<(usize, Vec<Command>)>> {
        let Some(index) = self.pending_choice.take() else {
            return Ok(None);
        };
        let commands = self.tick(RuntimeInput::ChoiceSelected { index })?;
        Ok(Some((index, commands)))
    }

    fn ensure_resumable(&self) -> VnResult<()> {
        if self.state.can_resume() {
            Ok(())
        } else {
            Err(RuntimeError::InvalidScriptResume {
                state: self.state.to_string(),
            })
        }
    }

    fn expect_state(&self, expected: NarrativeState) -> VnResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RuntimeError::StateMismatch {
                expected: expected.to_string(),
                actual: self.state.to_string(),
            })
        }
    }

    /// 根据恢复结果更新状态与历史
    fn apply(&mut self, result: VnResult<ResumeOutcome>) -> VnResult<Vec<Command>> {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "脚本线程异常终止");
                self.state = NarrativeState::End;
                self.current_options.clear();
                return Err(e);
            }
        };

        for cmd in &outcome.commands {
            self.record_history(cmd);
        }

        match outcome.suspension {
            Suspension::Line => {
                self.state = NarrativeState::Novel;
            }
            Suspension::Choice { count } => {
                if let Some(Command::Choice { options, .. }) = outcome.commands.last() {
                    self.current_options = options.clone();
                }
                if !self.pending_choice.is_empty() {
                    warn!("进入新的选择前，待处理的选择结果未被消费，已丢弃");
                    self.pending_choice.take();
                }
                debug!(count, "等待玩家选择");
                self.state = NarrativeState::AwaitingChoice;
            }
            Suspension::Finished => {
                info!(script = %self.session.name(), "脚本执行完毕");
                self.state = NarrativeState::End;
            }
        }

        Ok(outcome.commands)
    }

    fn record_history(&mut self, cmd: &Command) {
        match cmd {
            Command::Narrate { text, .. } => {
                self.history.push(HistoryEvent::dialogue(None, text.clone()));
            }
            Command::Say {
                character, text, ..
            } => {
                self.history.push(HistoryEvent::dialogue(
                    Some(character.name.clone()),
                    text.clone(),
                ));
            }
            Command::PlayMusic { path, .. } => {
                self.history
                    .push(HistoryEvent::music_change(Some(path.clone())));
            }
            Command::StopMusic => {
                self.history.push(HistoryEvent::music_change(None));
            }
            _ => {}
        }
    }
}
