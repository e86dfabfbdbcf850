//! # VN Runtime
//!
//! Visual Novel Engine 的叙事运行时。
//!
//! ## 架构概述
//!
//! `vn-runtime` 是纯逻辑核心，不依赖任何渲染或音频后端。
//! 脚本以 Lua 编写，整个脚本文件作为一个可挂起的脚本线程运行；
//! 它通过 **命令驱动模式** 与宿主层（Host）通信：
//!
//! ```text
//! Host                               Runtime
//!   │                                   │
//!   │──── RuntimeInput / 选择结果 ─────►│
//!   │                                   │ 恢复脚本线程，执行到下一个挂起点
//!   │◄──────── Vec<Command> ────────────│
//!   │                                   │
//! ```
//!
//! ## 核心类型
//!
//! - [`Command`]：脚本原语产生的指令
//! - [`RuntimeInput`]：Host 向 Runtime 传递的输入
//! - [`NarrativeState`]：叙事状态机
//! - [`PendingChoice`]：选项控件与运行时之间的单槽选择结果
//!
//! ## 模块结构
//!
//! - [`command`]：Command 定义
//! - [`input`]：RuntimeInput 定义
//! - [`state`]：NarrativeState 与 PendingChoice
//! - [`error`]：错误类型定义
//! - [`history`]：对话历史
//! - [`script`]：Lua 脚本会话
//! - [`runtime`]：执行引擎

pub mod command;
pub mod error;
pub mod history;
pub mod input;
pub mod runtime;
pub mod script;
pub mod state;

// 重导出核心类型
pub use command::{Character, Command, FontSpec, MAX_FONT_SIZE, TextStyle};
pub use error::{RuntimeError, VnResult};
pub use history::{History, HistoryEvent};
pub use input::RuntimeInput;
pub use runtime::VNRuntime;
pub use script::{ResumeOutcome, ScriptSession, Suspension};
pub use state::{NarrativeState, PendingChoice};
