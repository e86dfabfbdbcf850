//! # State 模块
//!
//! 叙事状态机与待处理选择槽。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 叙事状态
///
/// 状态迁移只由脚本原语调用和玩家选择驱动。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrativeState {
    /// 启动中，脚本线程尚未开始
    Boot,
    /// 主菜单
    Menu,
    /// 正在推进叙事，等待玩家确认
    Novel,
    /// 等待玩家选择
    AwaitingChoice,
    /// 脚本已执行完毕（或出错），不再接受恢复
    End,
}

impl NarrativeState {
    /// 该状态下脚本线程是否可以恢复
    pub fn can_resume(self) -> bool {
        matches!(self, NarrativeState::Novel | NarrativeState::AwaitingChoice)
    }
}

impl fmt::Display for NarrativeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NarrativeState::Boot => "Boot",
            NarrativeState::Menu => "Menu",
            NarrativeState::Novel => "Novel",
            NarrativeState::AwaitingChoice => "AwaitingChoice",
            NarrativeState::End => "End",
        };
        f.write_str(name)
    }
}

/// 待处理的选择结果
///
/// 单槽：由选项控件写入一次，由运行时在每帧消费一次后清空。
/// 写入时遵循“先到先得”，槽非空时后续写入被忽略。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingChoice {
    slot: Option<usize>,
}

impl PendingChoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入选择结果（从 1 开始）
    ///
    /// 返回是否写入成功。索引 0 与槽非空时都会被拒绝。
    pub fn offer(&mut self, index: usize) -> bool {
        if index == 0 || self.slot.is_some() {
            return false;
        }
        self.slot = Some(index);
        true
    }

    /// 查看当前结果，不消费
    pub fn peek(&self) -> Option<usize> {
        self.slot
    }

    /// 取出结果并清空槽
    pub fn take(&mut self) -> Option<usize> {
        self.slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_choice_first_writer_wins() {
        let mut pending = PendingChoice::new();
        assert!(pending.is_empty());

        assert!(pending.offer(2));
        assert!(!pending.offer(3));
        assert_eq!(pending.peek(), Some(2));

        assert_eq!(pending.take(), Some(2));
        assert!(pending.is_empty());
        assert_eq!(pending.take(), None);

        // 清空后可以再次写入
        assert!(pending.offer(1));
        assert_eq!(pending.take(), Some(1));
    }

    #[test]
    fn test_pending_choice_rejects_zero() {
        let mut pending = PendingChoice::new();
        assert!(!pending.offer(0));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_state_can_resume() {
        assert!(NarrativeState::Novel.can_resume());
        assert!(NarrativeState::AwaitingChoice.can_resume());
        assert!(!NarrativeState::Boot.can_resume());
        assert!(!NarrativeState::Menu.can_resume());
        assert!(!NarrativeState::End.can_resume());
        assert_eq!(NarrativeState::AwaitingChoice.to_string(), "AwaitingChoice");
    }
}
