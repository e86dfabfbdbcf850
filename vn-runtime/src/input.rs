//! # Input 模块
//!
//! 定义 Host 向 Runtime 传递的输入。

use serde::{Deserialize, Serialize};

/// Host 向 Runtime 传递的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeInput {
    /// 玩家确认当前行（空格 / 回车）
    Advance,

    /// 玩家选择了某个选项（从 1 开始）
    ChoiceSelected { index: usize },
}
