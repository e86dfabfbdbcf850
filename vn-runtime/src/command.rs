//! # Command 模块
//!
//! 定义 Runtime 向 Host 发出的指令。
//!
//! 脚本每调用一次原语（`narrate` / `say` / `choice` / 音频控制），
//! 就会产生一条 [`Command`]，由 Host 负责转换为控件或音频操作。

use serde::{Deserialize, Serialize};

/// 角色默认名字颜色
pub const DEFAULT_CHARACTER_COLOR: &str = "#ff0000";

/// 脚本可请求的最大字号（像素）
pub const MAX_FONT_SIZE: u32 = 512;

/// 字体描述（名称 + 文件路径）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSpec {
    pub name: String,
    pub path: String,
}

/// 单行文本的样式覆盖
///
/// 所有字段均为可选，缺省时由 Host 使用配置中的默认值。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    /// 文本颜色（`#rrggbb`）
    pub text_color: Option<String>,
    /// 自定义字体
    pub font: Option<FontSpec>,
    /// 字号
    pub font_size: Option<u32>,
}

impl TextStyle {
    /// 是否没有任何覆盖
    pub fn is_empty(&self) -> bool {
        self.text_color.is_none() && self.font.is_none() && self.font_size.is_none()
    }
}

/// 说话角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// 显示名
    pub name: String,
    /// 名字颜色（`#rrggbb`）
    pub color: String,
}

impl Character {
    /// 创建角色，颜色缺省为红色
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        Self {
            name: name.into(),
            color: color.unwrap_or_else(|| DEFAULT_CHARACTER_COLOR.to_string()),
        }
    }
}

/// Runtime 向 Host 发出的指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// 旁白（无说话者）
    Narrate { text: String, style: TextStyle },

    /// 角色对话
    Say {
        character: Character,
        text: String,
        style: TextStyle,
    },

    /// 选项列表，恢复时返回从 1 开始的索引
    Choice {
        options: Vec<String>,
        style: TextStyle,
    },

    /// 播放音乐
    PlayMusic { path: String, looping: bool },

    /// 停止音乐
    StopMusic,

    /// 暂停音乐
    PauseMusic,

    /// 继续播放音乐
    ResumeMusic,

    /// 播放一次性音效
    PlaySound { path: String },
}

impl Command {
    /// 该指令是否会挂起脚本线程
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Command::Narrate { .. } | Command::Say { .. } | Command::Choice { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_default_color() {
        let c = Character::new("Ann", None);
        assert_eq!(c.color, DEFAULT_CHARACTER_COLOR);

        let c = Character::new("Bob", Some("#00ff00".to_string()));
        assert_eq!(c.color, "#00ff00");
    }

    #[test]
    fn test_blocking_commands() {
        assert!(
            Command::Narrate {
                text: "hi".to_string(),
                style: TextStyle::default(),
            }
            .is_blocking()
        );
        assert!(
            Command::Choice {
                options: vec!["a".to_string()],
                style: TextStyle::default(),
            }
            .is_blocking()
        );
        assert!(!Command::StopMusic.is_blocking());
        assert!(
            !Command::PlaySound {
                path: "a.wav".to_string()
            }
            .is_blocking()
        );
    }

    #[test]
    fn test_style_is_empty() {
        assert!(TextStyle::default().is_empty());
        let style = TextStyle {
            font_size: Some(20),
            ..Default::default()
        };
        assert!(!style.is_empty());
    }
}
