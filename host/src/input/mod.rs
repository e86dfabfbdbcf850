//! # Input 模块
//!
//! 平台无关的输入事件，以及无窗口运行时使用的输入令牌解析。
//!
//! 令牌格式（逗号或换行分隔）：
//!
//! | 令牌 | 事件 |
//! |------|------|
//! | `space` / `enter` / `esc` | 按下并松开对应按键 |
//! | `1`..`9` | 松开数字键 |
//! | `click:x:y` | 移动到 (x, y) 并点击左键 |
//! | `move:x:y` | 移动鼠标 |
//! | `wheel:dy` | 滚轮（向上为正） |
//! | `quit` | 退出 |

use tracing::warn;

/// 按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Escape,
    /// 数字键 0-9
    Num(u8),
    Other,
}

impl Key {
    /// 数字键对应的数字
    pub fn digit(self) -> Option<u8> {
        match self {
            Key::Num(d) => Some(d),
            _ => None,
        }
    }

    /// 是否为推进叙事的确认键
    pub fn is_advance(self) -> bool {
        matches!(self, Key::Space | Key::Enter)
    }
}

/// 鼠标按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// 输入事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// 请求退出
    Quit,
    KeyDown(Key),
    KeyUp(Key),
    MouseButtonDown { button: MouseButton, x: i32, y: i32 },
    MouseButtonUp { button: MouseButton, x: i32, y: i32 },
    MouseMotion { x: i32, y: i32 },
    /// 滚轮，`dy > 0` 表示向上
    MouseWheel { dy: i32 },
}

impl InputEvent {
    /// 事件携带的鼠标坐标
    pub fn position(&self) -> Option<(i32, i32)> {
        match *self {
            InputEvent::MouseButtonDown { x, y, .. }
            | InputEvent::MouseButtonUp { x, y, .. }
            | InputEvent::MouseMotion { x, y } => Some((x, y)),
            _ => None,
        }
    }
}

/// 解析单个输入令牌，无法识别时返回 `None`
pub fn parse_token(token: &str) -> Option<Vec<InputEvent>> {
    let token = token.trim().to_ascii_lowercase();
    let key_press = |key| Some(vec![InputEvent::KeyDown(key), InputEvent::KeyUp(key)]);

    match token.as_str() {
        "space" => return key_press(Key::Space),
        "enter" | "return" => return key_press(Key::Enter),
        "esc" | "escape" => return key_press(Key::Escape),
        "quit" => return Some(vec![InputEvent::Quit]),
        _ => {}
    }

    if let Ok(digit) = token.parse::<u8>() {
        if digit <= 9 {
            return Some(vec![InputEvent::KeyUp(Key::Num(digit))]);
        }
        return None;
    }

    let mut parts = token.split(':');
    let kind = parts.next()?;
    let args: Vec<i32> = parts.map(|p| p.parse().ok()).collect::<Option<_>>()?;
    match (kind, args.as_slice()) {
        ("click", [x, y]) => Some(vec![
            InputEvent::MouseMotion { x: *x, y: *y },
            InputEvent::MouseButtonDown {
                button: MouseButton::Left,
                x: *x,
                y: *y,
            },
            InputEvent::MouseButtonUp {
                button: MouseButton::Left,
                x: *x,
                y: *y,
            },
        ]),
        ("move", [x, y]) => Some(vec![InputEvent::MouseMotion { x: *x, y: *y }]),
        ("wheel", [dy]) => Some(vec![InputEvent::MouseWheel { dy: *dy }]),
        _ => None,
    }
}

/// 解析逗号分隔的令牌序列，每个令牌对应一帧的输入
pub fn parse_tokens(input: &str) -> Vec<Vec<InputEvent>> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| {
            let events = parse_token(t);
            if events.is_none() {
                warn!(token = %t, "无法识别的输入令牌，已忽略");
            }
            events
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys() {
        assert_eq!(
            parse_token("space"),
            Some(vec![
                InputEvent::KeyDown(Key::Space),
                InputEvent::KeyUp(Key::Space)
            ])
        );
        assert_eq!(
            parse_token(" 2 "),
            Some(vec![InputEvent::KeyUp(Key::Num(2))])
        );
        assert_eq!(parse_token("12"), None);
        assert_eq!(parse_token("jump"), None);
    }

    #[test]
    fn test_parse_mouse() {
        let events = parse_token("click:10:20").unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].position(), Some((10, 20)));
        assert_eq!(
            parse_token("wheel:-3"),
            Some(vec![InputEvent::MouseWheel { dy: -3 }])
        );
        assert_eq!(parse_token("click:10"), None);
    }

    #[test]
    fn test_parse_tokens_skips_unknown() {
        let frames = parse_tokens("space, bogus,2\nquit");
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2], vec![InputEvent::Quit]);
    }
}
