//! # History 模块
//!
//! 对话历史记录，用于回看和导出。
//!
//! 只记录叙事事件（旁白、对话、选择、音乐切换），不记录淡入等临时状态。

use serde::{Deserialize, Serialize};

/// 默认最多记录的事件数
const DEFAULT_MAX_EVENTS: usize = 1000;

/// 历史事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryEvent {
    /// 对话事件
    Dialogue {
        /// 说话者（None 表示旁白）
        speaker: Option<String>,
        /// 对话内容
        content: String,
        /// 时间戳（Unix 秒）
        timestamp: u64,
    },

    /// 选择事件
    ChoiceMade {
        /// 所有选项
        options: Vec<String>,
        /// 选中的索引（从 1 开始）
        selected_index: usize,
        timestamp: u64,
    },

    /// 音乐切换
    MusicChange {
        /// 新音乐路径（None 表示停止）
        path: Option<String>,
        timestamp: u64,
    },
}

impl HistoryEvent {
    /// 获取事件时间戳
    pub fn timestamp(&self) -> u64 {
        match self {
            HistoryEvent::Dialogue { timestamp, .. }
            | HistoryEvent::ChoiceMade { timestamp, .. }
            | HistoryEvent::MusicChange { timestamp, .. } => *timestamp,
        }
    }

    /// 创建对话事件
    pub fn dialogue(speaker: Option<String>, content: String) -> Self {
        HistoryEvent::Dialogue {
            speaker,
            content,
            timestamp: current_timestamp(),
        }
    }

    /// 创建选择事件
    pub fn choice_made(options: Vec<String>, selected_index: usize) -> Self {
        HistoryEvent::ChoiceMade {
            options,
            selected_index,
            timestamp: current_timestamp(),
        }
    }

    /// 创建音乐切换事件
    pub fn music_change(path: Option<String>) -> Self {
        HistoryEvent::MusicChange {
            path,
            timestamp: current_timestamp(),
        }
    }
}

/// 历史记录容器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    /// 事件列表（按时间顺序）
    events: Vec<HistoryEvent>,
    /// 最大记录数
    max_events: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            max_events: DEFAULT_MAX_EVENTS,
        }
    }

    /// 设置最大记录数
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// 添加事件，超过上限时丢弃最早的事件
    pub fn push(&mut self, event: HistoryEvent) {
        self.events.push(event);
        if self.events.len() > self.max_events {
            let overflow = self.events.len() - self.max_events;
            self.events.drain(..overflow);
        }
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    /// 获取对话事件数量
    pub fn dialogue_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, HistoryEvent::Dialogue { .. }))
            .count()
    }

    /// 获取最近的 N 条对话（按时间顺序）
    pub fn recent_dialogues(&self, count: usize) -> Vec<&HistoryEvent> {
        let mut recent: Vec<_> = self
            .events
            .iter()
            .rev()
            .filter(|e| matches!(e, HistoryEvent::Dialogue { .. }))
            .take(count)
            .collect();
        recent.reverse();
        recent
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// 获取当前时间戳（Unix 秒）
fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
