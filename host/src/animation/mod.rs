//! # Animation 模块
//!
//! 扁平的补间（tween）注册表。
//!
//! 补间是一个按时间步进的闭包：每帧收到距上一帧的时间，返回“是否完成”。
//! 报告完成的补间在该次 tick 后被移除。

use std::time::Duration;

use tracing::trace;

use crate::ui::{UiError, WidgetId, WidgetTree};

/// 淡入速度（透明度单位 / 秒）
pub const FADE_IN_RATE: f32 = 1.0;

/// 补间闭包，`C` 为被驱动的上下文
pub type Tween<C> = Box<dyn FnMut(&mut C, Duration) -> bool>;

/// 动画管理器
pub struct AnimationManager<C> {
    tweens: Vec<Tween<C>>,
}

impl<C> Default for AnimationManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for AnimationManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationManager")
            .field("tweens", &self.tweens.len())
            .finish()
    }
}

impl<C> AnimationManager<C> {
    pub fn new() -> Self {
        Self { tweens: Vec::new() }
    }

    /// 注册补间
    pub fn add(&mut self, tween: Tween<C>) {
        self.tweens.push(tween);
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
    }

    /// 推进所有补间，移除报告完成的补间
    pub fn tick(&mut self, ctx: &mut C, dt: Duration) {
        let before = self.tweens.len();
        self.tweens.retain_mut(|tween| !tween(ctx, dt));
        let finished = before - self.tweens.len();
        if finished > 0 {
            trace!(finished, remaining = self.tweens.len(), "补间完成");
        }
    }
}

/// 创建淡入补间
///
/// 立即把控件透明度置 0；之后每步按 `dt` 线性增加并标记为脏，
/// 到达 1.0 时报告完成。控件被销毁后补间直接结束。
pub fn fade_in(tree: &mut WidgetTree, id: WidgetId) -> Result<Tween<WidgetTree>, UiError> {
    tree.set_opacity(id, 0.0)?;
    let mut opacity = 0.0f32;
    Ok(Box::new(move |tree: &mut WidgetTree, dt: Duration| {
        if !tree.contains(id) {
            return true;
        }
        opacity = (opacity + dt.as_secs_f32() * FADE_IN_RATE).min(1.0);
        if tree.set_opacity(id, opacity).is_err() {
            return true;
        }
        opacity >= 1.0
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{FontId, Rgba, SoftwareBackend};

    #[test]
    fn test_tick_prunes_finished() {
        let mut manager: AnimationManager<Vec<u32>> = AnimationManager::new();
        let mut remaining = 2;
        manager.add(Box::new(move |log: &mut Vec<u32>, _| {
            log.push(1);
            remaining -= 1;
            remaining == 0
        }));
        manager.add(Box::new(|log: &mut Vec<u32>, _| {
            log.push(2);
            true
        }));

        let mut log = Vec::new();
        manager.tick(&mut log, Duration::from_millis(16));
        assert_eq!(manager.len(), 1);
        manager.tick(&mut log, Duration::from_millis(16));
        assert!(manager.is_empty());
        assert_eq!(log, vec![1, 2, 1]);
    }

    #[test]
    fn test_fade_in_monotonic() {
        let mut tree = WidgetTree::new();
        let text = tree.text("a", Rgba::WHITE, FontId(0));
        let mut manager = AnimationManager::new();
        manager.add(fade_in(&mut tree, text).unwrap());
        assert_eq!(tree.opacity(text), Some(0.0));

        let mut last = 0.0;
        let mut steps: u64 = 0;
        while !manager.is_empty() {
            steps += 1;
            manager.tick(&mut tree, Duration::from_millis(90 + steps * 10));
            let now = tree.opacity(text).unwrap();
            assert!(now >= last);
            last = now;
            assert!(steps < 100);
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_fade_in_ends_when_widget_destroyed() {
        let mut tree = WidgetTree::new();
        let text = tree.text("a", Rgba::WHITE, FontId(0));
        let mut manager = AnimationManager::new();
        manager.add(fade_in(&mut tree, text).unwrap());

        let mut backend = SoftwareBackend::new(10, 10);
        tree.destroy(text, &mut backend).unwrap();
        manager.tick(&mut tree, Duration::from_millis(16));
        assert!(manager.is_empty());
    }
}
