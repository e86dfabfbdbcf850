//! 输入分发
//!
//! 事件从根向下传递；Button / Options / ScrollableArea 先处理自身语义，
//! 再继续转发给子控件。命中测试使用各节点缓存的产物。

use tracing::{debug, info};
use vn_runtime::PendingChoice;

use super::{UiError, WidgetId, WidgetKind, WidgetTree};
use crate::input::{InputEvent, MouseButton};

/// 控件回调产生的应用级动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// 从主菜单进入叙事
    StartNovel,
    /// 退出
    Quit,
}

/// 事件分发上下文
pub struct EventContext<'a> {
    /// 当前鼠标位置
    pub pointer: (i32, i32),
    /// 选项控件写入选择结果的单槽
    pub pending_choice: &'a mut PendingChoice,
    actions: Vec<UiAction>,
}

impl<'a> EventContext<'a> {
    pub fn new(pointer: (i32, i32), pending_choice: &'a mut PendingChoice) -> Self {
        Self {
            pointer,
            pending_choice,
            actions: Vec::new(),
        }
    }

    pub fn push_action(&mut self, action: UiAction) {
        self.actions.push(action);
    }

    pub fn take_actions(&mut self) -> Vec<UiAction> {
        std::mem::take(&mut self.actions)
    }
}

/// 按钮点击回调
pub type ClickHandler = Box<dyn FnMut(&mut EventContext<'_>)>;

impl WidgetTree {
    /// 分发输入事件到控件及其子树
    pub fn handle_event(
        &mut self,
        id: WidgetId,
        event: &InputEvent,
        ctx: &mut EventContext<'_>,
    ) -> Result<(), UiError> {
        let kind = &self.node(id)?.kind;
        let (button, options, scroll) = (
            matches!(kind, WidgetKind::Button(_)),
            matches!(kind, WidgetKind::Options(_)),
            matches!(kind, WidgetKind::ScrollableArea(_)),
        );
        if button {
            self.button_event(id, event, ctx)?;
        } else if options {
            self.options_event(id, event, ctx)?;
        } else if scroll {
            self.scroll_event(id, event, ctx)?;
        }

        for child in self.children(id) {
            if self.contains(child) {
                self.handle_event(child, event, ctx)?;
            }
        }
        Ok(())
    }

    fn button_event(
        &mut self,
        id: WidgetId,
        event: &InputEvent,
        ctx: &mut EventContext<'_>,
    ) -> Result<(), UiError> {
        let (px, py) = ctx.pointer;
        let hovered = self.absolute_bounds(id)?.contains(px, py);

        let WidgetKind::Button(button) = self.kind_mut(id)? else {
            return Ok(());
        };
        if button.hovered != hovered {
            button.hovered = hovered;
            let (_, foreground) = button.colors.pick(hovered);
            let text = button.text;
            self.set_text_color(text, foreground)?;
            self.mark_dirty(id);
        }

        let clicked = matches!(
            event,
            InputEvent::MouseButtonUp {
                button: MouseButton::Left,
                ..
            }
        );
        if clicked && hovered {
            let handler = match self.kind_mut(id)? {
                WidgetKind::Button(b) => b.on_click.take(),
                _ => None,
            };
            if let Some(mut handler) = handler {
                debug!(widget = ?id, "按钮点击");
                handler(ctx);
                if let Ok(WidgetKind::Button(b)) = self.kind_mut(id) {
                    b.on_click = Some(handler);
                }
            }
        }
        Ok(())
    }

    fn options_event(
        &mut self,
        id: WidgetId,
        event: &InputEvent,
        ctx: &mut EventContext<'_>,
    ) -> Result<(), UiError> {
        let (list, count, done) = match &self.node(id)?.kind {
            WidgetKind::Options(o) => (o.list, o.count, o.done),
            _ => return Ok(()),
        };
        if done {
            return Ok(());
        }

        let selected = match *event {
            InputEvent::KeyUp(key) => key
                .digit()
                .map(usize::from)
                .filter(|d| (1..=count).contains(d)),
            InputEvent::MouseButtonUp {
                button: MouseButton::Left,
                ..
            } => {
                let (px, py) = ctx.pointer;
                let mut hit = None;
                for (i, child) in self.children(list).into_iter().enumerate() {
                    if self.absolute_bounds(child)?.contains(px, py) {
                        hit = Some(i + 1);
                        break;
                    }
                }
                hit
            }
            _ => None,
        };

        let Some(index) = selected else {
            return Ok(());
        };
        // 无论结果槽是否已被占用，做出有效选择后本选项块都不再响应
        if let WidgetKind::Options(o) = self.kind_mut(id)? {
            o.done = true;
        }
        if ctx.pending_choice.offer(index) {
            info!(index, "选项已提交");
        } else {
            debug!(index, "已有待处理的选择结果，忽略");
        }
        Ok(())
    }

    fn scroll_event(
        &mut self,
        id: WidgetId,
        event: &InputEvent,
        ctx: &mut EventContext<'_>,
    ) -> Result<(), UiError> {
        let InputEvent::MouseWheel { dy } = *event else {
            return Ok(());
        };
        let (px, py) = ctx.pointer;
        if !self.absolute_bounds(id)?.contains(px, py) {
            return Ok(());
        }
        let step = match self.kind(id) {
            Some(WidgetKind::ScrollableArea(s)) => s.step,
            _ => return Ok(()),
        };
        let scroll = self.scroll_by(id, -dy.saturating_mul(step))?;
        debug!(widget = ?id, scroll, "滚动");
        Ok(())
    }

    /// 选项块是否已提交
    pub fn options_done(&self, id: WidgetId) -> Option<bool> {
        match self.kind(id) {
            Some(WidgetKind::Options(o)) => Some(o.done),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;

    use super::*;
    use crate::input::Key;
    use crate::render::{BlockRasterizer, FontManager, Rgba, SoftwareBackend};
    use crate::ui::{ButtonColors, RenderContext};

    fn fonts(dir: &tempfile::TempDir) -> FontManager {
        let path = dir.path().join("font.ttf");
        fs::write(&path, b"font").unwrap();
        FontManager::new(Box::new(BlockRasterizer::new()), &path, 10).unwrap()
    }

    fn options_tree(tree: &mut WidgetTree, fonts: &FontManager, labels: &[&str]) -> WidgetId {
        let list = tree.list(5);
        for (i, label) in labels.iter().enumerate().rev() {
            let t = tree.text(format!("{}- {label}", i + 1), Rgba::WHITE, fonts.default_font());
            tree.add_widget(list, t).unwrap();
        }
        tree.options(list).unwrap()
    }

    #[test]
    fn test_options_single_consumption() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = fonts(&dir);
        let mut tree = WidgetTree::new();
        let options = options_tree(&mut tree, &fonts, &["a", "b", "c"]);

        let mut pending = PendingChoice::new();
        {
            let mut ctx = EventContext::new((0, 0), &mut pending);
            tree.handle_event(options, &InputEvent::KeyUp(Key::Num(2)), &mut ctx)
                .unwrap();
            tree.handle_event(options, &InputEvent::KeyUp(Key::Num(3)), &mut ctx)
                .unwrap();
        }
        assert_eq!(pending.peek(), Some(2));
        assert_eq!(tree.options_done(options), Some(true));

        // 消费后，新的选项块可以独立提交
        assert_eq!(pending.take(), Some(2));
        let second = options_tree(&mut tree, &fonts, &["x", "y"]);
        {
            let mut ctx = EventContext::new((0, 0), &mut pending);
            tree.handle_event(options, &InputEvent::KeyUp(Key::Num(1)), &mut ctx)
                .unwrap();
            tree.handle_event(second, &InputEvent::KeyUp(Key::Num(1)), &mut ctx)
                .unwrap();
        }
        assert_eq!(pending.take(), Some(1));
        assert_eq!(tree.options_done(second), Some(true));
    }

    #[test]
    fn test_options_done_even_when_slot_taken() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = fonts(&dir);
        let mut tree = WidgetTree::new();
        let first = options_tree(&mut tree, &fonts, &["a", "b"]);
        let second = options_tree(&mut tree, &fonts, &["x", "y"]);

        let mut pending = PendingChoice::new();
        {
            let mut ctx = EventContext::new((0, 0), &mut pending);
            tree.handle_event(first, &InputEvent::KeyUp(Key::Num(1)), &mut ctx)
                .unwrap();
            tree.handle_event(second, &InputEvent::KeyUp(Key::Num(2)), &mut ctx)
                .unwrap();
        }
        assert_eq!(pending.take(), Some(1));
        assert_eq!(tree.options_done(second), Some(true));

        // 已完成的选项块不会在结果槽清空后再次提交
        let mut ctx = EventContext::new((0, 0), &mut pending);
        tree.handle_event(second, &InputEvent::KeyUp(Key::Num(2)), &mut ctx)
            .unwrap();
        assert!(ctx.pending_choice.is_empty());
    }

    #[test]
    fn test_options_ignore_out_of_range_keys() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = fonts(&dir);
        let mut tree = WidgetTree::new();
        let options = options_tree(&mut tree, &fonts, &["a", "b"]);

        let mut pending = PendingChoice::new();
        let mut ctx = EventContext::new((0, 0), &mut pending);
        for key in [Key::Num(0), Key::Num(3), Key::Space] {
            tree.handle_event(options, &InputEvent::KeyUp(key), &mut ctx)
                .unwrap();
        }
        assert_eq!(tree.options_done(options), Some(false));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_options_click_selects_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut fonts = fonts(&dir);
        let mut backend = SoftwareBackend::new(200, 200);
        let mut tree = WidgetTree::new();
        let options = options_tree(&mut tree, &fonts, &["a", "b"]);
        let root = tree.positioned(options, 10, 10).unwrap();
        tree.produce(
            root,
            &mut RenderContext {
                backend: &mut backend,
                fonts: &mut fonts,
            },
        )
        .unwrap();

        // 每行高 10，间距 5：第二行位于 y = 10 + 15
        let mut pending = PendingChoice::new();
        let mut ctx = EventContext::new((12, 27), &mut pending);
        let click = InputEvent::MouseButtonUp {
            button: MouseButton::Left,
            x: 12,
            y: 27,
        };
        tree.handle_event(root, &click, &mut ctx).unwrap();
        assert_eq!(pending.peek(), Some(2));
    }

    #[test]
    fn test_button_hover_and_click() {
        let dir = tempfile::tempdir().unwrap();
        let mut fonts = fonts(&dir);
        let mut backend = SoftwareBackend::new(200, 200);
        let mut tree = WidgetTree::new();

        let colors = ButtonColors {
            background: Rgba::BLACK,
            foreground: Rgba::WHITE,
            hover_background: Rgba::WHITE,
            hover_foreground: Rgba::BLACK,
        };
        let label = tree.text("Start", Rgba::RED, fonts.default_font());
        let button = tree.button(label, colors).unwrap();
        assert_eq!(tree.text_color(label), Some(Rgba::WHITE));

        let clicks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&clicks);
        tree.set_on_click(
            button,
            Box::new(move |ctx| {
                counter.set(counter.get() + 1);
                ctx.push_action(UiAction::StartNovel);
            }),
        )
        .unwrap();

        let root = tree.positioned(button, 20, 20).unwrap();
        tree.produce(
            root,
            &mut RenderContext {
                backend: &mut backend,
                fonts: &mut fonts,
            },
        )
        .unwrap();

        let mut pending = PendingChoice::new();

        // 鼠标不在按钮上：点击无效
        let mut ctx = EventContext::new((5, 5), &mut pending);
        let up = InputEvent::MouseButtonUp {
            button: MouseButton::Left,
            x: 5,
            y: 5,
        };
        tree.handle_event(root, &up, &mut ctx).unwrap();
        assert_eq!(clicks.get(), 0);
        assert!(ctx.take_actions().is_empty());

        // 悬停：颜色切换并标记为脏
        let mut ctx = EventContext::new((25, 25), &mut pending);
        tree.handle_event(root, &InputEvent::MouseMotion { x: 25, y: 25 }, &mut ctx)
            .unwrap();
        assert_eq!(tree.text_color(label), Some(Rgba::BLACK));
        assert!(tree.is_dirty(root));

        let up = InputEvent::MouseButtonUp {
            button: MouseButton::Left,
            x: 25,
            y: 25,
        };
        tree.handle_event(root, &up, &mut ctx).unwrap();
        assert_eq!(clicks.get(), 1);
        assert_eq!(ctx.take_actions(), vec![UiAction::StartNovel]);
    }

    #[test]
    fn test_wheel_scrolls_only_inside_area() {
        let dir = tempfile::tempdir().unwrap();
        let mut fonts = fonts(&dir);
        let mut backend = SoftwareBackend::new(200, 200);
        let mut tree = WidgetTree::new();

        let list = tree.list(0);
        for _ in 0..10 {
            let t = tree.text("line", Rgba::WHITE, fonts.default_font());
            tree.add_widget(list, t).unwrap();
        }
        let area = tree.scrollable(list, 30).unwrap();
        tree.produce(
            area,
            &mut RenderContext {
                backend: &mut backend,
                fonts: &mut fonts,
            },
        )
        .unwrap();

        let mut pending = PendingChoice::new();
        let mut ctx = EventContext::new((100, 100), &mut pending);
        tree.handle_event(area, &InputEvent::MouseWheel { dy: -2 }, &mut ctx)
            .unwrap();
        assert_eq!(tree.scroll_offset(area), Some(0));

        let mut ctx = EventContext::new((5, 5), &mut pending);
        tree.handle_event(area, &InputEvent::MouseWheel { dy: -2 }, &mut ctx)
            .unwrap();
        assert_eq!(tree.scroll_offset(area), Some(10));
        assert!(tree.is_dirty(area));

        tree.handle_event(area, &InputEvent::MouseWheel { dy: 100 }, &mut ctx)
            .unwrap();
        assert_eq!(tree.scroll_offset(area), Some(0));
    }

    #[test]
    fn test_hit_test_subtracts_scroll() {
        let dir = tempfile::tempdir().unwrap();
        let mut fonts = fonts(&dir);
        let mut backend = SoftwareBackend::new(200, 200);
        let mut tree = WidgetTree::new();

        let list = tree.list(0);
        for _ in 0..10 {
            let t = tree.text("line", Rgba::WHITE, fonts.default_font());
            tree.add_widget(list, t).unwrap();
        }
        let area = tree.scrollable(list, 30).unwrap();
        let root = tree.positioned(area, 0, 100).unwrap();
        let mut ctx = RenderContext {
            backend: &mut backend,
            fonts: &mut fonts,
        };
        tree.produce(root, &mut ctx).unwrap();

        // 列表中第 3 个元素（索引 2）位于内容 y = 20
        let third = tree.children(list)[2];
        assert_eq!(
            tree.absolute_bounds(third).unwrap(),
            crate::render::Rect::new(0, 120, 20, 10)
        );

        tree.scroll_by(area, 15).unwrap();
        tree.produce(root, &mut ctx).unwrap();
        assert_eq!(
            tree.absolute_bounds(third).unwrap(),
            crate::render::Rect::new(0, 105, 20, 10)
        );

        // 滚出视口的元素被裁剪为空
        let first = tree.children(list)[0];
        assert_eq!(tree.absolute_bounds(first).unwrap().h, 0);
    }
}
