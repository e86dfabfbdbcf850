//! # Tree 模块
//!
//! 控件 arena：构造、脏标记传播、宽度限制、列表操作、销毁与坐标计算。

use slotmap::SlotMap;
use tracing::{debug, warn};

use super::{
    ButtonColors, ButtonWidget, DialogWidget, DrawableObject, LimitWidget, ListWidget,
    OptionsWidget, PositionedWidget, ScrollableWidget, TextWidget, UiError, WidgetId, WidgetKind,
    WidgetNode, DEFAULT_BUTTON_PADDING, DEFAULT_SCROLL_STEP,
};
use crate::render::{FontId, Rect, RenderBackend, Rgba};

/// 控件树
#[derive(Debug, Default)]
pub struct WidgetTree {
    nodes: SlotMap<WidgetId, WidgetNode>,
}

impl WidgetTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: WidgetId) -> Result<&WidgetNode, UiError> {
        self.nodes.get(id).ok_or(UiError::UnknownWidget(id))
    }

    pub(super) fn node_mut(&mut self, id: WidgetId) -> Result<&mut WidgetNode, UiError> {
        self.nodes.get_mut(id).ok_or(UiError::UnknownWidget(id))
    }

    pub fn kind(&self, id: WidgetId) -> Option<&WidgetKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub(super) fn kind_mut(&mut self, id: WidgetId) -> Result<&mut WidgetKind, UiError> {
        Ok(&mut self.node_mut(id)?.kind)
    }

    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: WidgetId) -> Vec<WidgetId> {
        self.kind(id).map(WidgetKind::children).unwrap_or_default()
    }

    pub fn is_dirty(&self, id: WidgetId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.dirty)
    }

    /// 最近一次重算的结果（可能已过期）
    pub fn cached_drawable(&self, id: WidgetId) -> Option<DrawableObject> {
        self.nodes.get(id).map(|n| n.drawable)
    }

    // ========== 构造 ==========

    /// 检查子控件存在、未被其他节点拥有
    fn check_orphan(&self, child: WidgetId, role: &str) -> Result<(), UiError> {
        let node = self
            .nodes
            .get(child)
            .ok_or_else(|| UiError::InvalidChild(format!("{role} 控件 {child:?} 不存在")))?;
        if let Some(parent) = node.parent {
            return Err(UiError::InvalidChild(format!(
                "{role} 控件 {child:?} 已属于 {parent:?}"
            )));
        }
        Ok(())
    }

    fn insert(&mut self, kind: WidgetKind) -> WidgetId {
        let children = kind.children();
        let id = self.nodes.insert(WidgetNode::new(kind));
        for child in children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(id);
            }
        }
        id
    }

    /// 文本
    pub fn text(&mut self, text: impl Into<String>, color: Rgba, font: FontId) -> WidgetId {
        self.insert(WidgetKind::Text(TextWidget {
            text: text.into(),
            color,
            font,
            wrap: None,
        }))
    }

    /// 角色名 + 台词
    pub fn dialog(&mut self, character: WidgetId, value: WidgetId) -> Result<WidgetId, UiError> {
        if character == value {
            return Err(UiError::InvalidChild(
                "角色名与台词不能是同一个控件".to_string(),
            ));
        }
        self.check_orphan(character, "角色名")?;
        self.check_orphan(value, "台词")?;
        Ok(self.insert(WidgetKind::Dialog(DialogWidget {
            character,
            value,
            limit: None,
        })))
    }

    /// 按钮，文本颜色与常态前景色同步
    pub fn button(&mut self, text: WidgetId, colors: ButtonColors) -> Result<WidgetId, UiError> {
        self.check_orphan(text, "按钮文本")?;
        if !matches!(self.kind(text), Some(WidgetKind::Text(_))) {
            return Err(UiError::InvalidChild("按钮只能包装文本控件".to_string()));
        }
        self.set_text_color(text, colors.foreground)?;
        Ok(self.insert(WidgetKind::Button(ButtonWidget {
            text,
            colors,
            hovered: false,
            padding: DEFAULT_BUTTON_PADDING,
            on_click: None,
        })))
    }

    /// 空列表
    pub fn list(&mut self, spacing: u32) -> WidgetId {
        self.insert(WidgetKind::List(ListWidget {
            children: Vec::new(),
            spacing,
            limit: None,
        }))
    }

    /// 宽度限制，立即向子控件转发
    pub fn limit(&mut self, child: WidgetId, width: u32) -> Result<WidgetId, UiError> {
        self.check_orphan(child, "Limit 子")?;
        let id = self.insert(WidgetKind::Limit(LimitWidget { child, width }));
        self.set_limit(child, width)?;
        Ok(id)
    }

    /// 平移
    pub fn positioned(&mut self, child: WidgetId, x: i32, y: i32) -> Result<WidgetId, UiError> {
        self.check_orphan(child, "Positioned 子")?;
        Ok(self.insert(WidgetKind::Positioned(PositionedWidget { child, x, y })))
    }

    /// 固定高度的滚动视口
    pub fn scrollable(&mut self, child: WidgetId, height: u32) -> Result<WidgetId, UiError> {
        self.check_orphan(child, "ScrollableArea 子")?;
        if height == 0 {
            return Err(UiError::InvalidChild("滚动视口高度不能为 0".to_string()));
        }
        Ok(self.insert(WidgetKind::ScrollableArea(ScrollableWidget {
            child,
            height,
            scroll: 0,
            step: DEFAULT_SCROLL_STEP,
        })))
    }

    /// 选项块，`list` 的第 k 个子元素对应选项 k+1
    pub fn options(&mut self, list: WidgetId) -> Result<WidgetId, UiError> {
        self.check_orphan(list, "Options 列表")?;
        let count = match self.kind(list) {
            Some(WidgetKind::List(l)) => l.children.len(),
            _ => {
                return Err(UiError::InvalidChild(
                    "Options 只能包装列表控件".to_string(),
                ));
            }
        };
        if count == 0 {
            return Err(UiError::InvalidChild("Options 至少需要一个选项".to_string()));
        }
        Ok(self.insert(WidgetKind::Options(OptionsWidget {
            list,
            count,
            done: false,
        })))
    }

    // ========== 属性修改 ==========

    /// 标记自身及所有祖先为脏
    ///
    /// 无论祖先是否已经为脏，都会一直传播到根。
    pub fn mark_dirty(&mut self, id: WidgetId) {
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.nodes.get_mut(cur) else {
                break;
            };
            node.dirty = true;
            current = node.parent;
        }
    }

    /// 向下转发宽度限制
    pub fn set_limit(&mut self, id: WidgetId, width: u32) -> Result<(), UiError> {
        let forward = match self.kind_mut(id)? {
            WidgetKind::Text(t) => {
                t.wrap = Some(width);
                Vec::new()
            }
            WidgetKind::Dialog(d) => {
                // 台词列的限制要等角色名重算出宽度后再转发
                d.limit = Some(width);
                Vec::new()
            }
            WidgetKind::Button(b) => vec![(b.text, width)],
            WidgetKind::List(l) => {
                l.limit = Some(width);
                l.children.iter().map(|c| (*c, width)).collect()
            }
            WidgetKind::Limit(l) => vec![(l.child, width.min(l.width))],
            WidgetKind::Positioned(p) => vec![(p.child, width)],
            WidgetKind::ScrollableArea(s) => vec![(s.child, width)],
            WidgetKind::Options(o) => vec![(o.list, width)],
        };

        self.mark_dirty(id);
        for (child, width) in forward {
            self.set_limit(child, width)?;
        }
        Ok(())
    }

    /// 文本的当前换行宽度
    pub fn text_wrap(&self, id: WidgetId) -> Option<u32> {
        match self.kind(id) {
            Some(WidgetKind::Text(t)) => t.wrap,
            _ => None,
        }
    }

    pub fn text_content(&self, id: WidgetId) -> Option<&str> {
        match self.kind(id) {
            Some(WidgetKind::Text(t)) => Some(&t.text),
            _ => None,
        }
    }

    pub fn text_color(&self, id: WidgetId) -> Option<Rgba> {
        match self.kind(id) {
            Some(WidgetKind::Text(t)) => Some(t.color),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: WidgetId, text: impl Into<String>) -> Result<(), UiError> {
        let text = text.into();
        match self.kind_mut(id)? {
            WidgetKind::Text(t) if t.text != text => t.text = text,
            WidgetKind::Text(_) => return Ok(()),
            other => {
                return Err(UiError::InvalidChild(format!(
                    "{} 不是文本控件",
                    other.name()
                )));
            }
        }
        self.mark_dirty(id);
        Ok(())
    }

    pub fn set_text_color(&mut self, id: WidgetId, color: Rgba) -> Result<(), UiError> {
        match self.kind_mut(id)? {
            WidgetKind::Text(t) if t.color != color => t.color = color,
            WidgetKind::Text(_) => return Ok(()),
            other => {
                return Err(UiError::InvalidChild(format!(
                    "{} 不是文本控件",
                    other.name()
                )));
            }
        }
        self.mark_dirty(id);
        Ok(())
    }

    /// 注册按钮点击回调
    pub fn set_on_click(
        &mut self,
        id: WidgetId,
        handler: super::ClickHandler,
    ) -> Result<(), UiError> {
        match self.kind_mut(id)? {
            WidgetKind::Button(b) => {
                b.on_click = Some(handler);
                Ok(())
            }
            other => Err(UiError::InvalidChild(format!(
                "{} 不是按钮控件",
                other.name()
            ))),
        }
    }

    pub fn opacity(&self, id: WidgetId) -> Option<f32> {
        self.nodes.get(id).map(|n| n.opacity)
    }

    /// 设置透明度（钳制到 0..=1）并标记为脏
    pub fn set_opacity(&mut self, id: WidgetId, opacity: f32) -> Result<(), UiError> {
        self.node_mut(id)?.opacity = opacity.clamp(0.0, 1.0);
        self.mark_dirty(id);
        Ok(())
    }

    /// 修改 Positioned 的偏移
    pub fn set_position(&mut self, id: WidgetId, x: i32, y: i32) -> Result<(), UiError> {
        match self.kind_mut(id)? {
            WidgetKind::Positioned(p) => {
                p.x = x;
                p.y = y;
            }
            other => {
                return Err(UiError::InvalidChild(format!(
                    "{} 不是 Positioned 控件",
                    other.name()
                )));
            }
        }
        self.mark_dirty(id);
        Ok(())
    }

    pub fn scroll_offset(&self, id: WidgetId) -> Option<i32> {
        match self.kind(id) {
            Some(WidgetKind::ScrollableArea(s)) => Some(s.scroll),
            _ => None,
        }
    }

    /// 最大滚动距离（基于子控件最近一次重算的高度）
    fn max_scroll(&self, scroll: &ScrollableWidget) -> i32 {
        let content = self.cached_drawable(scroll.child).map_or(0, |d| d.h);
        content.saturating_sub(scroll.height) as i32
    }

    /// 按像素调整滚动偏移，结果钳制到 `[0, max(0, 内容高 - 视口高)]`
    pub fn scroll_by(&mut self, id: WidgetId, delta: i32) -> Result<i32, UiError> {
        let max = match self.kind(id) {
            Some(WidgetKind::ScrollableArea(s)) => self.max_scroll(s),
            Some(other) => {
                return Err(UiError::InvalidChild(format!(
                    "{} 不是滚动控件",
                    other.name()
                )));
            }
            None => return Err(UiError::UnknownWidget(id)),
        };
        let WidgetKind::ScrollableArea(s) = self.kind_mut(id)? else {
            return Err(UiError::UnknownWidget(id));
        };
        let scroll = s.scroll.saturating_add(delta).clamp(0, max);
        let changed = scroll != s.scroll;
        s.scroll = scroll;
        if changed {
            self.mark_dirty(id);
        }
        Ok(scroll)
    }

    // ========== 列表操作 ==========

    /// 插入到列表最前，并应用列表已有的宽度限制
    pub fn add_widget(&mut self, list: WidgetId, child: WidgetId) -> Result<(), UiError> {
        if list == child {
            return Err(UiError::InvalidChild("列表不能包含自身".to_string()));
        }
        self.check_orphan(child, "列表项")?;
        let limit = match self.kind_mut(list)? {
            WidgetKind::List(l) => {
                l.children.insert(0, child);
                l.limit
            }
            other => {
                return Err(UiError::InvalidChild(format!(
                    "{} 不是列表控件",
                    other.name()
                )));
            }
        };
        self.node_mut(child)?.parent = Some(list);
        if let Some(width) = limit {
            self.set_limit(child, width)?;
        }
        self.mark_dirty(list);
        Ok(())
    }

    /// 移除并销毁列表索引 0 处的元素（即最近插入的元素）
    ///
    /// 列表为空时返回 `Ok(None)`。
    pub fn remove_last_widget(
        &mut self,
        list: WidgetId,
        backend: &mut dyn RenderBackend,
    ) -> Result<Option<WidgetId>, UiError> {
        let first = match self.kind(list) {
            Some(WidgetKind::List(l)) => l.children.first().copied(),
            Some(other) => {
                return Err(UiError::InvalidChild(format!(
                    "{} 不是列表控件",
                    other.name()
                )));
            }
            None => return Err(UiError::UnknownWidget(list)),
        };
        let Some(first) = first else {
            return Ok(None);
        };
        self.destroy(first, backend)?;
        Ok(Some(first))
    }

    // ========== 销毁 ==========

    /// 销毁控件及其整棵子树，释放各自拥有的渲染目标
    ///
    /// 只能销毁根控件或列表项；列表项会先从父列表中摘除。
    pub fn destroy(
        &mut self,
        id: WidgetId,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), UiError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            match self.kind_mut(parent)? {
                WidgetKind::List(l) => l.children.retain(|c| *c != id),
                other => {
                    return Err(UiError::InvalidChild(format!(
                        "不能单独销毁 {} 的子控件",
                        other.name()
                    )));
                }
            }
            self.mark_dirty(parent);
        }

        let mut stack = vec![id];
        let mut first_error = None;
        let mut removed = 0usize;
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            removed += 1;
            stack.extend(node.kind.children());
            if let Some(target) = node.owned_target {
                if let Err(e) = backend.destroy_target(target) {
                    warn!(error = %e, "释放渲染目标失败");
                    first_error.get_or_insert(e);
                }
            }
        }
        debug!(widget = ?id, removed, "销毁控件子树");

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    // ========== 坐标 ==========

    /// 子控件原点在父控件坐标系中的位置
    fn offset_in_parent(&self, parent: WidgetId, child: WidgetId) -> (i32, i32) {
        let Some(kind) = self.kind(parent) else {
            return (0, 0);
        };
        match kind {
            WidgetKind::List(l) => {
                let mut y = 0i32;
                for c in &l.children {
                    let d = self.cached_drawable(*c).unwrap_or_default();
                    if *c == child {
                        return (d.x, y + d.y);
                    }
                    y += d.h as i32 + d.y + l.spacing as i32;
                }
                (0, 0)
            }
            WidgetKind::Dialog(d) if d.value == child => {
                let w = self.cached_drawable(d.character).map_or(0, |c| c.w);
                (w as i32, 0)
            }
            WidgetKind::Button(b) => (b.padding as i32, b.padding as i32),
            WidgetKind::ScrollableArea(s) => {
                let d = self.cached_drawable(s.child).unwrap_or_default();
                (d.x, d.y - s.scroll)
            }
            // Limit / Positioned / Options 复用子控件的产物，子控件偏移已包含在自身产物中
            _ => (0, 0),
        }
    }

    /// 控件在屏幕上的绝对区域
    ///
    /// 沿父链累加偏移；经过滚动区域时减去滚动量，并裁剪到其视口内。
    pub fn absolute_bounds(&self, id: WidgetId) -> Result<Rect, UiError> {
        let drawable = self.node(id)?.drawable;

        // (ax, ay)：目标控件相对当前节点原点的位置
        let (mut ax, mut ay) = (0i32, 0i32);
        let mut clips: Vec<(i32, i32, u32, u32)> = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let (dx, dy) = self.offset_in_parent(parent, current);
            ax += dx;
            ay += dy;
            if let Some(WidgetKind::ScrollableArea(_)) = self.kind(parent) {
                let viewport = self.node(parent)?.drawable;
                clips.push((ax, ay, viewport.w, viewport.h));
            }
            current = parent;
        }
        let root = self.node(current)?.drawable;
        let (x, y) = (ax + root.x, ay + root.y);

        let mut bounds = Rect::new(x, y, drawable.w, drawable.h);
        for (cx, cy, w, h) in clips {
            bounds = bounds.intersect(&Rect::new(x - cx, y - cy, w, h));
        }
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SoftwareBackend;

    const FONT: FontId = FontId(0);

    #[test]
    fn test_mark_dirty_reaches_root() {
        let mut tree = WidgetTree::new();
        let text = tree.text("a", Rgba::WHITE, FONT);
        let list = tree.list(0);
        tree.add_widget(list, text).unwrap();
        let root = tree.positioned(list, 0, 0).unwrap();

        for id in [text, list, root] {
            tree.node_mut(id).unwrap().dirty = false;
        }
        tree.mark_dirty(text);
        assert!(tree.is_dirty(text));
        assert!(tree.is_dirty(list));
        assert!(tree.is_dirty(root));
    }

    #[test]
    fn test_list_inserts_at_front() {
        let mut tree = WidgetTree::new();
        let list = tree.list(5);
        let a = tree.text("a", Rgba::WHITE, FONT);
        let b = tree.text("b", Rgba::WHITE, FONT);
        tree.add_widget(list, a).unwrap();
        tree.add_widget(list, b).unwrap();
        assert_eq!(tree.children(list), vec![b, a]);
        assert_eq!(tree.parent(a), Some(list));

        let mut backend = SoftwareBackend::new(10, 10);
        assert_eq!(tree.remove_last_widget(list, &mut backend).unwrap(), Some(b));
        assert_eq!(tree.children(list), vec![a]);
        assert!(!tree.contains(b));
    }

    #[test]
    fn test_remove_from_empty_list() {
        let mut tree = WidgetTree::new();
        let list = tree.list(5);
        let mut backend = SoftwareBackend::new(10, 10);
        assert_eq!(tree.remove_last_widget(list, &mut backend).unwrap(), None);
    }

    #[test]
    fn test_constructors_reject_owned_or_missing_children() {
        let mut tree = WidgetTree::new();
        let text = tree.text("a", Rgba::WHITE, FONT);
        tree.positioned(text, 0, 0).unwrap();

        let err = tree.limit(text, 10).unwrap_err();
        assert!(matches!(err, UiError::InvalidChild(_)));

        let ghost = tree.text("ghost", Rgba::WHITE, FONT);
        let mut backend = SoftwareBackend::new(10, 10);
        tree.destroy(ghost, &mut backend).unwrap();
        assert!(matches!(
            tree.scrollable(ghost, 10),
            Err(UiError::InvalidChild(_))
        ));

        let not_list = tree.text("x", Rgba::WHITE, FONT);
        assert!(matches!(tree.options(not_list), Err(UiError::InvalidChild(_))));
        let empty = tree.list(0);
        assert!(matches!(tree.options(empty), Err(UiError::InvalidChild(_))));
    }

    #[test]
    fn test_limit_forwards_to_list_children() {
        let mut tree = WidgetTree::new();
        let list = tree.list(0);
        let a = tree.text("a", Rgba::WHITE, FONT);
        tree.add_widget(list, a).unwrap();
        let _limit = tree.limit(list, 100).unwrap();
        assert_eq!(tree.text_wrap(a), Some(100));

        // 之后加入的元素同样受限
        let b = tree.text("b", Rgba::WHITE, FONT);
        tree.add_widget(list, b).unwrap();
        assert_eq!(tree.text_wrap(b), Some(100));
    }

    #[test]
    fn test_destroy_releases_subtree() {
        let mut tree = WidgetTree::new();
        let list = tree.list(0);
        let a = tree.text("a", Rgba::WHITE, FONT);
        let b = tree.text("b", Rgba::WHITE, FONT);
        tree.add_widget(list, a).unwrap();
        tree.add_widget(list, b).unwrap();
        let root = tree.positioned(list, 0, 0).unwrap();

        let mut backend = SoftwareBackend::new(10, 10);
        tree.destroy(root, &mut backend).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_destroy_wrapped_child_rejected() {
        let mut tree = WidgetTree::new();
        let text = tree.text("a", Rgba::WHITE, FONT);
        let _root = tree.positioned(text, 0, 0).unwrap();
        let mut backend = SoftwareBackend::new(10, 10);
        assert!(matches!(
            tree.destroy(text, &mut backend),
            Err(UiError::InvalidChild(_))
        ));
        assert!(tree.contains(text));
    }
}
