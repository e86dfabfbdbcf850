//! # UI 模块
//!
//! 保留模式的控件组合树。
//!
//! ## 设计说明
//!
//! - 所有控件存放在 [`WidgetTree`] 的 arena 中，通过 [`WidgetId`] 引用
//! - 每个节点独占自己的子节点；`parent` 只是弱引用，用于脏标记传播与坐标累加
//! - 每个节点缓存一个 [`DrawableObject`]，脏标记为假时直接复用
//! - 控件种类是封闭的 [`WidgetKind`]，在重算与事件分发处穷举匹配
//!
//! ## 模块结构
//!
//! - [`tree`]：arena、构造、脏标记、列表操作、销毁、坐标
//! - `produce`：按需重算 DrawableObject
//! - `event`：输入分发与命中测试

mod event;
mod produce;
pub mod tree;

pub use event::{ClickHandler, EventContext, UiAction};
pub use produce::RenderContext;
pub use tree::WidgetTree;

use slotmap::new_key_type;
use thiserror::Error;

use crate::render::{FontError, FontId, Rect, RenderError, Rgba, TargetId};

new_key_type! {
    /// 控件句柄
    pub struct WidgetId;
}

/// 滚动区域默认步长（像素 / 滚轮格）
pub const DEFAULT_SCROLL_STEP: i32 = 5;

/// 按钮默认内边距
pub const DEFAULT_BUTTON_PADDING: u32 = 8;

/// UI 错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UiError {
    /// 渲染后端错误
    #[error("渲染失败：{0}")]
    Render(#[from] RenderError),

    /// 文本光栅化错误
    #[error("文本渲染失败：{0}")]
    Font(#[from] FontError),

    /// 控件不存在
    #[error("控件 {0:?} 不存在")]
    UnknownWidget(WidgetId),

    /// 构造参数不满足前置条件
    #[error("无效的子控件：{0}")]
    InvalidChild(String),
}

/// 控件的渲染产物
///
/// 偏移 + 尺寸 + 渲染目标句柄。只由所属控件的重算步骤修改。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawableObject {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub target: Option<TargetId>,
}

impl DrawableObject {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

/// 按钮的常态 / 悬停配色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonColors {
    pub background: Rgba,
    pub foreground: Rgba,
    pub hover_background: Rgba,
    pub hover_foreground: Rgba,
}

impl ButtonColors {
    /// 按悬停状态取（背景，前景）
    pub fn pick(&self, hovered: bool) -> (Rgba, Rgba) {
        if hovered {
            (self.hover_background, self.hover_foreground)
        } else {
            (self.background, self.foreground)
        }
    }
}

/// 文本（叶子）
#[derive(Debug, Clone)]
pub struct TextWidget {
    pub text: String,
    pub color: Rgba,
    pub font: FontId,
    /// 换行宽度，由上层 `set_limit` 设置
    pub wrap: Option<u32>,
}

/// 角色名 + 台词，左右并排
#[derive(Debug, Clone)]
pub struct DialogWidget {
    pub character: WidgetId,
    pub value: WidgetId,
    /// 整体宽度限制；台词列的限制为此值减去角色名宽度
    pub limit: Option<u32>,
}

/// 按钮
pub struct ButtonWidget {
    pub text: WidgetId,
    pub colors: ButtonColors,
    pub hovered: bool,
    pub padding: u32,
    pub on_click: Option<ClickHandler>,
}

impl std::fmt::Debug for ButtonWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ButtonWidget")
            .field("text", &self.text)
            .field("colors", &self.colors)
            .field("hovered", &self.hovered)
            .field("padding", &self.padding)
            .field("on_click", &self.on_click.is_some())
            .finish()
    }
}

/// 纵向列表，新元素插入到最前
#[derive(Debug, Clone)]
pub struct ListWidget {
    pub children: Vec<WidgetId>,
    pub spacing: u32,
    /// 已向子元素转发的宽度限制，新加入的子元素同样适用
    pub limit: Option<u32>,
}

/// 对子控件施加最大宽度
#[derive(Debug, Clone)]
pub struct LimitWidget {
    pub child: WidgetId,
    pub width: u32,
}

/// 平移子控件
#[derive(Debug, Clone)]
pub struct PositionedWidget {
    pub child: WidgetId,
    pub x: i32,
    pub y: i32,
}

/// 固定高度的滚动视口
#[derive(Debug, Clone)]
pub struct ScrollableWidget {
    pub child: WidgetId,
    pub height: u32,
    pub scroll: i32,
    pub step: i32,
}

/// 选项块：包装一个编号文本列表
#[derive(Debug, Clone)]
pub struct OptionsWidget {
    pub list: WidgetId,
    pub count: usize,
    /// 已提交选择后不再响应输入
    pub done: bool,
}

/// 控件种类
#[derive(Debug)]
pub enum WidgetKind {
    Text(TextWidget),
    Dialog(DialogWidget),
    Button(ButtonWidget),
    List(ListWidget),
    Limit(LimitWidget),
    Positioned(PositionedWidget),
    ScrollableArea(ScrollableWidget),
    Options(OptionsWidget),
}

impl WidgetKind {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetKind::Text(_) => "Text",
            WidgetKind::Dialog(_) => "Dialog",
            WidgetKind::Button(_) => "Button",
            WidgetKind::List(_) => "List",
            WidgetKind::Limit(_) => "Limit",
            WidgetKind::Positioned(_) => "Positioned",
            WidgetKind::ScrollableArea(_) => "ScrollableArea",
            WidgetKind::Options(_) => "Options",
        }
    }

    /// 直接拥有的子控件
    pub fn children(&self) -> Vec<WidgetId> {
        match self {
            WidgetKind::Text(_) => Vec::new(),
            WidgetKind::Dialog(d) => vec![d.character, d.value],
            WidgetKind::Button(b) => vec![b.text],
            WidgetKind::List(l) => l.children.clone(),
            WidgetKind::Limit(l) => vec![l.child],
            WidgetKind::Positioned(p) => vec![p.child],
            WidgetKind::ScrollableArea(s) => vec![s.child],
            WidgetKind::Options(o) => vec![o.list],
        }
    }
}

/// arena 中的节点
#[derive(Debug)]
pub struct WidgetNode {
    pub kind: WidgetKind,
    pub parent: Option<WidgetId>,
    pub dirty: bool,
    pub drawable: DrawableObject,
    /// 本节点分配并负责释放的渲染目标
    ///
    /// 直接复用子控件目标的节点（Limit / Positioned / Options）此项为 None。
    pub owned_target: Option<TargetId>,
    /// 0.0 - 1.0，被父控件合成时生效
    pub opacity: f32,
}

impl WidgetNode {
    fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            parent: None,
            dirty: true,
            drawable: DrawableObject::default(),
            owned_target: None,
            opacity: 1.0,
        }
    }
}
