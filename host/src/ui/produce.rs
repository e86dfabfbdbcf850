//! 按需重算 DrawableObject
//!
//! 脏节点先递归重算子节点，再把子节点产物合成到新分配的渲染目标上，
//! 最后释放旧目标并清除脏标记。不脏的节点直接返回缓存。

use tracing::trace;

use super::{DrawableObject, UiError, WidgetId, WidgetKind, WidgetTree};
use crate::render::{BlendMode, FontId, FontManager, Rect, RenderBackend, Rgba, TargetId};

/// 重算所需的外部能力
pub struct RenderContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub fonts: &'a mut FontManager,
}

/// 从节点中取出的重算计划，避免在递归期间借用节点
enum Plan {
    Text {
        text: String,
        color: Rgba,
        font: FontId,
        wrap: Option<u32>,
    },
    Dialog {
        character: WidgetId,
        value: WidgetId,
        limit: Option<u32>,
    },
    Button {
        text: WidgetId,
        background: Rgba,
        padding: u32,
    },
    List {
        children: Vec<WidgetId>,
        spacing: u32,
    },
    /// 直接复用子控件产物，附加平移
    Reuse { child: WidgetId, dx: i32, dy: i32 },
    Scroll { child: WidgetId, height: u32 },
}

impl WidgetTree {
    fn plan(&self, id: WidgetId) -> Result<Plan, UiError> {
        let plan = match &self.node(id)?.kind {
            WidgetKind::Text(t) => Plan::Text {
                text: t.text.clone(),
                color: t.color,
                font: t.font,
                wrap: t.wrap,
            },
            WidgetKind::Dialog(d) => Plan::Dialog {
                character: d.character,
                value: d.value,
                limit: d.limit,
            },
            WidgetKind::Button(b) => Plan::Button {
                text: b.text,
                background: b.colors.pick(b.hovered).0,
                padding: b.padding,
            },
            WidgetKind::List(l) => Plan::List {
                children: l.children.clone(),
                spacing: l.spacing,
            },
            WidgetKind::Limit(l) => Plan::Reuse {
                child: l.child,
                dx: 0,
                dy: 0,
            },
            WidgetKind::Positioned(p) => Plan::Reuse {
                child: p.child,
                dx: p.x,
                dy: p.y,
            },
            WidgetKind::Options(o) => Plan::Reuse {
                child: o.list,
                dx: 0,
                dy: 0,
            },
            WidgetKind::ScrollableArea(s) => Plan::Scroll {
                child: s.child,
                height: s.height,
            },
        };
        Ok(plan)
    }

    /// 取得控件的渲染产物，必要时重算
    ///
    /// 成功返回后该控件不再为脏；再次调用返回同一份缓存，不重新分配。
    pub fn produce(
        &mut self,
        id: WidgetId,
        ctx: &mut RenderContext<'_>,
    ) -> Result<DrawableObject, UiError> {
        let node = self.node(id)?;
        if !node.dirty {
            return Ok(node.drawable);
        }

        match self.plan(id)? {
            Plan::Text {
                text,
                color,
                font,
                wrap,
            } => {
                let surface = ctx.fonts.render(font, &text, color, wrap)?;
                let target = ctx.backend.upload_surface(&surface)?;
                let drawable = DrawableObject {
                    x: 0,
                    y: 0,
                    w: surface.width(),
                    h: surface.height(),
                    target: Some(target),
                };
                self.commit(id, drawable, Some(target), ctx)
            }

            Plan::Dialog {
                character,
                value,
                limit,
            } => {
                let name = self.produce(character, ctx)?;
                if let Some(limit) = limit {
                    let wrap = limit.saturating_sub(name.w).max(1);
                    if self.text_wrap(value) != Some(wrap) {
                        self.set_limit(value, wrap)?;
                    }
                }
                let line = self.produce(value, ctx)?;

                let w = name.w + line.w;
                let h = name.h.max(line.h);
                let parts = [(character, name, 0, 0), (value, line, name.w as i32, 0)];
                self.composite(id, w, h, None, &parts, ctx)
            }

            Plan::Button {
                text,
                background,
                padding,
            } => {
                let label = self.produce(text, ctx)?;
                let w = label.w + padding * 2;
                let h = label.h + padding * 2;
                let parts = [(text, label, padding as i32, padding as i32)];
                self.composite(id, w, h, Some(background), &parts, ctx)
            }

            Plan::List { children, spacing } => {
                let mut parts = Vec::with_capacity(children.len());
                let mut width = 0i64;
                let mut cursor = 0i64;
                for child in children {
                    let d = self.produce(child, ctx)?;
                    width = width.max(d.w as i64 + d.x as i64);
                    parts.push((child, d, d.x, (cursor + d.y as i64) as i32));
                    cursor += d.h as i64 + d.y as i64 + spacing as i64;
                }
                let height = if parts.is_empty() {
                    0
                } else {
                    cursor - spacing as i64
                };
                let w = width.clamp(0, u32::MAX as i64) as u32;
                let h = height.clamp(0, u32::MAX as i64) as u32;
                self.composite(id, w, h, None, &parts, ctx)
            }

            Plan::Reuse { child, dx, dy } => {
                let d = self.produce(child, ctx)?;
                let drawable = DrawableObject {
                    x: d.x + dx,
                    y: d.y + dy,
                    ..d
                };
                self.commit(id, drawable, None, ctx)
            }

            Plan::Scroll { child, height } => {
                let content = self.produce(child, ctx)?;
                let max = content.h.saturating_sub(height) as i32;
                let scroll = match self.kind_mut(id)? {
                    WidgetKind::ScrollableArea(s) => {
                        s.scroll = s.scroll.clamp(0, max);
                        s.scroll
                    }
                    _ => 0,
                };

                let w = (content.x.max(0) as u32)
                    .saturating_add(content.w)
                    .max(1);
                let target = ctx.backend.create_target(w, height.max(1))?;
                let drawn = self.draw_scrolled(child, content, scroll, height, target, ctx);
                if let Err(e) = drawn {
                    self.abandon(target, ctx);
                    return Err(e);
                }
                let drawable = DrawableObject {
                    x: 0,
                    y: 0,
                    w,
                    h: height.max(1),
                    target: Some(target),
                };
                self.commit(id, drawable, Some(target), ctx)
            }
        }
    }

    /// 产出并直接绘制到屏幕（根控件使用）
    pub fn draw_to_screen(
        &mut self,
        id: WidgetId,
        ctx: &mut RenderContext<'_>,
    ) -> Result<DrawableObject, UiError> {
        let d = self.produce(id, ctx)?;
        ctx.backend.set_draw_target(None)?;
        self.blit(id, d, d.x, d.y, ctx)?;
        Ok(d)
    }

    /// 分配新目标并合成各部分；尺寸下限为 1
    fn composite(
        &mut self,
        id: WidgetId,
        w: u32,
        h: u32,
        background: Option<Rgba>,
        parts: &[(WidgetId, DrawableObject, i32, i32)],
        ctx: &mut RenderContext<'_>,
    ) -> Result<DrawableObject, UiError> {
        let (w, h) = (w.max(1), h.max(1));
        let target = ctx.backend.create_target(w, h)?;

        if let Err(e) = self.draw_parts(target, background, parts, ctx) {
            self.abandon(target, ctx);
            return Err(e);
        }

        let drawable = DrawableObject {
            x: 0,
            y: 0,
            w,
            h,
            target: Some(target),
        };
        trace!(widget = ?id, w, h, "合成控件");
        self.commit(id, drawable, Some(target), ctx)
    }

    fn draw_parts(
        &self,
        target: TargetId,
        background: Option<Rgba>,
        parts: &[(WidgetId, DrawableObject, i32, i32)],
        ctx: &mut RenderContext<'_>,
    ) -> Result<(), UiError> {
        ctx.backend.set_blend(target, BlendMode::Blend)?;
        ctx.backend.set_draw_target(Some(target))?;
        if let Some(bg) = background {
            ctx.backend.clear(bg)?;
        }
        for (child, d, x, y) in parts {
            self.blit(*child, *d, *x, *y, ctx)?;
        }
        ctx.backend.set_draw_target(None)?;
        Ok(())
    }

    fn draw_scrolled(
        &self,
        child: WidgetId,
        content: DrawableObject,
        scroll: i32,
        height: u32,
        target: TargetId,
        ctx: &mut RenderContext<'_>,
    ) -> Result<(), UiError> {
        ctx.backend.set_blend(target, BlendMode::Blend)?;
        let visible = content.h.saturating_sub(scroll as u32).min(height);
        if let (Some(src), true) = (content.target, visible > 0) {
            ctx.backend.set_draw_target(Some(target))?;
            ctx.backend.set_alpha(src, self.alpha_of(child))?;
            ctx.backend.copy(
                src,
                Some(Rect::new(0, scroll, content.w, visible)),
                Rect::new(content.x, content.y, content.w, visible),
            )?;
            ctx.backend.set_draw_target(None)?;
        }
        Ok(())
    }

    /// 以子控件的透明度把其产物复制到当前绘制目标
    fn blit(
        &self,
        child: WidgetId,
        d: DrawableObject,
        x: i32,
        y: i32,
        ctx: &mut RenderContext<'_>,
    ) -> Result<(), UiError> {
        if let Some(src) = d.target {
            ctx.backend.set_alpha(src, self.alpha_of(child))?;
            ctx.backend.copy(src, None, Rect::new(x, y, d.w, d.h))?;
        }
        Ok(())
    }

    /// 产物的有效透明度
    ///
    /// Limit / Positioned / Options 与子控件共用同一目标，透明度沿这条链相乘。
    fn alpha_of(&self, id: WidgetId) -> u8 {
        let mut opacity = 1.0f32;
        let mut current = id;
        loop {
            opacity *= self.opacity(current).unwrap_or(1.0);
            current = match self.kind(current) {
                Some(WidgetKind::Limit(l)) => l.child,
                Some(WidgetKind::Positioned(p)) => p.child,
                Some(WidgetKind::Options(o)) => o.list,
                _ => break,
            };
        }
        (opacity * 255.0).round().clamp(0.0, 255.0) as u8
    }

    /// 合成失败时释放刚分配的目标
    fn abandon(&self, target: TargetId, ctx: &mut RenderContext<'_>) {
        let _ = ctx.backend.set_draw_target(None);
        let _ = ctx.backend.destroy_target(target);
    }

    /// 写入新产物、清除脏标记，再释放旧目标（恰好一次）
    fn commit(
        &mut self,
        id: WidgetId,
        drawable: DrawableObject,
        owned: Option<TargetId>,
        ctx: &mut RenderContext<'_>,
    ) -> Result<DrawableObject, UiError> {
        let node = self.node_mut(id)?;
        let old = std::mem::replace(&mut node.owned_target, owned);
        node.drawable = drawable;
        node.dirty = false;
        if let Some(old) = old {
            ctx.backend.destroy_target(old)?;
        }
        Ok(drawable)
    }
}
