//! 更新逻辑
//!
//! 每帧顺序：
//! 1. 逐个处理输入事件：退出、确认键推进脚本、分发给控件树
//! 2. 处理控件回调产生的动作（开始 / 退出）
//! 3. 检查待处理的选择结果：移除选项块并以选中的索引恢复脚本
//! 4. 绘制
//! 5. 推进动画

use std::time::Duration;

use tracing::{debug, error, info, warn};
use vn_runtime::{Command, NarrativeState, RuntimeError, RuntimeInput, VNRuntime, VnResult};

use super::{AppState, apply_commands, draw};
use crate::input::InputEvent;
use crate::render::RenderBackend;
use crate::ui::{EventContext, UiAction};

/// 单帧更新
pub fn update<B: RenderBackend>(app: &mut AppState<B>, events: &[InputEvent], dt: Duration) {
    app.frame += 1;

    let mut actions = Vec::new();
    for event in events {
        if let Some((x, y)) = event.position() {
            app.backend.sync_pointer(x, y);
        }
        match event {
            InputEvent::Quit => {
                info!("收到退出事件");
                app.running = false;
            }
            InputEvent::KeyUp(key) if key.is_advance() => advance(app),
            _ => {}
        }
        actions.extend(dispatch_event(app, event));
    }

    for action in actions {
        handle_action(app, action);
    }

    // 所有事件分发完之后再检查，同一批事件中做出的选择在本帧生效
    resolve_choice(app);

    if let Err(e) = draw(app) {
        warn!(frame = app.frame, error = %e, "本帧绘制失败，跳过");
    }

    app.animations.tick(&mut app.tree, dt);
}

/// 把事件分发给所有根控件，返回回调产生的动作
fn dispatch_event<B: RenderBackend>(app: &mut AppState<B>, event: &InputEvent) -> Vec<UiAction> {
    let pointer = app.backend.pointer();
    let roots = app.roots();
    let mut ctx = EventContext::new(pointer, app.runtime.pending_choice_mut());
    for root in roots {
        if let Err(e) = app.tree.handle_event(root, event, &mut ctx) {
            warn!(error = %e, "控件处理事件失败");
        }
    }
    ctx.take_actions()
}

/// 确认键：仅在 Novel 状态恢复脚本
fn advance<B: RenderBackend>(app: &mut AppState<B>) {
    if app.halted {
        return;
    }
    match app.runtime.state() {
        NarrativeState::Novel => drive(app, |runtime| runtime.tick(RuntimeInput::Advance)),
        NarrativeState::End => debug!("剧本已结束，忽略推进"),
        state => debug!(state = %state, "当前状态不响应推进"),
    }
}

fn handle_action<B: RenderBackend>(app: &mut AppState<B>, action: UiAction) {
    match action {
        UiAction::StartNovel => {
            if app.runtime.state() != NarrativeState::Menu {
                debug!("不在主菜单，忽略开始");
                return;
            }
            if let Some(menu) = app.menu.take() {
                if let Err(e) = app.tree.destroy(menu, &mut app.backend) {
                    warn!(error = %e, "销毁主菜单失败");
                }
            }
            info!("开始游戏");
            drive(app, VNRuntime::begin);
        }
        UiAction::Quit => {
            info!("从主菜单退出");
            app.running = false;
        }
    }
}

/// 消费选项控件写入的选择结果
fn resolve_choice<B: RenderBackend>(app: &mut AppState<B>) {
    if app.halted
        || app.runtime.state() != NarrativeState::AwaitingChoice
        || app.runtime.pending_choice().is_empty()
    {
        return;
    }

    if let Err(e) = app
        .tree
        .remove_last_widget(app.panel.dialogs, &mut app.backend)
    {
        warn!(error = %e, "移除选项块失败");
    }

    match app.runtime.resolve_pending_choice() {
        Ok(Some((index, commands))) => {
            debug!(index, "选择已消费，脚本继续");
            apply(app, commands);
        }
        Ok(None) => {}
        Err(e) => halt(app, e),
    }
}

/// 驱动 Runtime 一步，并把产生的指令应用到场景
///
/// Runtime 报错时停止会话，控件树保持原样。
pub fn drive<B, F>(app: &mut AppState<B>, step: F)
where
    B: RenderBackend,
    F: FnOnce(&mut VNRuntime) -> VnResult<Vec<Command>>,
{
    match step(&mut app.runtime) {
        Ok(commands) => apply(app, commands),
        Err(e) => halt(app, e),
    }
}

fn apply<B: RenderBackend>(app: &mut AppState<B>, commands: Vec<Command>) {
    if let Err(e) = apply_commands(app, commands) {
        error!(error = %e, "应用指令失败");
    }
}

fn halt<B: RenderBackend>(app: &mut AppState<B>, e: RuntimeError) {
    error!(error = %e, state = %app.runtime.state(), "脚本会话已停止");
    app.halted = true;
    app.fault = Some(e);
}

/// 帧节奏：返回（本帧 dt，需要休眠的时间）
///
/// 未超出帧预算时 dt 为固定的 `1/fps`；超出时使用实际耗时且不休眠。
pub fn frame_timing(fps: u32, elapsed: Duration) -> (Duration, Duration) {
    let budget = Duration::from_secs(1) / fps.max(1);
    if elapsed < budget {
        (budget, budget - elapsed)
    } else {
        (elapsed, Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timing_within_budget() {
        let (dt, sleep) = frame_timing(30, Duration::from_millis(10));
        assert_eq!(dt, Duration::from_secs(1) / 30);
        assert_eq!(sleep, Duration::from_secs(1) / 30 - Duration::from_millis(10));
    }

    #[test]
    fn test_frame_timing_overrun() {
        let (dt, sleep) = frame_timing(30, Duration::from_millis(50));
        assert_eq!(dt, Duration::from_millis(50));
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn test_frame_timing_zero_fps() {
        let (dt, _) = frame_timing(0, Duration::ZERO);
        assert_eq!(dt, Duration::from_secs(1));
    }
}
