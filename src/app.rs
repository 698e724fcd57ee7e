//! Window, event loop and keyboard shortcuts
//!
//! | Key              | Action                                  |
//! |------------------|-----------------------------------------|
//! | W A S D          | Move (Shift sprints, Ctrl crawls)       |
//! | Mouse            | Look, while the cursor is captured      |
//! | Tab / click      | Release / capture the cursor            |
//! | M / N            | Next / previous display mode            |
//! | [ / ]            | Previous / next pyramid mip             |
//! | 1 2 3 4          | Toggle model, texture, lighting, PCF    |
//! | F / O            | Toggle frustum / occlusion culling      |
//! | Arrows           | Rotate the light                        |
//! | PageUp / PageDn  | Raise / lower the shadow bias           |
//! | = / -            | Stretch / shrink the LOD distances      |
//! | R                | Re-scatter the instances                |
//! | Escape           | Quit                                    |

use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowBuilder};

use crate::config::RendererConfig;
use crate::gpu::GpuContext;
use crate::input::{InputState, KeyCode};
use crate::renderer::{LogOverlay, Renderer};

const LIGHT_STEP: f32 = 0.05;
const SHADOW_BIAS_STEP: f32 = 0.0001;
const LOD_SCALE_STEP: f32 = 1.1;
const OVERLAY_LOG_INTERVAL: u64 = 600;

pub fn run(config: RendererConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        log::debug!("[app::run] env_logger already initialized: {}", e);
    }

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)
            .map_err(|e| {
                log::error!("[app::run] Window creation failed: {}", e);
                e
            })?,
    );

    let gpu = pollster::block_on(GpuContext::new(window.clone(), config.window.vsync))?;
    let mut renderer = Renderer::new(gpu, &config)?;
    renderer.set_overlay(Box::new(LogOverlay::new(OVERLAY_LOG_INTERVAL)));

    let mut input = InputState::new();
    let mut last_frame = std::time::Instant::now();
    set_cursor_capture(&window, &mut input, true);
    window.request_redraw();

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => renderer.resize(size.width, size.height),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    input.process_key(key, event.state);
                }
            }
            WindowEvent::MouseInput { state, .. } => {
                if *state == ElementState::Pressed && !input.is_cursor_locked() {
                    set_cursor_capture(&window, &mut input, true);
                }
            }
            WindowEvent::Focused(false) => {
                input.release_all();
                set_cursor_capture(&window, &mut input, false);
            }
            WindowEvent::RedrawRequested => {
                let now = std::time::Instant::now();
                let delta_time = (now - last_frame).as_secs_f32();
                last_frame = now;

                for key in input.take_pressed() {
                    match key {
                        KeyCode::Escape => elwt.exit(),
                        KeyCode::Tab => {
                            let capture = !input.is_cursor_locked();
                            set_cursor_capture(&window, &mut input, capture);
                        }
                        key => apply_shortcut(&mut renderer, key),
                    }
                }

                for movement in input.movements() {
                    renderer
                        .camera
                        .process_keyboard(movement, delta_time, input.sprint(), input.crawl());
                }
                let (dx, dy) = input.take_mouse_delta();
                renderer.camera.process_mouse(dx, dy);

                match renderer.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = window.inner_size();
                        renderer.resize(size.width, size.height);
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        log::warn!("[app::run] Surface acquire timed out, skipping frame");
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("[app::run] Out of GPU memory, exiting");
                        elwt.exit();
                    }
                }
            }
            _ => {}
        },
        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta },
            ..
        } => input.process_mouse_motion(delta),
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}

/// One-shot debug shortcuts
fn apply_shortcut(renderer: &mut Renderer, key: KeyCode) {
    let levels = renderer.pyramid_levels();
    let settings = &mut renderer.settings;
    match key {
        KeyCode::KeyM => settings.display_mode = settings.display_mode.next(),
        KeyCode::KeyN => settings.display_mode = settings.display_mode.previous(),
        KeyCode::BracketLeft => settings.display_mode = settings.display_mode.step_mip(-1, levels),
        KeyCode::BracketRight => settings.display_mode = settings.display_mode.step_mip(1, levels),
        KeyCode::Digit1 => settings.model_enabled = !settings.model_enabled,
        KeyCode::Digit2 => settings.texture_enabled = !settings.texture_enabled,
        KeyCode::Digit3 => settings.lighting_enabled = !settings.lighting_enabled,
        KeyCode::Digit4 => settings.pcf_enabled = !settings.pcf_enabled,
        KeyCode::KeyF => settings.frustum_culling = !settings.frustum_culling,
        KeyCode::KeyO => settings.occlusion_culling = !settings.occlusion_culling,
        KeyCode::ArrowLeft => settings.light.rotation.y -= LIGHT_STEP,
        KeyCode::ArrowRight => settings.light.rotation.y += LIGHT_STEP,
        KeyCode::ArrowUp => settings.light.rotation.x += LIGHT_STEP,
        KeyCode::ArrowDown => settings.light.rotation.x -= LIGHT_STEP,
        KeyCode::PageUp => {
            let bias = settings.shadow_bias() + SHADOW_BIAS_STEP;
            settings.set_shadow_bias(bias);
        }
        KeyCode::PageDown => {
            let bias = settings.shadow_bias() - SHADOW_BIAS_STEP;
            settings.set_shadow_bias(bias);
        }
        KeyCode::Equal => settings.scale_lod_distances(LOD_SCALE_STEP),
        KeyCode::Minus => settings.scale_lod_distances(1.0 / LOD_SCALE_STEP),
        KeyCode::KeyR => {
            renderer.regenerate_instances();
            return;
        }
        _ => return,
    }
    log::info!(
        "[app] {:?}: mode {:?}, frustum {}, occlusion {}, bias {:.4}",
        key,
        settings.display_mode,
        settings.frustum_culling,
        settings.occlusion_culling,
        settings.shadow_bias()
    );
}

fn set_cursor_capture(window: &Window, input: &mut InputState, capture: bool) {
    input.set_cursor_locked(capture);
    if !capture {
        window.set_cursor_grab(CursorGrabMode::None).ok();
        window.set_cursor_visible(true);
        return;
    }
    if let Err(e) = window.set_cursor_grab(CursorGrabMode::Locked) {
        log::warn!("[app] Cursor lock failed: {:?}, falling back to confined", e);
        window.set_cursor_grab(CursorGrabMode::Confined).ok();
    }
    window.set_cursor_visible(false);
}
