//! winit + glutin surface driver for the compositor.
//!
//! The host owns the window, the GL context and the event loop. It calls the compositor's
//! surface callbacks and wakes the loop whenever a capture thread asks for a redraw.

use std::sync::{Arc, Mutex, PoisonError};

use glutin::prelude::GlSurface;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};

use arcam_compositor::Compositor;
use arcam_core::{EngineError, PipelineConfig, RedrawRequester, RenderMode, TouchEvent};
use arcam_runtime_glow::GlowBackend;

mod gl;
pub mod input;

pub use input::PointerTracker;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("display setup failed: {0}")]
    Display(String),

    #[error("window creation failed")]
    NoWindow,

    #[error(transparent)]
    Gl(#[from] glutin::error::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Redraw,
}

/// [`RedrawRequester`] that posts a user event into the winit loop.
#[derive(Debug)]
pub struct ProxyRedraw {
    proxy: Mutex<EventLoopProxy<HostEvent>>,
}

impl ProxyRedraw {
    pub fn new(proxy: EventLoopProxy<HostEvent>) -> Self {
        Self {
            proxy: Mutex::new(proxy),
        }
    }
}

impl RedrawRequester for ProxyRedraw {
    fn request_redraw(&self) {
        let proxy = self.proxy.lock().unwrap_or_else(PoisonError::into_inner);
        // Fails only after the loop has exited.
        let _ = proxy.send_event(HostEvent::Redraw);
    }
}

/// Open the window and drive `compositor` until the window closes.
///
/// Returns only on setup failure.
pub fn run(config: &PipelineConfig, mut compositor: Compositor) -> Result<(), HostError> {
    let event_loop = EventLoopBuilder::<HostEvent>::with_user_event().build();
    let gl::GlWindow {
        window,
        surface,
        context,
        gl,
    } = gl::make_gl(&event_loop, &config.window)?;

    let mut backend = unsafe { GlowBackend::new(gl)? };
    compositor.set_redraw_requester(Arc::new(ProxyRedraw::new(event_loop.create_proxy())));
    compositor.on_surface_ready(&mut backend)?;
    let size = window.inner_size();
    compositor.on_surface_resized(&mut backend, size.width as i32, size.height as i32);

    let mode = config.render_mode;
    let mut pointer = PointerTracker::new();
    tracing::info!(?mode, "entering event loop");

    event_loop.run(move |event, _, control_flow| {
        *control_flow = match mode {
            RenderMode::Continuous => ControlFlow::Poll,
            RenderMode::WhenDirty => ControlFlow::Wait,
        };

        let touch = |compositor: &mut Compositor, ev: Option<TouchEvent>| {
            if let Some(ev) = ev {
                if compositor.dispatch_touch(&ev) {
                    window.request_redraw();
                }
            }
        };

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                WindowEvent::Resized(size) => {
                    surface.resize(&context, gl::non_zero(size.width), gl::non_zero(size.height));
                    compositor.on_surface_resized(
                        &mut backend,
                        size.width as i32,
                        size.height as i32,
                    );
                    window.request_redraw();
                }
                WindowEvent::CursorMoved { position, .. } => {
                    touch(&mut compositor, pointer.cursor_moved(position.x, position.y));
                }
                WindowEvent::CursorLeft { .. } => touch(&mut compositor, pointer.cursor_left()),
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    let ev = pointer.left_button(state == ElementState::Pressed);
                    touch(&mut compositor, ev);
                }
                WindowEvent::Touch(t) => {
                    let ev = input::touch_event(t.phase, t.location.x, t.location.y, t.id);
                    touch(&mut compositor, Some(ev));
                }
                _ => {}
            },
            Event::UserEvent(HostEvent::Redraw) => window.request_redraw(),
            Event::MainEventsCleared => {
                if mode == RenderMode::Continuous {
                    window.request_redraw();
                }
            }
            Event::RedrawRequested(_) => {
                compositor.draw_frame(&mut backend);
                if let Err(e) = surface.swap_buffers(&context) {
                    tracing::error!(error = %e, "swap_buffers failed");
                }
            }
            Event::LoopDestroyed => {
                compositor.teardown(&mut backend);
                unsafe { backend.destroy() };
                tracing::info!("event loop finished");
            }
            _ => {}
        }
    })
}
