//! Prism engine entry point.
//!
//! Wires the window event loop to the renderer: one `draw_frame` per
//! redraw, resize events forwarded to the backend, Escape to quit.

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use prism_core::Timer;
use prism_platform::{InputState, Window};
use prism_render::{RenderPacket, Renderer};
use prism_vulkan::VulkanBackend;

const APP_NAME: &str = "Prism Sandbox";

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    timer: Timer,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            input: InputState::new(),
            timer: Timer::new(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, 1280, 720, APP_NAME) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match VulkanBackend::new(APP_NAME, &window) {
            Ok(backend) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(Renderer::new(Box::new(backend)));
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to initialize renderer backend: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.on_resized(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let delta_time = self.timer.tick();
                let packet = RenderPacket { delta_time };

                if let Some(renderer) = self.renderer.as_mut() {
                    if !renderer.draw_frame(&packet) {
                        error!("Unrecoverable render failure, exiting");
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                        if key == KeyCode::Escape {
                            event_loop.exit();
                        }
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    prism_core::init_logging();
    info!("Starting {}", APP_NAME);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    Ok(())
}
