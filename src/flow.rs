//! Application event loop.
//!
//! [`App`] owns the [`SceneSession`] and, once the window exists, the GPU
//! [`Context`]. Everything that touches either runs on the event-loop thread:
//! model loads run elsewhere and come back as [`ViewerEvent::Loaded`] user
//! events.
//!
//! # Frame loop
//!
//! Each `RedrawRequested`:
//! 1. schedules the next frame with `request_redraw`
//! 2. applies pending orbit input to the camera
//! 3. advances every model's animation clock ([`advance_frame`])
//! 4. draws the scene

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    config::{AnimationStep, ViewerConfig},
    context::Context,
    loader::{self, LoadCompletion},
    resources::StaticFiles,
    session::SceneSession,
};

/// Id of the page canvas to draw into; created when the page has none.
#[cfg(target_arch = "wasm32")]
const CANVAS_ID: &str = "canvas";

/// Results delivered to the event-loop thread.
pub enum ViewerEvent {
    Loaded(LoadCompletion),
    #[cfg(target_arch = "wasm32")]
    Initialized(anyhow::Result<Box<Context>>),
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded(completion) => f
                .debug_tuple("Loaded")
                .field(&completion.placement.folder)
                .finish(),
            #[cfg(target_arch = "wasm32")]
            Self::Initialized(_) => f.write_str("Initialized"),
        }
    }
}

/// How much animation time passes per frame.
#[derive(Debug)]
pub struct FrameClock {
    step: AnimationStep,
    last: Instant,
}

impl FrameClock {
    pub fn new(step: AnimationStep) -> Self {
        Self {
            step,
            last: Instant::now(),
        }
    }

    /// Seconds to advance this frame: the fixed step, or the time since the last tick.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        match self.step {
            AnimationStep::Fixed { seconds } => seconds,
            AnimationStep::Measured => elapsed.as_secs_f32(),
        }
    }
}

/// The model side of one frame: animation clocks first, then world transforms.
pub fn advance_frame(session: &mut SceneSession, dt: f32) {
    session.advance_animations(dt);
    session.update_world_transforms();
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    session: SceneSession,
    ctx: Option<Context>,
    clock: FrameClock,
    loads_started: bool,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            clock: FrameClock::new(config.animation),
            config,
            session: SceneSession::new(),
            ctx: None,
            loads_started: false,
        })
    }

    /// Starts one load per configured placement. Completions arrive as user events.
    fn start_loads(&mut self) {
        if std::mem::replace(&mut self.loads_started, true) {
            return;
        }
        let placements = self.config.models.clone();
        let proxy = self.proxy.clone();
        let send = move |completion: LoadCompletion| {
            if proxy.send_event(ViewerEvent::Loaded(completion)).is_err() {
                log::warn!("Event loop closed before a model finished loading");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let handle = self.async_runtime.handle().clone();
            self.async_runtime.spawn_blocking(move || {
                handle.block_on(loader::load_each(&StaticFiles::default(), placements, send))
            });
        }

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(async move {
            loader::load_each(&StaticFiles::default(), placements, send).await
        });
    }

    fn set_context(&mut self, event_loop: &ActiveEventLoop, ctx: anyhow::Result<Context>) {
        match ctx {
            Ok(mut ctx) => {
                let size = ctx.window().inner_size();
                ctx.resize(size.width, size.height);
                ctx.window().request_redraw();
                self.ctx = Some(ctx);
            }
            Err(e) => {
                log::error!("Cannot set up rendering: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn redraw(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        // schedule ahead, the browser maps this to requestAnimationFrame
        ctx.window().request_redraw();

        ctx.update_camera();
        advance_frame(&mut self.session, self.clock.tick());

        match ctx.draw(self.session.scene()) {
            Ok(()) => {}
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => ctx.reconfigure(),
            Err(e) => log::error!("Unable to render {}", e),
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // the window and loads are set up once, on the first resume
        if self.loads_started {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("Orbit Showcase");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .map(|canvas| canvas.unchecked_into::<web_sys::HtmlCanvasElement>());
            window_attributes = match canvas {
                Some(canvas) => window_attributes.with_canvas(Some(canvas)),
                None => {
                    log::info!("No #{} element, appending a canvas to the page", CANVAS_ID);
                    window_attributes.with_append(true)
                }
            };
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        self.start_loads();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let ctx = self
                .async_runtime
                .block_on(Context::new(window, &self.config));
            self.set_context(event_loop, ctx);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let ctx = Context::new(window, &config).await.map(Box::new);
                if proxy.send_event(ViewerEvent::Initialized(ctx)).is_err() {
                    log::error!("Event loop closed during setup");
                }
            });
        }
    }

    #[allow(unused_variables)]
    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Loaded(completion) => loader::complete(&mut self.session, completion),
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::Initialized(ctx) => self.set_context(event_loop, ctx.map(|ctx| *ctx)),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        ctx.camera
            .controller
            .handle_window_events(&ctx.camera.camera, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => ctx.resize(size.width, size.height),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

/// Sets up logging: `env_logger` natively (`RUST_LOG` picks the level), the
/// browser console on the web.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }
}

/// Opens the viewer and runs it until the window closes.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    log::info!("Starting with {} models", config.models.len());
    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_ignores_wall_time() {
        let mut clock = FrameClock::new(AnimationStep::Fixed { seconds: 1.0 / 60.0 });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(clock.tick(), 1.0 / 60.0);
        assert_eq!(clock.tick(), 1.0 / 60.0);
    }

    #[test]
    fn measured_clock_follows_wall_time() {
        let mut clock = FrameClock::new(AnimationStep::Measured);
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(clock.tick() >= 0.019);
    }
}
