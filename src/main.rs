//! Block Tide entry point
//!
//! On the web this exposes a `BlockGrid` handle to JavaScript and drives the
//! frame loop from requestAnimationFrame. Natively it runs a headless viewer
//! for a fixed number of frames and logs what it rendered.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, MouseEvent, PointerEvent};

    use block_tide::contestants::ContestantRoster;
    use block_tide::renderer::{BlockRenderState, ProceduralShapes};
    use block_tide::sim::wave::ColorMode;
    use block_tide::{BlockClick, InitError, Scene, Settings, Viewer};

    /// Viewer plus the browser-side state around it
    struct App {
        viewer: Viewer<BlockRenderState>,
        settings: Settings,
        canvas: HtmlCanvasElement,
        on_click: Option<js_sys::Function>,
        frame_pending: bool,
    }

    /// State shared between listeners, the frame loop and the JS handle.
    ///
    /// Clicks are queued outside `app` so the scene callback never touches
    /// the borrowed app; the queue is drained once the borrow is released.
    #[derive(Clone)]
    struct Shared {
        app: Rc<RefCell<App>>,
        clicks: Rc<RefCell<Vec<BlockClick>>>,
    }

    impl Shared {
        fn flush_clicks(&self) {
            let clicks: Vec<BlockClick> = self.clicks.borrow_mut().drain(..).collect();
            if clicks.is_empty() {
                return;
            }
            let Some(callback) = self.app.borrow().on_click.clone() else {
                return;
            };
            for click in &clicks {
                if let Err(e) = callback.call1(&JsValue::NULL, &click_to_js(click)) {
                    log::warn!("Block click handler threw: {:?}", e);
                }
            }
        }
    }

    fn click_to_js(click: &BlockClick) -> JsValue {
        let obj = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&obj, &"index".into(), &(click.index as u32).into());
        let _ = js_sys::Reflect::set(&obj, &"blockId".into(), &click.id.0.into());
        let contestant = click.contestant.map_or(JsValue::NULL, |id| id.0.into());
        let _ = js_sys::Reflect::set(&obj, &"contestantId".into(), &contestant);
        obj.into()
    }

    fn to_js(e: InitError) -> JsValue {
        JsValue::from_str(&e.to_string())
    }

    /// Handle returned to JavaScript
    #[wasm_bindgen]
    pub struct BlockGrid {
        shared: Shared,
    }

    #[wasm_bindgen]
    impl BlockGrid {
        /// Filter to one category; pass `undefined` to clear
        pub fn set_active_category(&self, category: Option<String>) {
            let mut app = self.shared.app.borrow_mut();
            app.viewer.scene_mut().set_active_category(category.as_deref());
        }

        /// Emerge the agent of the highest-progress block in a category.
        /// Returns false when no block matches.
        pub fn activate_category_agent(&self, category: &str) -> bool {
            let result = self
                .shared
                .app
                .borrow_mut()
                .viewer
                .scene_mut()
                .activate_category_agent(category);
            self.shared.flush_clicks();
            match result {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("Cannot activate agent: {}", e);
                    false
                }
            }
        }

        /// "light" or "dark"
        pub fn set_color_mode(&self, mode: &str) -> bool {
            let Some(mode) = ColorMode::from_str(mode) else {
                log::warn!("Unknown color mode {:?}", mode);
                return false;
            };
            let mut app = self.shared.app.borrow_mut();
            let changed = app.viewer.scene_mut().set_color_mode(mode);
            if changed {
                app.settings.color_mode = mode;
                app.settings.save();
            }
            changed
        }

        /// `[x, y]` in CSS pixels, or undefined with no active agent
        pub fn agent_screen_position(&self) -> Option<Vec<f32>> {
            let app = self.shared.app.borrow();
            app.viewer
                .scene()
                .agent_screen_position()
                .map(|p| vec![p.x, p.y])
        }

        pub fn set_on_block_click(&self, callback: Option<js_sys::Function>) {
            self.shared.app.borrow_mut().on_click = callback;
        }

        pub fn start_animation(&self) {
            let schedule = {
                let mut app = self.shared.app.borrow_mut();
                app.viewer.start_animation();
                let schedule = app.viewer.is_animating() && !app.frame_pending;
                if schedule {
                    app.frame_pending = true;
                }
                schedule
            };
            if schedule {
                request_animation_frame(self.shared.clone());
            }
        }

        pub fn stop_animation(&self) {
            self.shared.app.borrow_mut().viewer.stop_animation();
        }

        pub fn dispose(&self) {
            let mut app = self.shared.app.borrow_mut();
            app.viewer.dispose();
            app.on_click = None;
            self.shared.clicks.borrow_mut().clear();
        }
    }

    async fn create_renderer(canvas: &HtmlCanvasElement, width: u32, height: u32) -> Result<BlockRenderState, InitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| InitError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| InitError::Adapter(e.to_string()))?;

        log::info!("Using adapter: {:?}", adapter.get_info().name);
        BlockRenderState::new(surface, &adapter, width, height).await
    }

    /// Mount a grid on the canvas with the given id
    #[wasm_bindgen(js_name = createBlockGrid)]
    pub async fn create_block_grid(canvas_id: String, contestants_json: String) -> Result<BlockGrid, JsValue> {
        let settings = Settings::load();
        let roster = ContestantRoster::from_json(&contestants_json)
            .map_err(InitError::from)
            .map_err(to_js)?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id(&canvas_id)
            .ok_or_else(|| JsValue::from_str(&format!("no element #{canvas_id}")))?
            .dyn_into()
            .map_err(|_| JsValue::from_str(&format!("#{canvas_id} is not a canvas")))?;

        let device_ratio = window.device_pixel_ratio() as f32;
        let css = Vec2::new(canvas.client_width() as f32, canvas.client_height() as f32);
        let ratio = settings.render_pixel_ratio(device_ratio);
        let width = ((css.x * ratio).round() as u32).max(1);
        let height = ((css.y * ratio).round() as u32).max(1);
        canvas.set_width(width);
        canvas.set_height(height);

        let seed = settings.seed.unwrap_or_else(|| js_sys::Date::now() as u64);
        let scene = Scene::new(&settings, roster, &ProceduralShapes::default(), css, seed).map_err(to_js)?;
        let renderer = create_renderer(&canvas, width, height).await;
        let mut viewer = Viewer::assemble(&settings, scene, renderer).map_err(to_js)?;
        viewer.resize(css.x, css.y, device_ratio);

        let clicks = Rc::new(RefCell::new(Vec::new()));
        let sink = clicks.clone();
        viewer
            .scene_mut()
            .set_on_block_click(Some(Box::new(move |click| sink.borrow_mut().push(*click))));

        let shared = Shared {
            app: Rc::new(RefCell::new(App {
                viewer,
                settings,
                canvas: canvas.clone(),
                on_click: None,
                frame_pending: true,
            })),
            clicks,
        };

        setup_input_handlers(&canvas, shared.clone());
        setup_resize_handler(shared.clone());
        request_animation_frame(shared.clone());

        log::info!("Block grid mounted on #{} with seed {}", canvas_id, seed);
        Ok(BlockGrid { shared })
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, shared: Shared) {
        // Pointer move drives the wave boost
        {
            let shared = shared.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                let screen = Vec2::new(event.offset_x() as f32, event.offset_y() as f32);
                shared.app.borrow_mut().viewer.scene_mut().set_pointer_screen(Some(screen));
            });
            let _ = canvas.add_event_listener_with_callback("pointermove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let shared = shared.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: PointerEvent| {
                shared.app.borrow_mut().viewer.scene_mut().set_pointer_screen(None);
            });
            let _ = canvas.add_event_listener_with_callback("pointerleave", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Click selects a block
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let screen = Vec2::new(event.offset_x() as f32, event.offset_y() as f32);
                let result = shared.app.borrow_mut().viewer.scene_mut().handle_click(screen);
                if let Ok(Some(click)) = result {
                    log::debug!("Clicked block {}", click.index);
                }
                shared.flush_clicks();
            });
            let _ = canvas.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize_handler(shared: Shared) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let Some(window) = web_sys::window() else {
                return;
            };
            let device_ratio = window.device_pixel_ratio() as f32;
            let mut app = shared.app.borrow_mut();
            let width = app.canvas.client_width() as f32;
            let height = app.canvas.client_height() as f32;
            if width <= 0.0 || height <= 0.0 {
                return;
            }
            let ratio = app.settings.render_pixel_ratio(device_ratio);
            if app.viewer.resize(width, height, device_ratio) {
                app.canvas.set_width((width * ratio).round() as u32);
                app.canvas.set_height((height * ratio).round() as u32);
            }
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(shared: Shared) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            frame_loop(shared, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn frame_loop(shared: Shared, time: f64) {
        let keep_going = {
            let mut app = shared.app.borrow_mut();
            let ran = app.viewer.frame(time);
            app.frame_pending = ran;
            ran
        };
        if keep_going {
            request_animation_frame(shared);
        }
    }

    pub fn init_logging() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");
        log::info!("Block Tide loaded");
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::init_logging();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(e) = native::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::error::Error;

    use glam::Vec2;

    use block_tide::contestants::ContestantRoster;
    use block_tide::renderer::{HeadlessRenderer, ProceduralShapes};
    use block_tide::sim::wave::ColorMode;
    use block_tide::{QualityPreset, Settings, Viewer};

    const FRAMES: u32 = 300;
    const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

    /// Usage: block-tide [contestants.json] [low|medium|high]
    pub fn run() -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args().skip(1);
        let roster = match args.next() {
            Some(path) => ContestantRoster::from_json(&std::fs::read_to_string(path)?)?,
            None => ContestantRoster::default(),
        };
        let settings = match args.next() {
            Some(name) => {
                let preset = QualityPreset::from_str(&name).ok_or_else(|| format!("unknown quality preset {name:?}"))?;
                Settings::from_preset(preset)
            }
            None => Settings::default(),
        };
        let seed = settings.seed.unwrap_or(42);

        log::info!(
            "Block Tide (native, headless) starting with {} contestants at {} quality",
            roster.len(),
            settings.quality.as_str()
        );
        let category = roster.iter().next().map(|c| c.category.clone());

        let mut viewer = Viewer::init(&settings, roster, &ProceduralShapes::default(), VIEWPORT, seed, |_| {
            Ok(HeadlessRenderer::new(VIEWPORT.x as u32, VIEWPORT.y as u32))
        })?;

        for frame in 0..FRAMES {
            if frame == FRAMES / 3 {
                viewer.scene_mut().set_color_mode(ColorMode::Dark);
            }
            if frame == FRAMES / 2
                && let Some(category) = category.as_deref()
            {
                viewer.scene_mut().set_active_category(Some(category));
                match viewer.scene_mut().activate_category_agent(category) {
                    Ok(click) => log::info!("Agent emerged on block {}", click.index),
                    Err(e) => log::warn!("{}", e),
                }
            }
            viewer.step(1.0 / 60.0);
        }

        let scene = viewer.scene();
        log::info!(
            "Rendered {} frames: {} blocks, {} instances in {} draw calls, {} geometry uploads",
            viewer.renderer().frames(),
            scene.blocks().len(),
            viewer.renderer().instances(),
            viewer.renderer().draw_calls(),
            viewer.renderer().uploads()
        );
        if let Some(pos) = scene.agent_screen_position() {
            log::info!("Agent on screen at ({:.1}, {:.1})", pos.x, pos.y);
        }

        viewer.dispose();
        Ok(())
    }
}
