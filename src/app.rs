use std::path::{Path, PathBuf};
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowAttributes, WindowId};

use crate::console::{Axis, CameraCoordinates, Direction};
use crate::input::{InputEvent, InputTranslator, Key};
use crate::loader::{DecodeError, FormatTag, LoaderRegistry};
use crate::model::Model;
use crate::render::WindowCanvas;
use crate::viewer::Viewer;

/// Window and startup settings for the desktop viewer.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub format: FormatTag,
    /// Initial camera coordinates as typed by the user.
    pub camera: [String; 3],
    /// Asset decoded right after the window opens.
    pub asset: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Vantage".to_string(),
            width: 1280,
            height: 720,
            format: FormatTag::Gltf,
            camera: ["5".to_string(), "5".to_string(), "5".to_string()],
            asset: None,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn format(mut self, format: FormatTag) -> Self {
        self.format = format;
        self
    }

    pub fn camera(mut self, x: impl Into<String>, y: impl Into<String>, z: impl Into<String>) -> Self {
        self.camera = [x.into(), y.into(), z.into()];
        self
    }

    pub fn asset(mut self, path: impl Into<PathBuf>) -> Self {
        self.asset = Some(path.into());
        self
    }
}

/// Events delivered to the window thread from decode workers.
#[derive(Debug)]
pub enum ViewerEvent {
    Decoded {
        name: String,
        format: FormatTag,
        result: Result<Model, String>,
    },
}

/// Opens the viewer window and runs until it is closed.
pub fn run(config: AppConfig) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);
    let proxy = event_loop.create_proxy();

    let mut app = ViewerApp::Pending { config, proxy };
    event_loop.run_app(&mut app)
}

enum ViewerApp {
    Pending {
        config: AppConfig,
        proxy: EventLoopProxy<ViewerEvent>,
    },
    Running {
        window: Arc<Window>,
        title: String,
        viewer: Viewer<WindowCanvas>,
        translator: InputTranslator,
        proxy: EventLoopProxy<ViewerEvent>,
        model_name: Option<String>,
        recolor_seed: u32,
    },
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let ViewerApp::Pending { config, proxy } = self else {
            return;
        };

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to open window: {err}");
                event_loop.exit();
                return;
            }
        };

        let [x, y, z] = &config.camera;
        let viewer = Viewer::new(WindowCanvas::new(window.clone()))
            .with_format(config.format)
            .with_camera_position(CameraCoordinates::parse(x, y, z).to_vec3());

        if let Some(path) = &config.asset {
            spawn_decode(path, config.format, viewer.loaders().clone(), proxy.clone());
        }

        *self = ViewerApp::Running {
            window,
            title: config.title.clone(),
            viewer,
            translator: InputTranslator::new(),
            proxy: proxy.clone(),
            model_name: None,
            recolor_seed: 0,
        };
        self.refresh_title("drop a model file to load it");
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let ViewerApp::Running {
            window,
            viewer,
            translator,
            proxy,
            ..
        } = self
        else {
            return;
        };

        for input in translator.translate(&event) {
            viewer.dispatch(&input);
            if let InputEvent::KeyDown(Key::Code(code)) = input {
                if code == KeyCode::Escape {
                    viewer.shutdown();
                    event_loop.exit();
                    return;
                }
                self.handle_key(code);
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                viewer.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                viewer.resize(size.width, size.height);
                window.request_redraw();
            }
            WindowEvent::DroppedFile(path) => {
                spawn_decode(&path, viewer.format(), viewer.loaders().clone(), proxy.clone());
            }
            WindowEvent::RedrawRequested => {
                if viewer.frame() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        let ViewerApp::Running {
            window,
            viewer,
            model_name,
            ..
        } = self
        else {
            return;
        };

        let ViewerEvent::Decoded {
            name,
            format,
            result,
        } = event;
        let status = match result {
            Ok(model) => match viewer.show_model(model) {
                Ok(()) => {
                    *model_name = Some(name);
                    window.request_redraw();
                    None
                }
                Err(err) => {
                    log::error!("{name}: {err}");
                    Some(format!("{name}: could not start renderer"))
                }
            },
            Err(err) => {
                log::error!("{name} ({format}): {err}");
                Some(format!("{name}: decode failed"))
            }
        };
        self.refresh_title(status.as_deref().unwrap_or(""));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let ViewerApp::Running { viewer, .. } = self {
            viewer.shutdown();
        }
    }
}

impl ViewerApp {
    /// Transform console key bindings.
    fn handle_key(&mut self, code: KeyCode) {
        let ViewerApp::Running {
            window,
            viewer,
            recolor_seed,
            ..
        } = self
        else {
            return;
        };

        let format = match code {
            KeyCode::Digit1 => Some(FormatTag::Gltf),
            KeyCode::Digit2 => Some(FormatTag::Glb),
            KeyCode::Digit3 => Some(FormatTag::Obj),
            KeyCode::Digit4 => Some(FormatTag::Fbx),
            KeyCode::Digit5 => Some(FormatTag::Stl),
            _ => None,
        };
        if let Some(format) = format {
            viewer.select_format(format);
            self.refresh_title("");
            return;
        }

        use Direction::{Negative, Positive};
        let changed = match code {
            KeyCode::KeyQ => viewer.rotate_model(Axis::X, Positive),
            KeyCode::KeyA => viewer.rotate_model(Axis::X, Negative),
            KeyCode::KeyW => viewer.rotate_model(Axis::Y, Positive),
            KeyCode::KeyS => viewer.rotate_model(Axis::Y, Negative),
            KeyCode::KeyE => viewer.rotate_model(Axis::Z, Positive),
            KeyCode::KeyD => viewer.rotate_model(Axis::Z, Negative),
            KeyCode::ArrowRight => viewer.translate_model(Axis::X, Positive),
            KeyCode::ArrowLeft => viewer.translate_model(Axis::X, Negative),
            KeyCode::ArrowUp => viewer.translate_model(Axis::Y, Positive),
            KeyCode::ArrowDown => viewer.translate_model(Axis::Y, Negative),
            KeyCode::PageUp => viewer.translate_model(Axis::Z, Positive),
            KeyCode::PageDown => viewer.translate_model(Axis::Z, Negative),
            KeyCode::KeyC => {
                *recolor_seed = recolor_seed.wrapping_add(1);
                viewer.recolor_model(*recolor_seed)
            }
            _ => false,
        };
        if changed {
            window.request_redraw();
        }
    }

    fn refresh_title(&self, status: &str) {
        let ViewerApp::Running {
            window,
            title,
            viewer,
            model_name,
            ..
        } = self
        else {
            return;
        };

        let mut text = format!("{title} [{}]", viewer.format());
        if let Some(name) = model_name {
            text.push_str(&format!(" - {name}"));
            if let Some(session) = viewer.session() {
                text.push_str(match session.placement() {
                    Ok(_) => " (marker placed)",
                    Err(_) => " (marker placement failed)",
                });
            }
        }
        if !status.is_empty() {
            text.push_str(&format!(" - {status}"));
        }
        window.set_title(&text);
    }
}

/// Reads and decodes a file off the window thread.
fn spawn_decode(
    path: &Path,
    format: FormatTag,
    loaders: LoaderRegistry,
    proxy: EventLoopProxy<ViewerEvent>,
) {
    let path = path.to_path_buf();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    log::info!("loading {} as {format}", path.display());

    std::thread::spawn(move || {
        let result = std::fs::read(&path)
            .map_err(DecodeError::Io)
            .and_then(|bytes| loaders.load(format, &bytes, &name))
            .map_err(|err| err.to_string());
        if proxy
            .send_event(ViewerEvent::Decoded {
                name,
                format,
                result,
            })
            .is_err()
        {
            log::debug!("event loop closed before decode finished");
        }
    });
}
