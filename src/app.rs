use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::time;

use nalgebra as na;
use na::vector;
use obj::{load_obj, Obj, TexturedVertex};
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

use crate::camera::{Camera, CameraInput};
use crate::mesh::Mesh;
use crate::renderer::Renderer;
use crate::texture::TextureSet;

/// Look speed in input device units per second while an arrow key is held,
/// standing in for relative mouse deltas.
const LOOK_SPEED: f32 = 360.0;

pub struct Params {
    pub width: u32,
    pub height: u32,
    pub print_fps: bool,
    pub asset_path: String,
}

/// What a drained window event asks the frame loop to do.
enum EventAction {
    None,
    Exit,
    Snapshot,
}

/// Updates the pressed key set and fires toggles. Toggles react to the
/// release edge, so key repeat does not retrigger them.
fn process_event(
    window_event: event::WindowEvent,
    pressed_keys: &mut HashSet<event::VirtualKeyCode>,
    renderer: &mut Renderer,
) -> EventAction {
    if let event::WindowEvent::KeyboardInput(keyboard_event) = window_event {
        if let Some(key_code) = keyboard_event.input.key_code {
            if keyboard_event.input.state.is_pressed() {
                pressed_keys.insert(key_code);
            } else {
                pressed_keys.remove(&key_code);
                match key_code {
                    event::VirtualKeyCode::Escape => return EventAction::Exit,
                    event::VirtualKeyCode::F4 => renderer.toggle_depth_view(),
                    event::VirtualKeyCode::F5 => renderer.toggle_rotation(),
                    event::VirtualKeyCode::F6 => renderer.toggle_normal_map(),
                    event::VirtualKeyCode::F7 => {
                        renderer.cycle_lighting_mode();
                        log::info!("Lighting mode: {:?}", renderer.lighting_mode());
                    }
                    event::VirtualKeyCode::X => return EventAction::Snapshot,
                    _ => (),
                }
            }
        }
    }
    return EventAction::None;
}

/// Translates the currently held keys into one frame of camera input.
fn camera_input(pressed_keys: &HashSet<event::VirtualKeyCode>, delta_time: f32) -> CameraInput {
    use event::VirtualKeyCode as Key;
    let held = |key: Key| pressed_keys.contains(&key);

    let mut input = CameraInput {
        move_forward: held(Key::W),
        move_backward: held(Key::S),
        move_left: held(Key::A),
        move_right: held(Key::D),
        move_up: held(Key::E),
        move_down: held(Key::Q),
        boost: held(Key::LShift),
        ..Default::default()
    };

    if held(Key::Left) {
        input.yaw_delta -= LOOK_SPEED * delta_time;
    }
    if held(Key::Right) {
        input.yaw_delta += LOOK_SPEED * delta_time;
    }
    if held(Key::Up) {
        input.pitch_delta -= LOOK_SPEED * delta_time;
    }
    if held(Key::Down) {
        input.pitch_delta += LOOK_SPEED * delta_time;
    }

    return input;
}

/// Loads the assets, opens the window and runs the frame loop until Escape
/// or the window closes. Asset load failures propagate and end the process.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let obj_path = format!("{}.obj", params.asset_path);
    let model: Obj<TexturedVertex, u32> = load_obj(BufReader::new(File::open(&obj_path)?))?;
    log::info!(
        "Loaded mesh {} - {} vertices, {} indices",
        obj_path,
        model.vertices.len(),
        model.indices.len()
    );

    let mesh = Mesh::from_obj(&model);
    let textures = TextureSet::load(&params.asset_path)?;
    let mut renderer = Renderer::new(params.width, params.height, vec![mesh], textures);
    let mut camera = Camera::new(
        45.0,
        vector![0.0, 5.0, -64.0],
        params.width as f32 / params.height as f32,
    );

    let window_options = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("tiny_rasterizer", window_options)?;
    let event_channel = window.event_channel()?;

    let mut pressed_keys = HashSet::new();
    let mut exit = false;
    let mut previous_frame = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        // Unloading everything that piled up in the event channel since the
        // last frame.
        for window_event in event_channel.try_iter() {
            match process_event(window_event, &mut pressed_keys, &mut renderer) {
                EventAction::Exit => exit = true,
                EventAction::Snapshot => match renderer.save_buffer_to_image() {
                    Ok(()) => log::info!("Saved color buffer to rasterizer_color_buffer.bmp"),
                    Err(error) => log::error!("Failed to save color buffer: {}", error),
                },
                EventAction::None => (),
            }
        }

        let now = time::Instant::now();
        let delta_time = now.duration_since(previous_frame).as_secs_f32();
        previous_frame = now;

        let input = camera_input(&pressed_keys, delta_time);
        camera.update(delta_time, &input);
        renderer.update(delta_time);
        renderer.render(&camera);

        let image_data = ImageView::new(
            ImageInfo::rgb8(params.width, params.height),
            renderer.as_render_data(),
        );
        window.set_image("render", image_data)?;

        if params.print_fps {
            // Counting frames to print stats every second.
            frame_counter += 1;
            if time::Instant::now()
                .duration_since(frame_counter_time_begin)
                .as_secs_f32()
                > 1.0
            {
                println!("FPS --- {}", frame_counter);
                frame_counter_time_begin = time::Instant::now();
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
