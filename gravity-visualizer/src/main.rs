use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, LevelFilter};
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use palette::{FromColor, Hsv, Srgb};
use rayon::prelude::*;
use gravity_common::{SimulationConfig, Snapshot, TrailImage};
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file path (.mp4)
    #[arg(short, long, default_value = "gravity_video.mp4")]
    output: PathBuf,

    /// Width of the output video in pixels
    #[arg(long, default_value_t = 900)]
    width: u32,

    /// Height of the output video in pixels (calculated from aspect ratio if not provided)
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Optional path to the config.toml file to get exact world dimensions
    #[arg(long)]
    config: Option<PathBuf>,

    /// World width (used if config is not provided)
    #[arg(long, default_value_t = 900.0)]
    world_width: f64,

    /// World height (used if config is not provided)
    #[arg(long, default_value_t = 600.0)]
    world_height: f64,

    /// Where the centre of the trail image is drawn, in world coordinates
    #[arg(long, default_value_t = 150.0)]
    trail_anchor_x: f64,

    #[arg(long, default_value_t = 300.0)]
    trail_anchor_y: f64,

    /// Also write every frame as a PNG into this directory
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Body color name (black, white, red, green, blue, yellow, cyan, magenta)
    #[arg(long, default_value = "white")]
    color: String,

    /// Background color - name of the color for the background
    #[arg(long, default_value = "black")]
    bg_color: String,

    /// Frames converted to YUV in parallel per batch
    #[arg(long, default_value_t = 30)]
    batch_size: usize,
}

// Color definitions for named colors (RGBA format)
const COLOR_MAP: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 255, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
];

/// Parse a color name to RGBA values
fn parse_color(color_name: &str) -> [u8; 4] {
    for &(name, color) in COLOR_MAP {
        if name.eq_ignore_ascii_case(color_name) {
            return color;
        }
    }
    // Default to black if color not found
    warn!("Color '{}' not recognized, using black.", color_name);
    [0, 0, 0, 255]
}

/// Warm tint for the suns, so they stand out from the swarm.
fn sun_color() -> [u8; 4] {
    let hsv: Hsv = Hsv::new(45.0, 0.85, 1.0);
    let rgb: Srgb = Srgb::from_color(hsv);
    [
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
        255,
    ]
}

/// Everything needed to map world coordinates onto the canvas.
#[derive(Debug, Clone, Copy)]
struct Layout {
    width: u32,
    height: u32,
    pixels_per_unit: f64,
    world_center: (f64, f64),
    trail_anchor: (f64, f64),
    bg_color: [u8; 4],
    body_color: [u8; 4],
    sun_color: [u8; 4],
}

impl Layout {
    /// World point to pixel, zooming about the world centre.
    fn project(&self, x: f64, y: f64, zoom: f64) -> (i32, i32) {
        let (cx, cy) = self.world_center;
        let sx = cx + zoom * (x - cx);
        let sy = cy + zoom * (y - cy);
        (
            (sx * self.pixels_per_unit).round() as i32,
            (sy * self.pixels_per_unit).round() as i32,
        )
    }
}

/// Copies the trail image onto the canvas, one pixel per cell, centred on the anchor.
fn blit_trail(canvas: &mut RgbaImage, trail: &TrailImage, layout: &Layout) {
    let ax = (layout.trail_anchor.0 * layout.pixels_per_unit).round() as i64;
    let ay = (layout.trail_anchor.1 * layout.pixels_per_unit).round() as i64;
    let left = ax - trail.width as i64 / 2;
    let top = ay - trail.height as i64 / 2;
    for ty in 0..trail.height {
        for tx in 0..trail.width {
            let px = left + tx as i64;
            let py = top + ty as i64;
            if px < 0 || py < 0 || px >= canvas.width() as i64 || py >= canvas.height() as i64 {
                continue;
            }
            let [r, g, b] = trail.pixel(tx, ty);
            canvas.put_pixel(px as u32, py as u32, Rgba([r, g, b, 255]));
        }
    }
}

/// Draws one snapshot onto `canvas`.
///
/// The canvas is cleared first unless the snapshot was taken with orbit traces shown.
fn draw_frame(canvas: &mut RgbaImage, snapshot: &Snapshot, layout: &Layout) {
    if !snapshot.show_trails {
        for pixel in canvas.pixels_mut() {
            *pixel = Rgba(layout.bg_color);
        }
    }

    if let Some(trail) = &snapshot.trail {
        blit_trail(canvas, trail, layout);
    }

    if let Some(bodies) = &snapshot.bodies {
        for body in bodies.iter().filter(|b| !b.merged) {
            let (px, py) = layout.project(body.x, body.y, snapshot.zoom);
            if px < 0 || py < 0 || px >= layout.width as i32 || py >= layout.height as i32 {
                continue;
            }
            let radius = (body.radius * snapshot.zoom * layout.pixels_per_unit) as i32;
            let color = if body.is_sun { layout.sun_color } else { layout.body_color };
            draw_filled_circle_mut(canvas, (px, py), radius, Rgba(color));
        }
    }
}

/// RGB to YUV conversion for video encoding
fn rgb_to_yuv420(image: &RgbaImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    // OpenH264 expects YUV 4:2:0 format
    // Y plane is full size, U and V are quarter size
    let mut yuv = vec![0u8; width * height + (width * height) / 2];
    let y_plane_size = width * height;

    for y in 0..height {
        for x in 0..width {
            let pixel = image.get_pixel(x as u32, y as u32);
            let r = pixel[0] as f32;
            let g = pixel[1] as f32;
            let b = pixel[2] as f32;

            // RGB to Y conversion (BT.601 formula)
            yuv[y * width + x] = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
        }
    }

    let u_plane_offset = y_plane_size;
    let v_plane_offset = y_plane_size + y_plane_size / 4;

    // For each 2x2 block of pixels, compute average U and V values
    for y in (0..height).step_by(2) {
        for x in (0..width).step_by(2) {
            let mut sum_u = 0f32;
            let mut sum_v = 0f32;
            let mut count = 0;

            for dy in 0..2 {
                for dx in 0..2 {
                    if y + dy < height && x + dx < width {
                        let pixel = image.get_pixel((x + dx) as u32, (y + dy) as u32);
                        let r = pixel[0] as f32;
                        let g = pixel[1] as f32;
                        let b = pixel[2] as f32;

                        // RGB to UV conversion (BT.601 formula)
                        sum_u += -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
                        sum_v += 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
                        count += 1;
                    }
                }
            }

            let uv_width = width / 2;
            let uv_index = (y / 2) * uv_width + x / 2;
            yuv[u_plane_offset + uv_index] = (sum_u / count as f32).round() as u8;
            yuv[v_plane_offset + uv_index] = (sum_v / count as f32).round() as u8;
        }
    }

    yuv
}

fn progress_bar(len: u64, template: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Gravity Visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output video: {}", args.output.display());

    // --- Determine Simulation World Dimensions ---
    let (world_width, world_height) = match &args.config {
        Some(config_path) => match SimulationConfig::load(config_path) {
            Ok(config) => {
                info!("Loaded world dimensions from {}", config_path.display());
                (config.world.width, config.world.height)
            }
            Err(e) => {
                warn!(
                    "Failed to load config file '{}': {}. Using provided dimensions.",
                    config_path.display(),
                    e
                );
                (args.world_width, args.world_height)
            }
        },
        None => (args.world_width, args.world_height),
    };
    info!("Simulation world size: {:.1} x {:.1}", world_width, world_height);

    // --- Calculate Output Dimensions and Scale ---
    // The encoder needs even dimensions.
    let output_width_px = args.width & !1;
    let output_height_px = args
        .height
        .unwrap_or_else(|| (output_width_px as f64 * world_height / world_width) as u32)
        & !1;
    if output_width_px == 0 || output_height_px == 0 {
        anyhow::bail!("Output dimensions must be at least 2x2 pixels.");
    }
    let pixels_per_unit =
        (output_width_px as f64 / world_width).min(output_height_px as f64 / world_height);
    info!("Output video dimensions: {}x{} px", output_width_px, output_height_px);
    info!("Scale: {:.4} pixels per unit", pixels_per_unit);

    let layout = Layout {
        width: output_width_px,
        height: output_height_px,
        pixels_per_unit,
        world_center: (world_width / 2.0, world_height / 2.0),
        trail_anchor: (args.trail_anchor_x, args.trail_anchor_y),
        bg_color: parse_color(&args.bg_color),
        body_color: parse_color(&args.color),
        sun_color: sun_color(),
    };

    // --- Open and Parse Snapshot File ---
    let input_file = File::open(&args.input)
        .with_context(|| format!("Failed to open input file: {}", args.input.display()))?;
    let snapshots: Vec<Snapshot> = bincode::deserialize_from(BufReader::new(input_file))
        .context("Failed to read snapshots")?;
    info!("Found {} snapshots in the file", snapshots.len());

    if snapshots.is_empty() {
        warn!("Input file contains no snapshots. Exiting.");
        return Ok(());
    }
    if snapshots.iter().all(|s| s.bodies.is_none()) {
        warn!("No snapshots contain body data! The video will only show trails.");
    }
    if let Some(last) = snapshots.last() {
        info!(
            "Last snapshot: tick {}, t = {:.2}, {} active, {} merged",
            last.tick, last.time, last.active_count, last.merged_count
        );
    }

    if let Some(dir) = &args.frames_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create frames directory {}", dir.display()))?;
    }

    // --- Initialize video encoder ---
    info!("Setting up video encoder...");
    let mut encoder = Encoder::with_api_config(
        openh264::OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(args.fps as f32))
            .bitrate(BitRate::from_bps(5_000_000)), // 5 Mbps
    )
    .context("Failed to initialize H.264 encoder")?;

    let mut h264_data = Vec::new();
    let mut frame_count = 0usize;
    let start_time = Instant::now();
    let encode_progress = progress_bar(
        snapshots.len() as u64,
        "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} encoded ({percent}%) [{eta}]",
    );

    // Frames depend on their predecessor when traces are shown, so drawing is
    // sequential; colour conversion and PNG export run in parallel per batch.
    let mut canvas = RgbaImage::from_pixel(output_width_px, output_height_px, Rgba(layout.bg_color));
    let batch_size = args.batch_size.max(1);
    for (batch_idx, batch) in snapshots.chunks(batch_size).enumerate() {
        let frames: Vec<RgbaImage> = batch
            .iter()
            .map(|snapshot| {
                draw_frame(&mut canvas, snapshot, &layout);
                canvas.clone()
            })
            .collect();

        if let Some(dir) = &args.frames_dir {
            frames.par_iter().enumerate().for_each(|(i, frame)| {
                let path = dir.join(format!("frame_{:05}.png", batch_idx * batch_size + i));
                if let Err(e) = frame.save(&path) {
                    error!("Error writing frame {}: {}", path.display(), e);
                }
            });
        }

        let yuv_frames: Vec<Vec<u8>> = frames.par_iter().map(rgb_to_yuv420).collect();
        for (i, yuv_data) in yuv_frames.into_iter().enumerate() {
            let yuv_source = YUVBuffer::from_vec(yuv_data, output_width_px as usize, output_height_px as usize);
            match encoder.encode(&yuv_source) {
                Ok(bitstream) => {
                    bitstream.write_vec(&mut h264_data);
                    frame_count += 1;
                }
                Err(e) => error!("Error encoding frame {}: {}", batch_idx * batch_size + i, e),
            }
            encode_progress.inc(1);
        }
    }
    encode_progress.finish_with_message(format!("Encoded {} frames successfully", frame_count));

    // Create MP4 file using minimp4
    info!("Creating MP4 file...");
    let mut video_buffer = Cursor::new(Vec::new());
    let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
    let video_description = format!("Gravity simulation - {} snapshots", snapshots.len());
    mp4muxer.init_video(output_width_px as i32, output_height_px as i32, false, &video_description);
    mp4muxer.write_video(&h264_data);
    mp4muxer.close();

    video_buffer.seek(SeekFrom::Start(0))?;
    let mut video_bytes = Vec::new();
    video_buffer.read_to_end(&mut video_bytes)?;

    fs::write(&args.output, &video_bytes)
        .with_context(|| format!("Failed to write video file to {}", args.output.display()))?;

    let duration = start_time.elapsed();
    info!(
        "Video generation completed in {:.2?} ({:.1} frames per second)",
        duration,
        frame_count as f64 / duration.as_secs_f64()
    );
    info!("Output saved to: {}", args.output.display());

    Ok(())
}
