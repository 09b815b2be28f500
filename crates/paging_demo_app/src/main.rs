//! Headless paging demo.
//!
//! Flies a viewer across a grid of paged tiles and runs the full pipeline
//! every frame: distance-based load requests on rayon workers, GPU uploads
//! serviced on a dedicated thread through the queued compiler, and splices
//! during the update pass. No window, no GPU; the upload thread just burns a
//! little time per payload.
//!
//! Run with `RUST_LOG=info` (or `debug` for per-upload output).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use glam::Vec3;
use scene_paging::{
    BackgroundLoader, LoadResult, PagedRegion, PagingCoordinator, ResourceCompiler, SceneNode,
    Traversal, TraversalKind, UploadOutcome, queued_compiler,
};

const GRID_SIZE: i32 = 8;
const TILE_SPACING: f32 = 32.0;
const VIEW_RANGE: f32 = 96.0;
const UNLOAD_RANGE: f32 = 160.0;
const FRAMES: u32 = 240;
const UPLOADS_PER_TICK: usize = 4;

/// Per-cull count of tile meshes that would be drawn this frame.
struct DrawnTiles(Arc<AtomicUsize>);

/// Synthetic tile content: a small vertex patch around the tile center.
struct TileMesh {
    cell: (i32, i32),
    vertices: Vec<Vec3>,
}

impl TileMesh {
    fn generate(cell: (i32, i32), center: Vec3) -> Self {
        // 9-vertex patch, deterministic per cell
        let mut vertices = Vec::with_capacity(9);
        for dx in -1..=1 {
            for dz in -1..=1 {
                let offset = Vec3::new(dx as f32, 0.0, dz as f32) * (TILE_SPACING * 0.5);
                let height = ((cell.0 * 31 + cell.1 * 17) % 7) as f32;
                vertices.push(center + offset + Vec3::Y * height);
            }
        }
        Self { cell, vertices }
    }
}

impl SceneNode for TileMesh {
    fn traverse(&self, traversal: &mut Traversal) {
        if traversal.kind == TraversalKind::Cull {
            if let Some(drawn) = traversal.context.get::<DrawnTiles>() {
                drawn.0.fetch_add(1, Ordering::Relaxed);
                log::trace!("tile {:?}: {} vertices", self.cell, self.vertices.len());
            }
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let coordinator = Arc::new(PagingCoordinator::new());
    let loader = BackgroundLoader::new();
    let (queued, upload_queue) = queued_compiler();
    let compiler: Arc<dyn ResourceCompiler> = Arc::new(queued);

    // Tile grid centered on the origin
    let mut tiles: Vec<(Vec3, Arc<PagedRegion>)> = Vec::new();
    for x in 0..GRID_SIZE {
        for z in 0..GRID_SIZE {
            let cell = (x, z);
            let center = Vec3::new(
                (x - GRID_SIZE / 2) as f32 * TILE_SPACING,
                0.0,
                (z - GRID_SIZE / 2) as f32 * TILE_SPACING,
            );
            let region = PagedRegion::new(coordinator.handle(), move || {
                // Pretend tile production costs something
                thread::sleep(Duration::from_millis(1 + (cell.0 as u64 % 3)));
                LoadResult::new(Arc::new(TileMesh::generate(cell, center)) as Arc<dyn SceneNode>)
            });
            coordinator.add_child(Arc::clone(&region) as Arc<dyn SceneNode>);
            tiles.push((center, region));
        }
    }

    // Fake GPU-context thread servicing uploads until shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let uploads_done = Arc::new(AtomicUsize::new(0));
    let gpu_thread = {
        let shutdown = Arc::clone(&shutdown);
        let uploads_done = Arc::clone(&uploads_done);
        thread::Builder::new()
            .name("gpu-upload".into())
            .spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    let serviced = upload_queue.service(UPLOADS_PER_TICK, |_payload| {
                        // Stand-in for a buffer copy
                        thread::sleep(Duration::from_micros(200));
                        uploads_done.fetch_add(1, Ordering::Relaxed);
                        UploadOutcome::Uploaded
                    });
                    if serviced == 0 {
                        thread::sleep(Duration::from_millis(1));
                    } else {
                        log::debug!("serviced {} uploads", serviced);
                    }
                }
            })
            .expect("spawn gpu-upload thread")
    };

    let drawn = Arc::new(AtomicUsize::new(0));
    let flight_start = Vec3::new(-160.0, 24.0, -160.0);
    let flight_end = Vec3::new(160.0, 24.0, 160.0);

    log::info!(
        "paging {} tiles, view range {}, {} frames",
        tiles.len(),
        VIEW_RANGE,
        FRAMES
    );

    for frame in 0..FRAMES {
        let t = frame as f32 / (FRAMES - 1) as f32;
        let viewer = flight_start.lerp(flight_end, t);

        // Request tiles entering range, drop tiles far behind
        for (center, region) in &tiles {
            let distance = viewer.distance(*center);
            if distance <= VIEW_RANGE {
                region.request_load(&loader);
            } else if distance > UNLOAD_RANGE && region.is_merged() {
                region.unload();
            }
        }

        // Cull: expose the compiler and count what would be drawn
        drawn.store(0, Ordering::Relaxed);
        let mut cull = Traversal::cull()
            .with(Arc::clone(&compiler))
            .with(DrawnTiles(Arc::clone(&drawn)));
        coordinator.traverse(&mut cull);

        // Update: splice whatever became ready
        coordinator.traverse(&mut Traversal::update());

        if frame % 30 == 0 {
            let stats = coordinator.stats();
            log::info!(
                "frame {:3}: drawn {:2}, merged {}, queued compile/merge {}/{}, loads in flight {}, uploads {}",
                frame,
                drawn.load(Ordering::Relaxed),
                stats.merged,
                stats.pending_compile,
                stats.pending_merge,
                loader.in_flight(),
                uploads_done.load(Ordering::Relaxed)
            );
        }

        thread::sleep(Duration::from_millis(2));
    }

    // Let outstanding loads and uploads settle, then drain what remains.
    // Check in-flight loads first: once that hits zero every admission is
    // already visible to the idle check.
    for _ in 0..1000 {
        coordinator.traverse(&mut Traversal::update());
        if loader.in_flight() == 0 && coordinator.is_idle() {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }

    shutdown.store(true, Ordering::SeqCst);
    gpu_thread.join().expect("join gpu-upload thread");

    let stats = coordinator.stats();
    let merged_tiles = tiles.iter().filter(|(_, region)| region.is_merged()).count();
    log::info!(
        "done: {} tiles merged, {} admitted, {} promoted, {} uploads, {} discarded, last drain {}us",
        merged_tiles,
        stats.admitted,
        stats.promoted,
        uploads_done.load(Ordering::Relaxed),
        stats.discarded,
        stats.last_update_us
    );

    // Every tile still in view at the end of the flight must have made it in
    for (center, region) in &tiles {
        if flight_end.distance(*center) <= VIEW_RANGE {
            assert!(region.is_merged(), "tile at {center} never merged");
        }
    }
    assert!(coordinator.is_idle());
}
