use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use itertools::Itertools;

use meridian_asset::{AssetHandle, AssetId, AssetManager, AssetManagerConfig, TextureSource};
use meridian_crate_tools::{init_log::init_log, resource::MeridianPath};
use meridian_gfx::{BufferDesc, BufferUsage, FenceMode, HeadlessDevice, SamplerDesc, TextureFormat};

/// 每个瓦片的纹理边长
const TILE_SIZE: u32 = 64;
/// 摄像机周围可见的瓦片范围：(2 * RADIUS + 1)^2
const VIEW_RADIUS: i32 = 2;
const FRAME_COUNT: u32 = 240;
/// 摄像机每隔多少帧移动一个瓦片
const FRAMES_PER_STEP: u32 = 20;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct TileKey {
    x: i32,
    y: i32,
}

impl TileKey {
    fn texture_id(self) -> AssetId {
        AssetId(((self.x as u32 as u64) << 32) | self.y as u32 as u64)
    }

    fn mesh_id(self) -> AssetId {
        AssetId(self.texture_id().0 ^ 0x8000_0000_0000_0000)
    }

    /// 模拟解码后的瓦片图像
    fn texture_source(self) -> TextureSource {
        let shade = ((self.x * 31 + self.y * 17).rem_euclid(256)) as u8;
        let pixels = (0..TILE_SIZE * TILE_SIZE).flat_map(|i| [shade, (i % 256) as u8, 128, 255]).collect_vec();
        TextureSource::new(TILE_SIZE, TILE_SIZE, TextureFormat::Rgba8Srgb, pixels).with_mips()
    }

    /// 模拟生成的地形网格：4x4 个顶点，每个顶点 3 个 f32
    fn mesh_bytes(self) -> Vec<u8> {
        (0..16)
            .flat_map(|i| {
                let position = [(self.x * 4 + i % 4) as f32, 0.0f32, (self.y * 4 + i / 4) as f32];
                position.into_iter().flat_map(f32::to_le_bytes)
            })
            .collect_vec()
    }
}

struct TileAssets {
    texture: AssetHandle,
    mesh: AssetHandle,
}

fn visible_tiles(center: TileKey) -> Vec<TileKey> {
    (-VIEW_RADIUS..=VIEW_RADIUS)
        .cartesian_product(-VIEW_RADIUS..=VIEW_RADIUS)
        .map(|(dx, dy)| TileKey {
            x: center.x + dx,
            y: center.y + dy,
        })
        .collect_vec()
}

fn load_config() -> anyhow::Result<AssetManagerConfig> {
    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| MeridianPath::config_path("stream.toml"));
    if path.exists() {
        log::info!("load config from {:?}", path);
        AssetManagerConfig::from_file(&path)
    } else {
        log::warn!("config {:?} not found, use default config", path);
        Ok(AssetManagerConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    init_log();
    #[cfg(feature = "profiling")]
    let _tracy = tracy_client::Client::start();

    let config = load_config()?;
    // 模拟 2 帧的设备延迟
    let device = Arc::new(HeadlessDevice::new(FenceMode::AfterPolls(2)));
    let mut manager = AssetManager::new(device.clone(), config)?;

    let mut resident: HashMap<TileKey, TileAssets> = HashMap::new();
    let mut camera = TileKey { x: 0, y: 0 };

    for frame in 0..FRAME_COUNT {
        let _span = tracy_client::span!("frame");
        if frame > 0 && frame % FRAMES_PER_STEP == 0 {
            camera.x += 1;
            if frame % (FRAMES_PER_STEP * 3) == 0 {
                camera.y += 1;
            }
        }

        let visible = visible_tiles(camera);
        for tile in &visible {
            resident.entry(*tile).or_insert_with(|| TileAssets {
                texture: manager.load_texture_async(tile.texture_id(), SamplerDesc::clamp_to_edge(), tile.texture_source()),
                mesh: manager.load_buffer_async(tile.mesh_id(), BufferDesc::new(BufferUsage::Vertex, 12), tile.mesh_bytes()),
            });
        }

        let out_of_view = resident.keys().filter(|tile| !visible.contains(tile)).copied().collect_vec();
        for tile in out_of_view {
            if let Some(assets) = resident.remove(&tile) {
                manager.release(assets.texture);
                manager.release(assets.mesh);
            }
        }

        manager.pump();

        if frame % FRAMES_PER_STEP == FRAMES_PER_STEP - 1 {
            let ready = resident
                .values()
                .filter(|assets| manager.is_resource_loaded(assets.texture) && manager.is_resource_loaded(assets.mesh))
                .count();
            log::info!(
                "frame {}: camera ({}, {}), {}/{} tiles ready, stats: {:?}",
                manager.current_frame(),
                camera.x,
                camera.y,
                ready,
                resident.len(),
                manager.stats()
            );
        }
    }

    manager.shutdown();
    let stats = manager.stats();
    log::info!(
        "done: {} requests, {} dispatched, {} deduplicated, {} completed, {} destroyed",
        stats.requests,
        stats.dispatched,
        stats.deduplicated,
        stats.completed,
        stats.destroyed
    );
    log::info!("device objects after shutdown: {:?}", device.live_counts());
    Ok(())
}
