use macroquad::prelude::*;
use macroquad_preloader::{AssetsManager, ProgressEventKind};
use std::cell::Cell;
use std::rc::Rc;

fn window_conf() -> Conf {
    Conf {
        window_title: "Preload Demo".into(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

async fn load(assets: &AssetsManager) -> anyhow::Result<()> {
    assets.add_tile_map("level", "assets/maps/level.tmj")?;
    assets.add_atlas_xml("tanks", "assets/sprites/sheet.xml")?;
    assets.add_image("logo", "assets/logo.png")?;
    assets.add_audio("theme", "assets/theme.ogg")?;
    assets.preload().await?;
    Ok(())
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    let assets = AssetsManager::new();
    let loaded = Rc::new(Cell::new(0usize));
    let counter = loaded.clone();
    assets.add_event_listener(ProgressEventKind::Progress, move |e| counter.set(e.loaded));
    assets.add_event_listener(ProgressEventKind::Error, |e| {
        if let Some(err) = &e.error {
            eprintln!("skipped: {err}");
        }
    });

    if let Err(err) = load(&assets).await {
        eprintln!("preload failed: {err:#}");
    }

    let textures: Vec<(String, Texture2D)> = assets
        .get_atlas_image_map("tanks")
        .unwrap_or_default()
        .into_iter()
        .map(|(name, image)| (name, Texture2D::from_image(&image)))
        .collect();
    let logo = assets.get_image("logo").map(|img| Texture2D::from_image(&img));
    let map = assets.get_tile_map("level");

    loop {
        clear_background(BLACK);

        if let Some(logo) = &logo {
            draw_texture(logo, 20.0, 20.0, WHITE);
        }
        let mut x = 20.0;
        for (name, texture) in &textures {
            draw_texture(texture, x, 200.0, WHITE);
            draw_text(name, x, 190.0, 16.0, GRAY);
            x += texture.width() + 16.0;
        }
        if let Some(map) = &map {
            draw_text(
                &format!(
                    "level: {}x{} tiles, {} layer(s), tilesets resolved: {}",
                    map.width,
                    map.height,
                    map.layers.len(),
                    map.is_fully_resolved()
                ),
                20.0,
                screen_height() - 60.0,
                24.0,
                WHITE,
            );
        }
        draw_text(
            &format!("files loaded: {}", loaded.get()),
            20.0,
            screen_height() - 30.0,
            24.0,
            WHITE,
        );

        next_frame().await;
    }
}
