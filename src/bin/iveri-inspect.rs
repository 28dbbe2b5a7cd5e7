//! Loads a mesh asset, prints what was parsed and renders one frame of it into a
//! recording backend.
//!
//! Usage: `iveri-inspect <asset> [--root DIR] [--config FILE]`

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use anyhow::{Context as _, bail};
    use iveri_ngin::{
        context::{Context, EngineConfig, init_logging},
        data_structures::{entity::Mesh, scene_graph::Scene},
        flow::FrameLoop,
        render::{RecordingBackend, Submission},
    };

    let args: Vec<String> = std::env::args().collect();
    let mut asset = None;
    let mut root = None;
    let mut config_path = None;
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--root" => root = Some(rest.next().context("--root needs a directory")?.clone()),
            "--config" => {
                config_path = Some(rest.next().context("--config needs a file")?.clone())
            }
            other if asset.is_none() => asset = Some(other.to_string()),
            other => bail!("unexpected argument `{}`", other),
        }
    }
    let Some(asset) = asset else {
        eprintln!("Usage: {} <asset> [--root DIR] [--config FILE]", args[0]);
        std::process::exit(1);
    };

    let mut config = match config_path {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("could not read configuration `{}`", path))?,
        None => EngineConfig::default(),
    };
    if let Some(root) = root {
        config.asset_root = root;
    }
    init_logging(&config.log_level);

    let ctx = Context::new(config);
    let geometry = ctx
        .assets()
        .load_mesh(&asset)
        .await
        .with_context(|| format!("could not load `{}`", asset))?;

    println!("{}", asset);
    println!("  vertices:  {}", geometry.vertex_count());
    println!("  triangles: {}", geometry.triangle_count());
    println!(
        "  normals:   {}",
        if geometry.has_normals() { "yes" } else { "no" }
    );
    println!(
        "  texcoords: {}",
        if geometry.has_tex_coords() { "yes" } else { "no" }
    );
    for binding in &geometry.textures {
        println!(
            "  texture slot {}: `{}` {}x{}",
            binding.slot, binding.texture.name, binding.texture.width, binding.texture.height
        );
    }

    let mut scene = Scene::new();
    let camera_node = scene.create_child(scene.root())?;
    let camera = scene.add_entity(ctx.default_camera());
    scene.attach_entity(camera_node, camera)?;
    let mesh_node = scene.create_child(scene.root())?;
    let mesh = scene.add_entity(Mesh::new(geometry));
    scene.attach_entity(mesh_node, mesh)?;

    let mut frame_loop = FrameLoop::from_config(scene, &ctx.config);
    frame_loop.set_active_camera(camera)?;
    let mut backend = RecordingBackend::new();
    let stats = frame_loop.frame(&mut backend)?;

    println!(
        "frame: {} nodes, {} draws, {} skipped",
        stats.nodes, stats.draws, stats.skipped
    );
    for submission in &backend.submissions {
        match submission {
            Submission::Camera(_) => println!("  camera"),
            Submission::Light(light) => println!("  light {:?}", light.intensity),
            Submission::Mesh {
                material,
                attributes,
                index_count,
                texture_slots,
                ..
            } => println!(
                "  mesh `{}`: {:?}, {} indices, texture slots {:?}",
                material, attributes, index_count, texture_slots
            ),
        }
    }
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
