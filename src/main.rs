use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vrlink::backend::mock::MockBackend;
use vrlink::input::manifest::{ActionKind, ActionManifest, ActionSetUsage};
use vrlink::runner::VrRunner;
use vrlink::session::{VrContexts, VrSession};
use vrlink::VrSettings;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = VrSettings::load()
        .await
        .map_err(|e| eyre!("Failed to load settings: {}", e))?;
    info!("Using tracking origin {:?}", settings.tracking_origin);

    // No native runtime binding ships with this binary, so it drives the mock scene
    let backend = Arc::new(MockBackend::demo());
    let mut contexts = VrSession::create(backend, settings.clone())
        .start()
        .map_err(|e| eyre!("Failed to start VR session: {}", e))?
        .into_contexts();

    attach_logging_observers(&mut contexts);

    let manifest = settings.manifest.clone().unwrap_or_else(demo_manifest);
    contexts
        .handle
        .install_manifest(&manifest)
        .map_err(|e| eyre!("Failed to install action manifest: {}", e))?;

    let token = CancellationToken::new();
    let runner = VrRunner::spawn(contexts, &settings, token.clone());

    info!("Running, press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
    runner.cancel();

    let report = runner
        .join()
        .await
        .map_err(|e| eyre!("Context loops failed: {}", e))?;
    info!(
        "Stopped with {} devices known after {} frames",
        report.update.registry().len(),
        report.draw.frames()
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn demo_manifest() -> ActionManifest {
    ActionManifest::new()
        .with_set("main", ActionSetUsage::LeftRight)
        .with_action("main", "grip", ActionKind::Boolean)
        .with_action("main", "trigger", ActionKind::Scalar)
        .with_action("main", "thumbstick", ActionKind::Vector2)
        .with_action("main", "aim", ActionKind::Pose)
        .with_action("main", "haptics", ActionKind::Vibration)
}

fn attach_logging_observers(contexts: &mut VrContexts) {
    let registry = contexts.update.registry_mut();
    registry.on_device_detected(|device| {
        info!("Device {} ({:?}) detected", device.id(), device.kind());
    });

    contexts.update.on_user_distracted(|_| info!("User took off the headset"));
    contexts.update.on_user_focused(|_| info!("User is back"));

    contexts.input.on_actions_loaded(|table| {
        info!("{} actions ready", table.len());
        if let Some(grip) = table.action_mut("grip").and_then(|action| action.boolean_mut()) {
            grip.on_changed(|&(_, pressed)| info!("Grip {}", if pressed { "pressed" } else { "released" }));
        }
    });
}
