use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vrlink::backend::mock::MockBackend;
use vrlink::backend::{BackendError, ControllerRole, DeviceClass, RawMatrix34};
use vrlink::input::manifest::{ActionKind, ActionManifest, ActionSetUsage};
use vrlink::scheduler::{CommandQueue, ExecutionContext};
use vrlink::{DeviceId, TrackingQuality, VrContexts, VrSession, VrSettings};

const GRIP: &str = "/actions/main/in/grip";

fn start(backend: &Arc<MockBackend>, settings: VrSettings) -> VrContexts {
    VrSession::create(backend.clone(), settings)
        .start()
        .unwrap()
        .into_contexts()
}

fn tick(contexts: &mut VrContexts) {
    contexts.draw.poll_poses();
    contexts.update.update();
    contexts.input.update_input();
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let reader = count.clone();
    (count, move || reader.load(Ordering::SeqCst))
}

#[test]
fn controller_connecting_late_is_detected_once_and_enabled_once() {
    let backend = Arc::new(MockBackend::new());
    backend.add_device(3, DeviceClass::Controller);
    backend.set_role(3, ControllerRole::LeftHand);
    backend.set_connected(3, false);
    let mut contexts = start(&backend, VrSettings::default());

    let (detected, detected_count) = counter();
    contexts.update.registry_mut().on_device_detected(move |_| {
        detected.fetch_add(1, Ordering::SeqCst);
    });

    tick(&mut contexts);
    assert_eq!(detected_count(), 1);

    let (enabled, enabled_count) = counter();
    contexts
        .update
        .registry_mut()
        .device_mut(DeviceId(3))
        .unwrap()
        .on_enabled(move |_| {
            enabled.fetch_add(1, Ordering::SeqCst);
        });

    for _ in 2..=5 {
        tick(&mut contexts);
    }
    assert_eq!(enabled_count(), 0);
    assert!(!contexts.input.is_polled(DeviceId(3)));

    backend.set_connected(3, true);
    tick(&mut contexts);
    assert_eq!(enabled_count(), 1);
    assert_eq!(detected_count(), 1);
    assert!(contexts.input.is_polled(DeviceId(3)));
    assert_eq!(
        contexts.update.registry().left_hand().map(|device| device.id()),
        Some(DeviceId(3))
    );
}

#[test]
fn reconnecting_never_rediscovers_a_device() {
    let backend = Arc::new(MockBackend::new());
    backend.add_device(1, DeviceClass::Controller);
    backend.set_role(1, ControllerRole::RightHand);
    let mut contexts = start(&backend, VrSettings::default());

    let (detected, detected_count) = counter();
    contexts.update.registry_mut().on_device_detected(move |_| {
        detected.fetch_add(1, Ordering::SeqCst);
    });

    for round in 0..6 {
        backend.set_connected(1, round % 2 == 0);
        tick(&mut contexts);
    }

    assert_eq!(detected_count(), 1);
    assert_eq!(contexts.update.registry().len(), 1);
    assert!(!contexts.update.registry().device(DeviceId(1)).unwrap().is_enabled());
}

#[test]
fn invalid_poses_keep_the_last_known_pose() {
    let backend = Arc::new(MockBackend::new());
    backend.add_device(0, DeviceClass::Hmd);
    backend.set_connected(0, true);
    backend.set_pose(0, RawMatrix34::from_translation(0.25, 1.6, 0.5));
    let mut contexts = start(&backend, VrSettings::default());

    tick(&mut contexts);
    let before = *contexts.update.registry().headset().unwrap().pose();

    backend.set_pose_valid(0, false);
    backend.set_pose(0, RawMatrix34::from_translation(9.0, 9.0, 9.0));
    for _ in 0..10 {
        tick(&mut contexts);
    }

    let after = *contexts.update.registry().headset().unwrap().pose();
    assert_eq!(
        after.position.to_array().map(f32::to_bits),
        before.position.to_array().map(f32::to_bits)
    );
    assert_eq!(
        after.rotation.to_array().map(f32::to_bits),
        before.rotation.to_array().map(f32::to_bits)
    );
}

#[test]
fn losing_focus_marks_devices_stale_without_moving_them() {
    let backend = Arc::new(MockBackend::new());
    backend.add_device(0, DeviceClass::Hmd);
    backend.set_connected(0, true);
    backend.set_tracking(0, TrackingQuality::Valid);
    backend.set_pose(0, RawMatrix34::from_translation(0.0, 1.7, 0.0));
    let settings = VrSettings {
        stale_pose_timeout_ms: Some(0),
        ..Default::default()
    };
    let mut contexts = start(&backend, settings);

    tick(&mut contexts);
    let position = contexts.update.registry().headset().unwrap().position();

    let (stale, stale_count) = counter();
    contexts
        .update
        .registry_mut()
        .device_mut(DeviceId(0))
        .unwrap()
        .on_tracking_changed(move |quality| {
            if *quality == TrackingQuality::Stale {
                stale.fetch_add(1, Ordering::SeqCst);
            }
        });

    backend.set_pose_error(Some(BackendError::NoFocus));
    for _ in 0..3 {
        tick(&mut contexts);
    }
    let headset = contexts.update.registry().headset().unwrap();
    assert_eq!(headset.tracking_quality(), TrackingQuality::Stale);
    assert_eq!(headset.position(), position);
    assert_eq!(stale_count(), 1);

    backend.set_pose_error(None);
    tick(&mut contexts);
    assert_eq!(
        contexts.update.registry().headset().unwrap().tracking_quality(),
        TrackingQuality::Valid
    );
}

#[test]
fn restricted_copy_is_isolated_from_the_default_copy() {
    let backend = Arc::new(MockBackend::new());
    backend.add_device(1, DeviceClass::Controller);
    backend.set_role(1, ControllerRole::LeftHand);
    backend.set_connected(1, true);
    let mut contexts = start(&backend, VrSettings::default());

    let manifest = ActionManifest::new()
        .with_set("main", ActionSetUsage::LeftRight)
        .with_action("main", "grip", ActionKind::Boolean);
    contexts.handle.install_manifest(&manifest).unwrap();
    tick(&mut contexts);

    let restricted = contexts.input.action_for("grip", DeviceId(1)).unwrap();
    assert!(restricted.restriction().is_some());
    assert!(!restricted.boolean().unwrap().get());

    backend.set_digital(GRIP, None, true);
    tick(&mut contexts);
    assert!(contexts.input.action("grip").unwrap().boolean().unwrap().get());
    assert!(!contexts
        .input
        .action_for("grip", DeviceId(1))
        .unwrap()
        .boolean()
        .unwrap()
        .get());

    backend.set_digital(GRIP, Some("/user/hand/left"), true);
    tick(&mut contexts);
    assert!(contexts
        .input
        .action_for("grip", DeviceId(1))
        .unwrap()
        .boolean()
        .unwrap()
        .get());
}

#[test]
fn controllers_without_a_hand_role_get_separate_copies() {
    let backend = Arc::new(MockBackend::new());
    for index in [4, 5] {
        backend.add_device(index, DeviceClass::Controller);
        backend.set_role(index, ControllerRole::Invalid);
        backend.set_connected(index, true);
    }
    let mut contexts = start(&backend, VrSettings::default());
    let manifest = ActionManifest::new()
        .with_set("main", ActionSetUsage::Single)
        .with_action("main", "grip", ActionKind::Boolean);
    contexts.handle.install_manifest(&manifest).unwrap();
    tick(&mut contexts);

    let (changed, changed_count) = counter();
    let first = contexts.input.action_for("grip", DeviceId(4)).unwrap();
    assert_eq!(first.restriction(), None);
    first.boolean_mut().unwrap().on_changed(move |_| {
        changed.fetch_add(1, Ordering::SeqCst);
    });
    let first: *const _ = first;
    let second: *const _ = contexts.input.action_for("grip", DeviceId(5)).unwrap();
    let default: *const _ = contexts.input.action("grip").unwrap();
    assert_ne!(first, default);
    assert_ne!(second, default);
    assert_ne!(first, second);

    contexts
        .input
        .action_mut("grip")
        .and_then(|action| action.boolean_mut())
        .unwrap()
        .set(true);
    assert_eq!(changed_count(), 0);
}

#[test]
fn repeated_values_fire_updated_but_not_changed() {
    let backend = Arc::new(MockBackend::new());
    let mut contexts = start(&backend, VrSettings::default());
    let manifest = ActionManifest::new()
        .with_set("main", ActionSetUsage::Single)
        .with_action("main", "grip", ActionKind::Boolean);
    contexts.handle.install_manifest(&manifest).unwrap();
    contexts.input.update_input();

    let (changed, changed_count) = counter();
    let (updated, updated_count) = counter();
    let grip = contexts
        .input
        .action_mut("grip")
        .and_then(|action| action.boolean_mut())
        .unwrap();
    grip.on_changed(move |_| {
        changed.fetch_add(1, Ordering::SeqCst);
    });
    grip.on_updated(move |_| {
        updated.fetch_add(1, Ordering::SeqCst);
    });

    backend.set_digital(GRIP, None, true);
    contexts.input.update_input();
    contexts.input.update_input();

    assert_eq!(changed_count(), 1);
    assert_eq!(updated_count(), 2);
}

#[test]
fn queued_commands_run_in_enqueue_order() {
    let mut queue = CommandQueue::<Vec<&'static str>>::new(ExecutionContext::Update);
    let sender = queue.sender();
    sender.enqueue(|log| log.push("a"));
    sender.enqueue(|log| log.push("b"));

    let mut log = Vec::new();
    assert_eq!(queue.drain(&mut log), 2);
    assert_eq!(log, vec!["a", "b"]);
}
