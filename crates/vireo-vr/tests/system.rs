use std::sync::{Arc, Mutex};

use vireo_vr::event::native;
use vireo_vr::{
    Button, ControllerState, DeviceClass, DeviceIndex, DeviceType, Eye, EventType, Hand, Matrix4,
    NativeEvent, RawPose, TrackingRuntime, VrError, VrResult, VrSystem, MAX_TRACKED_DEVICES,
};

#[derive(Default)]
struct MockState {
    classes: Vec<DeviceClass>,
    poses: Vec<Option<Matrix4>>,
    spatial_order: Vec<DeviceIndex>,
    events: Vec<NativeEvent>,
    roles: [Option<DeviceIndex>; 2],
    states: Vec<Option<ControllerState>>,
    pulses: Vec<(DeviceIndex, u32, u16)>,
    projection_requests: Vec<(f32, f32)>,
    refresh: Option<f32>,
    recommended: Option<(u32, u32)>,
    fail_start: bool,
}

impl MockState {
    fn new() -> Self {
        Self {
            classes: vec![DeviceClass::Invalid; MAX_TRACKED_DEVICES],
            poses: vec![None; MAX_TRACKED_DEVICES],
            states: vec![None; MAX_TRACKED_DEVICES],
            ..Self::default()
        }
    }

    fn place(&mut self, index: DeviceIndex, class: DeviceClass, pose: Matrix4) {
        self.classes[index] = class;
        self.poses[index] = Some(pose);
    }
}

#[derive(Clone)]
struct MockRuntime(Arc<Mutex<MockState>>);

impl MockRuntime {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(MockState::new())))
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

impl TrackingRuntime for MockRuntime {
    fn start(&mut self) -> VrResult<()> {
        if self.with(|s| s.fail_start) {
            Err(VrError::Unavailable("no headset".into()))
        } else {
            Ok(())
        }
    }

    fn stop(&mut self) {}

    fn wait_get_poses(&mut self, poses: &mut [RawPose]) {
        self.with(|s| {
            for (out, pose) in poses.iter_mut().zip(s.poses.iter()) {
                *out = match pose {
                    Some(m) => RawPose {
                        device_to_tracking: *m,
                        valid: true,
                    },
                    None => RawPose::default(),
                };
            }
        });
    }

    fn device_class(&self, index: DeviceIndex) -> DeviceClass {
        self.with(|s| s.classes.get(index).copied().unwrap_or_default())
    }

    fn sorted_device_indices(&self, class: DeviceClass) -> Vec<DeviceIndex> {
        self.with(|s| {
            s.spatial_order
                .iter()
                .copied()
                .filter(|&i| s.classes[i] == class)
                .collect()
        })
    }

    fn poll_next_event(&mut self) -> Option<NativeEvent> {
        self.with(|s| (!s.events.is_empty()).then(|| s.events.remove(0)))
    }

    fn projection(&self, _eye: Eye, near: f32, far: f32) -> Matrix4 {
        self.with(|s| s.projection_requests.push((near, far)));
        let mut m = Matrix4::IDENTITY;
        m[10] = -(far + near) / (far - near);
        m
    }

    fn head_to_eye(&self, eye: Eye) -> Matrix4 {
        let x = match eye {
            Eye::Left => -0.032,
            Eye::Right => 0.032,
        };
        Matrix4::from_translation(x, 0.0, 0.0)
    }

    fn controller_index_for_role(&self, hand: Hand) -> Option<DeviceIndex> {
        self.with(|s| s.roles[hand.index()])
    }

    fn controller_state(&self, index: DeviceIndex) -> Option<ControllerState> {
        self.with(|s| s.states[index])
    }

    fn trigger_haptic_pulse(&mut self, index: DeviceIndex, axis_id: u32, duration_us: u16) {
        self.with(|s| s.pulses.push((index, axis_id, duration_us)));
    }

    fn display_frequency(&self) -> Option<f32> {
        self.with(|s| s.refresh)
    }

    fn recommended_render_size(&self) -> Option<(u32, u32)> {
        self.with(|s| s.recommended)
    }
}

fn connected() -> (VrSystem, MockRuntime) {
    let runtime = MockRuntime::new();
    let mut vr = VrSystem::default();
    vr.connect(Box::new(runtime.clone())).unwrap();
    (vr, runtime)
}

fn drain(vr: &mut VrSystem) -> Vec<vireo_vr::Event> {
    let mut events = Vec::new();
    while let Some(event) = vr.poll_event() {
        events.push(event);
    }
    events
}

fn buttons(held: &[Button]) -> u64 {
    held.iter().fold(0, |bits, b| bits | b.mask())
}

#[test]
fn test_failed_start_stays_headless() {
    let runtime = MockRuntime::new();
    runtime.with(|s| s.fail_start = true);
    let mut vr = VrSystem::default();
    assert!(matches!(
        vr.connect(Box::new(runtime)),
        Err(VrError::Unavailable(_))
    ));
    assert!(!vr.is_valid());
    vr.update_poses();
    assert_eq!(*vr.pose_hmd(), Matrix4::IDENTITY);
}

#[test]
fn test_stale_pose_is_retained() {
    let (mut vr, runtime) = connected();
    let seen = Matrix4::from_translation(0.3, 1.0, -0.5);
    runtime.with(|s| s.place(4, DeviceClass::GenericTracker, seen));
    vr.update_poses();
    assert_eq!(vr.tracked_device(4).device_type, DeviceType::Tracker);

    runtime.with(|s| s.poses[4] = None);
    vr.update_poses();
    let device = vr.tracked_device(4);
    assert_eq!(device.device_type, DeviceType::Invalid);
    assert_eq!(device.pose, seen);

    let moved = Matrix4::from_translation(0.6, 1.0, -0.5);
    runtime.with(|s| s.poses[4] = Some(moved));
    vr.update_poses();
    let device = vr.tracked_device(4);
    assert_eq!(device.device_type, DeviceType::Tracker);
    assert_eq!(device.pose, moved);
    assert_eq!(device.pose_prev, seen);
}

#[test]
fn test_parent_before_session() {
    let mut vr = VrSystem::default();
    let parent = Matrix4::from_translation(2.0, 0.0, 0.0);
    vr.set_pose_parent(parent);
    for i in 0..MAX_TRACKED_DEVICES {
        assert_eq!(vr.tracked_device(i).pose, parent);
    }

    let runtime = MockRuntime::new();
    let raw = Matrix4::from_translation(0.0, 1.7, 0.0);
    runtime.with(|s| s.place(0, DeviceClass::Hmd, raw));
    vr.connect(Box::new(runtime)).unwrap();
    vr.update_poses();
    assert_eq!(*vr.pose_hmd(), parent * raw);
    assert_eq!(vr.tracked_device(0).pose_absolute, raw);
    assert_eq!(vr.pos_hmd().xyz(), [2.0, 1.7, 0.0]);
}

#[test]
fn test_registry_is_index_ordered() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        for i in [7, 3, 5] {
            s.place(i, DeviceClass::Controller, Matrix4::IDENTITY);
        }
        s.place(9, DeviceClass::GenericTracker, Matrix4::IDENTITY);
        s.spatial_order = vec![9, 7, 3, 5];
    });
    vr.update_poses();
    assert_eq!(vr.device_indices(DeviceType::Controller), &[3, 5, 7]);
    assert_eq!(vr.num_controllers(), 3);
    assert_eq!(vr.num_tracked_devices(DeviceType::Controller, 2), 2);
    assert_eq!(vr.num_trackers(), 1);
    assert_eq!(vr.controller_index(Hand::Left), 3);
    assert_eq!(vr.controller_index(Hand::Right), 5);

    // spatial order flips; identity order does not
    runtime.with(|s| s.spatial_order = vec![5, 3, 7, 9]);
    vr.update_poses();
    assert_eq!(vr.device_indices(DeviceType::Controller), &[3, 5, 7]);
}

#[test]
fn test_single_controller_serves_both_hands() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        s.place(6, DeviceClass::Controller, Matrix4::IDENTITY);
        s.spatial_order = vec![6];
    });
    vr.update_poses();
    assert_eq!(vr.controller_index(Hand::Left), 6);
    assert_eq!(vr.controller_index(Hand::Right), 6);
    assert!(vr.controller(Hand::Right).is_valid());
}

#[test]
fn test_hmd_view_and_eyes() {
    let (mut vr, runtime) = connected();
    let head = Matrix4::from_translation(0.0, 1.6, 0.0);
    runtime.with(|s| {
        s.place(0, DeviceClass::Hmd, head);
        s.spatial_order = vec![0];
    });
    vr.update_poses();
    assert!((*vr.view_hmd() * head).abs_diff_eq(&Matrix4::IDENTITY, 1e-6));
    assert_eq!(vr.eye(Eye::Right).xyz(), [0.032, 1.6, 0.0]);
    let expected = *vr.eye_to_head(Eye::Left) * *vr.view_hmd();
    assert!(vr.view(Eye::Left).abs_diff_eq(&expected, 1e-6));
}

#[test]
fn test_clip_planes_apply_on_next_update() {
    let (mut vr, runtime) = connected();
    vr.update_poses();
    vr.set_near(0.5).set_far(20.0);
    assert_eq!(runtime.with(|s| s.projection_requests.last().copied()), Some((0.1, 100.0)));
    vr.update_poses();
    assert_eq!(runtime.with(|s| s.projection_requests.last().copied()), Some((0.5, 20.0)));
    assert_eq!(vr.projection(Eye::Left)[10], -20.5 / 19.5);
}

#[test]
fn test_worn_flag_follows_hmd_buttons() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        s.classes[0] = DeviceClass::Hmd;
        s.events.push(NativeEvent {
            code: native::BUTTON_PRESS,
            device_index: 0,
            age: 0.0,
            button: Button::PROXIMITY_SENSOR.id() as u32,
        });
    });
    let events = drain(&mut vr);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::ButtonDown);
    assert_eq!(events[0].device_type, DeviceType::Hmd);
    assert!(vr.wearing_hmd());

    runtime.with(|s| {
        s.events.push(NativeEvent {
            code: native::BUTTON_UNPRESS,
            device_index: 0,
            age: 0.0,
            button: Button::PROXIMITY_SENSOR.id() as u32,
        })
    });
    drain(&mut vr);
    assert!(!vr.wearing_hmd());
    assert_eq!(vr.event().event_type, EventType::ButtonUp);
}

#[test]
fn test_unknown_event_passes_through() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        s.events.push(NativeEvent {
            code: 9999,
            device_index: 2,
            ..NativeEvent::default()
        })
    });
    let events = drain(&mut vr);
    assert_eq!(events[0].event_type, EventType::Other(9999));
    assert_eq!(events[0].button, None);
}

#[test]
fn test_controller_change_bits_per_drain() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        s.place(1, DeviceClass::Controller, Matrix4::IDENTITY);
        s.place(2, DeviceClass::Controller, Matrix4::IDENTITY);
        s.spatial_order = vec![2, 1];
        s.states[1] = Some(ControllerState {
            packet_num: 1,
            buttons: buttons(&[Button::GRIP, Button::MENU]),
            ..ControllerState::default()
        });
    });
    vr.update_poses();
    drain(&mut vr);
    assert!(vr.controller(Hand::Left).went_down(Button::GRIP));

    runtime.with(|s| {
        s.states[1] = Some(ControllerState {
            packet_num: 2,
            buttons: buttons(&[Button::MENU, Button::TRIGGER]),
            ..ControllerState::default()
        })
    });
    drain(&mut vr);
    let left = vr.controller(Hand::Left);
    assert_eq!(
        left.button_changes(),
        Button::GRIP.mask() | Button::TRIGGER.mask()
    );
    assert!(left.went_up(Button::GRIP));
    assert!(left.went_down(Button::TRIGGER));
    assert!(left.pressed(Button::MENU) && !left.button_changed(Button::MENU));

    // same packet: changes cleared, state kept
    drain(&mut vr);
    let left = vr.controller(Hand::Left);
    assert_eq!(left.button_changes(), 0);
    assert!(left.pressed(Button::TRIGGER));
}

#[test]
fn test_double_click_through_system() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        s.place(1, DeviceClass::Controller, Matrix4::IDENTITY);
        s.spatial_order = vec![1];
    });
    vr.update_poses();

    let frames: [&[Button]; 4] = [&[Button::A], &[], &[Button::A], &[]];
    for (n, held) in frames.iter().enumerate() {
        runtime.with(|s| {
            s.states[1] = Some(ControllerState {
                packet_num: n as u32 + 1,
                buttons: buttons(held),
                ..ControllerState::default()
            })
        });
        drain(&mut vr);
        vr.tick(0.05);
    }

    let mut clicks = 0;
    for _ in 0..10 {
        drain(&mut vr);
        vr.tick(0.05);
        clicks = vr.controller(Hand::Left).clicks(Button::A);
        if clicks > 0 {
            break;
        }
    }
    assert_eq!(clicks, 2);
}

#[test]
fn test_roles_and_haptics() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        s.place(3, DeviceClass::Controller, Matrix4::IDENTITY);
        s.place(4, DeviceClass::Controller, Matrix4::IDENTITY);
        s.spatial_order = vec![3, 4];
        s.roles = [Some(4), Some(3)];
    });
    vr.update_poses();
    drain(&mut vr);
    assert_eq!(vr.controller_for_role(Hand::Left).hand(), Hand::Left);
    assert!(std::ptr::eq(
        vr.controller_for_role(Hand::Left),
        vr.controller_at(4)
    ));

    vr.haptic_pulse(Hand::Right, Button::TRIGGER, 1500);
    vr.haptic_pulse(Hand::Right, Button::GRIP, 1500);
    assert_eq!(runtime.with(|s| s.pulses.clone()), vec![(4, 1, 1500)]);
}

#[test]
fn test_display_properties() {
    let runtime = MockRuntime::new();
    runtime.with(|s| {
        s.refresh = Some(120.0);
        s.recommended = Some((1852, 2056));
    });
    let mut vr = VrSystem::default();
    vr.connect(Box::new(runtime)).unwrap();
    assert_eq!(vr.frame_rate(), 120.0);
    assert_eq!(vr.render_size(), (1852, 2056));
    vr.set_render_size(0, 0, 0.5);
    assert_eq!(vr.render_size(), (926, 1028));
}

#[test]
fn test_touchpad_sector() {
    let (mut vr, runtime) = connected();
    runtime.with(|s| {
        s.place(1, DeviceClass::Controller, Matrix4::IDENTITY);
        s.spatial_order = vec![1];
        let mut state = ControllerState {
            packet_num: 1,
            ..ControllerState::default()
        };
        state.axes[0] = [1.0, 0.0];
        s.states[1] = Some(state);
    });
    vr.update_poses();
    assert_eq!(vr.axis_sector(Hand::Left, Button::TOUCHPAD), -1);
    drain(&mut vr);
    assert_eq!(vr.axis_sector(Hand::Left, Button::TOUCHPAD), 0);
}
