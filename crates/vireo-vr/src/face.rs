//! Background eye and lip sensor polling.
//!
//! A [`FaceTracker`] owns a [`FaceSensor`] and polls it on its own thread at
//! a fixed period. Each successful read publishes a fresh snapshot and fires
//! the registered callbacks. Stopping joins the thread, so no callback runs
//! after [`FaceTracker::stop`] returns.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{VrError, VrResult};

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(5);

/// Raw eye reading in the sensor's own frame (+x left, +y up, +z forward).
///
/// `None` marks a field the sensor could not measure this read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeSample {
    pub gaze_origin_mm: Option<[f32; 3]>,
    pub gaze_direction: Option<[f32; 3]>,
    pub openness: Option<[f32; 2]>,
    pub convergence_mm: Option<f32>,
    pub pupil_position: Option<[f32; 2]>,
    pub pupil_diameter_mm: Option<f32>,
}

/// Last known eye state in tracking space (+x right, +y up, -z forward).
///
/// Fields not measured by the latest read keep their previous value and
/// have their validity flag cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeData {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub gaze_pos: [f32; 3],
    pub gaze_dir: [f32; 3],
    pub openness: [f32; 2],
    pub convergence: f32,
    pub pupil_pos: [f32; 2],
    pub pupil_diam: f32,
    pub gaze_pos_valid: bool,
    pub gaze_dir_valid: bool,
    pub openness_valid: bool,
    pub convergence_valid: bool,
    pub pupil_pos_valid: bool,
    pub pupil_diam_valid: bool,
}

impl Default for EyeData {
    fn default() -> Self {
        Self {
            sequence: 0,
            timestamp_us: 0,
            gaze_pos: [0.0, 0.0, 0.0],
            gaze_dir: [0.0, 0.0, -1.0],
            openness: [1.0, 1.0],
            convergence: 0.0,
            pupil_pos: [0.0, 0.0],
            pupil_diam: 0.0,
            gaze_pos_valid: false,
            gaze_dir_valid: false,
            openness_valid: false,
            convergence_valid: false,
            pupil_pos_valid: false,
            pupil_diam_valid: false,
        }
    }
}

impl EyeData {
    pub fn any_data_valid(&self) -> bool {
        self.gaze_pos_valid
            || self.gaze_dir_valid
            || self.openness_valid
            || self.convergence_valid
            || self.pupil_pos_valid
            || self.pupil_diam_valid
    }

    /// Fold a sensor read into the previous snapshot.
    pub fn merged(&self, sample: &EyeSample, timestamp_us: u64) -> EyeData {
        let mut next = self.clone();
        next.sequence = self.sequence + 1;
        next.timestamp_us = timestamp_us;

        next.gaze_pos_valid = keep_or_replace(
            &mut next.gaze_pos,
            sample.gaze_origin_mm.map(to_tracking_frame),
        );
        next.gaze_dir_valid = keep_or_replace(
            &mut next.gaze_dir,
            sample.gaze_direction.map(to_tracking_frame),
        );
        next.openness_valid = keep_or_replace(&mut next.openness, sample.openness);
        next.convergence_valid = keep_or_replace(&mut next.convergence, sample.convergence_mm);
        next.pupil_pos_valid = keep_or_replace(&mut next.pupil_pos, sample.pupil_position);
        next.pupil_diam_valid = keep_or_replace(&mut next.pupil_diam, sample.pupil_diameter_mm);
        next
    }
}

fn keep_or_replace<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

/// Sensor frame to tracking frame: mirror x and z.
fn to_tracking_frame(v: [f32; 3]) -> [f32; 3] {
    [-v[0], v[1], -v[2]]
}

/// Lip blend-shape weights for one sensor frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LipData {
    pub frame_sequence: u32,
    pub timestamp_ms: u32,
    pub blend_weights: Vec<f32>,
}

/// A face-tracking device.
pub trait FaceSensor: Send + 'static {
    /// Bring up the requested engines. Called once, before polling begins.
    fn init(&mut self, eye: bool, lip: bool) -> VrResult<()>;

    /// `Ok(None)` when the sensor has nothing new.
    fn read_eye(&mut self) -> VrResult<Option<EyeSample>>;

    fn read_lip(&mut self) -> VrResult<Option<LipData>> {
        Ok(None)
    }

    /// Shut the engines down. Called after polling has stopped.
    fn release(&mut self) {}
}

pub trait FaceTrackerCallbacks: Send + Sync {
    fn on_eye_data(&self, data: &EyeData);
    fn on_lip_data(&self, _data: &LipData) {}
}

struct SharedState {
    eye: Mutex<Arc<EyeData>>,
    lip: Mutex<Arc<LipData>>,
    callbacks: Option<Arc<dyn FaceTrackerCallbacks>>,
    stop: AtomicBool,
    reads: AtomicU64,
}

impl SharedState {
    fn publish_eye(&self, data: Arc<EyeData>) {
        let mut guard = match self.eye.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
    }

    fn publish_lip(&self, data: Arc<LipData>) {
        let mut guard = match self.lip.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
    }

    fn latest_eye(&self) -> Arc<EyeData> {
        match self.eye.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn latest_lip(&self) -> Arc<LipData> {
        match self.lip.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

pub struct FaceTracker<S: FaceSensor> {
    sensor: Option<S>,
    state: Arc<SharedState>,
    worker: Option<JoinHandle<S>>,
    period: Duration,
    eye_tracking: bool,
    lip_tracking: bool,
    initialized: bool,
}

impl<S: FaceSensor> FaceTracker<S> {
    pub fn new(sensor: S) -> Self {
        Self::with_callbacks(sensor, None)
    }

    pub fn with_callbacks(sensor: S, callbacks: Option<Arc<dyn FaceTrackerCallbacks>>) -> Self {
        Self {
            sensor: Some(sensor),
            state: Arc::new(SharedState {
                eye: Mutex::new(Arc::new(EyeData::default())),
                lip: Mutex::new(Arc::new(LipData::default())),
                callbacks,
                stop: AtomicBool::new(false),
                reads: AtomicU64::new(0),
            }),
            worker: None,
            period: DEFAULT_PERIOD,
            eye_tracking: true,
            lip_tracking: false,
            initialized: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Polling period. Takes effect on the next start.
    pub fn set_period(&mut self, period: Duration) -> &mut Self {
        self.period = period;
        self
    }

    pub fn eye_tracking(&self) -> bool {
        self.eye_tracking
    }

    /// Ignored once the sensor has been initialized.
    pub fn set_eye_tracking(&mut self, enable: bool) -> &mut Self {
        if !self.initialized {
            self.eye_tracking = enable;
        }
        self
    }

    pub fn lip_tracking(&self) -> bool {
        self.lip_tracking
    }

    /// Ignored once the sensor has been initialized.
    pub fn set_lip_tracking(&mut self, enable: bool) -> &mut Self {
        if !self.initialized {
            self.lip_tracking = enable;
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Latest eye snapshot. Cheap to call from the frame loop.
    pub fn eye_data(&self) -> Arc<EyeData> {
        self.state.latest_eye()
    }

    pub fn lip_data(&self) -> Arc<LipData> {
        self.state.latest_lip()
    }

    /// Number of successful sensor reads since creation.
    pub fn reads(&self) -> u64 {
        self.state.reads.load(Ordering::Relaxed)
    }

    /// Initialize the sensor if needed and start the polling thread.
    pub fn start(&mut self) -> VrResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        if !self.eye_tracking && !self.lip_tracking {
            return Err(VrError::Unavailable(
                "neither eye nor lip tracking is enabled".to_string(),
            ));
        }
        let mut sensor = self
            .sensor
            .take()
            .ok_or_else(|| VrError::Sensor("sensor lost by a previous worker".to_string()))?;

        if !self.initialized {
            if let Err(err) = sensor.init(self.eye_tracking, self.lip_tracking) {
                self.sensor = Some(sensor);
                return Err(err);
            }
            self.initialized = true;
        }

        self.state.stop.store(false, Ordering::Relaxed);
        let state = self.state.clone();
        let period = self.period;
        let (eye, lip) = (self.eye_tracking, self.lip_tracking);
        let worker = thread::Builder::new()
            .name("vireo-face-tracker".to_string())
            .spawn(move || {
                poll(&mut sensor, &state, period, eye, lip);
                sensor
            })
            .map_err(|e| VrError::Sensor(format!("thread spawn: {e}")))?;

        info!(
            "face tracker started (eye: {eye}, lip: {lip}, period: {:?})",
            period
        );
        self.worker = Some(worker);
        Ok(())
    }

    /// Stop polling and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.state.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(sensor) => self.sensor = Some(sensor),
                Err(_) => warn!("face tracker thread panicked; sensor dropped"),
            }
            debug!("face tracker stopped");
        }
    }
}

impl<S: FaceSensor> Drop for FaceTracker<S> {
    fn drop(&mut self) {
        self.stop();
        if let Some(sensor) = self.sensor.as_mut() {
            if self.initialized {
                sensor.release();
            }
        }
    }
}

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

fn poll<S: FaceSensor>(
    sensor: &mut S,
    state: &SharedState,
    period: Duration,
    eye: bool,
    lip: bool,
) {
    let mut reported_error = false;
    let mut last_eye = state.latest_eye();

    while !state.stop.load(Ordering::Relaxed) {
        if eye {
            match sensor.read_eye() {
                Ok(Some(sample)) => {
                    let next = Arc::new(last_eye.merged(&sample, now_us()));
                    state.publish_eye(next.clone());
                    state.reads.fetch_add(1, Ordering::Relaxed);
                    if let Some(cb) = state.callbacks.as_ref() {
                        cb.on_eye_data(&next);
                    }
                    last_eye = next;
                }
                Ok(None) => {}
                Err(err) => {
                    if !reported_error {
                        warn!("eye sensor read failed: {err}");
                        reported_error = true;
                    }
                }
            }
        }
        if lip {
            match sensor.read_lip() {
                Ok(Some(data)) => {
                    let data = Arc::new(data);
                    state.publish_lip(data.clone());
                    if let Some(cb) = state.callbacks.as_ref() {
                        cb.on_lip_data(&data);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    if !reported_error {
                        warn!("lip sensor read failed: {err}");
                        reported_error = true;
                    }
                }
            }
        }
        thread::sleep(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct ScriptedSensor {
        gaze_dir: [f32; 3],
        fail_init: bool,
        released: Arc<AtomicBool>,
    }

    impl ScriptedSensor {
        fn new() -> Self {
            Self {
                gaze_dir: [0.1, 0.0, 1.0],
                fail_init: false,
                released: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl FaceSensor for ScriptedSensor {
        fn init(&mut self, _eye: bool, _lip: bool) -> VrResult<()> {
            if self.fail_init {
                Err(VrError::Unavailable("no eye tracker".into()))
            } else {
                Ok(())
            }
        }

        fn read_eye(&mut self) -> VrResult<Option<EyeSample>> {
            Ok(Some(EyeSample {
                gaze_direction: Some(self.gaze_dir),
                openness: Some([0.8, 0.9]),
                ..EyeSample::default()
            }))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::Relaxed);
        }
    }

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    impl FaceTrackerCallbacks for Counter {
        fn on_eye_data(&self, _data: &EyeData) {
            self.calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_default_eye_data() {
        let data = EyeData::default();
        assert_eq!(data.gaze_dir, [0.0, 0.0, -1.0]);
        assert_eq!(data.openness, [1.0, 1.0]);
        assert!(!data.any_data_valid());
    }

    #[test]
    fn test_merge_converts_frame_and_keeps_stale_values() {
        let first = EyeData::default().merged(
            &EyeSample {
                gaze_origin_mm: Some([1.0, 2.0, 3.0]),
                pupil_diameter_mm: Some(3.5),
                ..EyeSample::default()
            },
            10,
        );
        assert_eq!(first.gaze_pos, [-1.0, 2.0, -3.0]);
        assert!(first.gaze_pos_valid);
        assert!(first.any_data_valid());
        assert_eq!(first.sequence, 1);

        let second = first.merged(&EyeSample::default(), 20);
        assert_eq!(second.gaze_pos, [-1.0, 2.0, -3.0]);
        assert_eq!(second.pupil_diam, 3.5);
        assert!(!second.gaze_pos_valid);
        assert!(!second.any_data_valid());
        assert_eq!(second.timestamp_us, 20);
    }

    #[test]
    fn test_no_callbacks_after_stop() {
        let counter = Arc::new(Counter::default());
        let mut tracker = FaceTracker::with_callbacks(
            ScriptedSensor::new(),
            Some(counter.clone() as Arc<dyn FaceTrackerCallbacks>),
        );
        tracker.set_period(Duration::from_millis(1));
        tracker.start().unwrap();
        assert!(tracker.is_running());

        while tracker.reads() < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        tracker.stop();
        assert!(!tracker.is_running());

        let after_stop = counter.calls.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.calls.load(Ordering::Relaxed), after_stop);

        let data = tracker.eye_data();
        assert_eq!(data.gaze_dir, [-0.1, 0.0, -1.0]);
        assert_eq!(data.openness, [0.8, 0.9]);
        assert!(data.gaze_dir_valid);
    }

    #[test]
    fn test_restart_after_stop() {
        let mut tracker = FaceTracker::new(ScriptedSensor::new());
        tracker.set_period(Duration::from_millis(1));
        tracker.start().unwrap();
        tracker.stop();
        let reads = tracker.reads();
        tracker.start().unwrap();
        while tracker.reads() == reads {
            thread::sleep(Duration::from_millis(1));
        }
        tracker.stop();
    }

    #[test]
    fn test_failed_init_keeps_sensor() {
        let mut sensor = ScriptedSensor::new();
        sensor.fail_init = true;
        let mut tracker = FaceTracker::new(sensor);
        assert!(matches!(tracker.start(), Err(VrError::Unavailable(_))));
        assert!(!tracker.is_running());
        assert!(tracker.sensor.is_some());
    }

    #[test]
    fn test_nothing_enabled() {
        let mut tracker = FaceTracker::new(ScriptedSensor::new());
        tracker.set_eye_tracking(false);
        assert!(matches!(tracker.start(), Err(VrError::Unavailable(_))));
    }

    #[test]
    fn test_release_on_drop() {
        let sensor = ScriptedSensor::new();
        let released = sensor.released.clone();
        let mut tracker = FaceTracker::new(sensor);
        tracker.start().unwrap();
        drop(tracker);
        assert!(released.load(Ordering::Relaxed));
    }
}
