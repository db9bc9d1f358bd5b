use std::collections::VecDeque;

use vireo_vr::{EyeSample, FaceSensor, VrError, VrResult};

/// A [`FaceSensor`] that hands out recorded eye samples in order, then
/// reports nothing new.
pub struct ReplayEyeSensor {
    samples: VecDeque<EyeSample>,
}

impl ReplayEyeSensor {
    pub fn new(samples: impl IntoIterator<Item = EyeSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl FaceSensor for ReplayEyeSensor {
    fn init(&mut self, eye: bool, lip: bool) -> VrResult<()> {
        if lip {
            return Err(VrError::Unavailable(
                "lip tracking is not recorded in replay scripts".to_string(),
            ));
        }
        if eye && self.samples.is_empty() {
            return Err(VrError::Unavailable("no eye samples recorded".to_string()));
        }
        Ok(())
    }

    fn read_eye(&mut self) -> VrResult<Option<EyeSample>> {
        Ok(self.samples.pop_front())
    }
}
