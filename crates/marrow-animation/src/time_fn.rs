//! Composable time functions
//!
//! A `TimeFunction` maps normalized clip time (0 = start, 1 = end) to a value.
//! As an instance's control function the value is the normalized time at
//! which the clip is sampled; as a weight function it is the instance's blend
//! contribution. Leaves are `Constant` and `Linear`; every other variant wraps
//! exactly one inner function it owns.

use marrow_core::{MarrowError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// A closed tree of time-remapping functions.
///
/// Evaluation is a single recursive match with no side effects, so the same
/// input always produces the same output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TimeFunction {
    /// Always `value`.
    Constant { value: f32 },
    /// `slope * t`.
    Linear { slope: f32 },
    /// Restarts every unit period: `inner(frac(t))`.
    Repeat { inner: Box<TimeFunction> },
    /// Like `Repeat`, but every odd pass runs backwards (a triangle wave for a
    /// linear inner function).
    Cycle { inner: Box<TimeFunction> },
    /// `inner(t)` up to `t = 1`, then frozen at `inner(value_from)`.
    Hold {
        value_from: f32,
        inner: Box<TimeFunction>,
    },
    /// Ramps `inner` up from 0 over `[0, duration]`.
    FadeIn {
        duration: f32,
        inner: Box<TimeFunction>,
    },
    /// Ramps `inner` down to 0 over `[start, end]` and stays at 0 afterwards.
    FadeOut {
        start: f32,
        end: f32,
        inner: Box<TimeFunction>,
    },
}

/// A wrapper that can be applied on top of an existing function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modifier {
    Repeat,
    Cycle,
    Hold { value_from: f32 },
    FadeIn { duration: f32 },
    /// Fade over the last `duration` of the unit period.
    FadeOut { duration: f32 },
    /// Fade over an explicit window.
    FadeOutRange { start: f32, end: f32 },
}

/// How a control function treats time beyond the end of the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopBehavior {
    /// Plays through once and ends.
    Once,
    Repeat,
    Cycle,
    /// Freezes on the last frame instead of ending.
    Hold,
}

impl TimeFunction {
    pub fn constant(value: f32) -> Self {
        TimeFunction::Constant { value }
    }

    pub fn linear(slope: f32) -> Self {
        TimeFunction::Linear { slope }
    }

    /// `Linear(1)`: effective time equals raw time.
    pub fn identity() -> Self {
        TimeFunction::Linear { slope: 1.0 }
    }

    pub fn repeat(self) -> Self {
        TimeFunction::Repeat {
            inner: Box::new(self),
        }
    }

    pub fn cycle(self) -> Self {
        TimeFunction::Cycle {
            inner: Box::new(self),
        }
    }

    pub fn hold(self) -> Self {
        TimeFunction::Hold {
            inner: Box::new(self),
            value_from: 1.0,
        }
    }

    pub fn fade_in(self, duration: f32) -> Self {
        TimeFunction::FadeIn {
            duration,
            inner: Box::new(self),
        }
    }

    pub fn fade_out(self, duration: f32) -> Self {
        TimeFunction::FadeOut {
            start: 1.0 - duration,
            end: 1.0,
            inner: Box::new(self),
        }
    }

    pub fn fade_out_range(self, start: f32, end: f32) -> Self {
        TimeFunction::FadeOut {
            start,
            end,
            inner: Box::new(self),
        }
    }

    /// Apply `modifier` to a previously built function, validating its parameters.
    ///
    /// Fails with `InvalidComposition` when `base` is `None` or when a fade has a
    /// non-positive duration or an inverted window.
    pub fn compose(base: Option<TimeFunction>, modifier: Modifier) -> Result<TimeFunction> {
        let base = base.ok_or_else(|| {
            MarrowError::InvalidComposition(format!("{:?} applied to no base function", modifier))
        })?;

        Ok(match modifier {
            Modifier::Repeat => base.repeat(),
            Modifier::Cycle => base.cycle(),
            Modifier::Hold { value_from } => TimeFunction::Hold {
                inner: Box::new(base),
                value_from,
            },
            Modifier::FadeIn { duration } => {
                check_fade_duration("fade-in", duration)?;
                base.fade_in(duration)
            }
            Modifier::FadeOut { duration } => {
                check_fade_duration("fade-out", duration)?;
                base.fade_out(duration)
            }
            Modifier::FadeOutRange { start, end } => {
                if !start.is_finite() || !end.is_finite() || end < start {
                    return Err(MarrowError::InvalidComposition(format!(
                        "fade-out window [{}, {}] is not a valid range",
                        start, end
                    )));
                }
                base.fade_out_range(start, end)
            }
        })
    }

    /// Evaluate the function at normalized time `t`.
    pub fn value(&self, t: f32) -> f32 {
        match self {
            TimeFunction::Constant { value } => *value,
            TimeFunction::Linear { slope } => slope * t,
            TimeFunction::Repeat { inner } => inner.value(t.rem_euclid(1.0)),
            TimeFunction::Cycle { inner } => {
                let pass = t.floor();
                let fractional = t - pass;
                if (pass as i64).rem_euclid(2) == 0 {
                    inner.value(fractional)
                } else {
                    inner.value(1.0 - fractional)
                }
            }
            TimeFunction::Hold { inner, value_from } => {
                if t <= 1.0 {
                    inner.value(t)
                } else {
                    inner.value(*value_from)
                }
            }
            TimeFunction::FadeIn { duration, inner } => {
                let f = inner.value(t);
                if *duration <= 0.0 {
                    f
                } else {
                    f * (t / duration).clamp(0.0, 1.0)
                }
            }
            TimeFunction::FadeOut { start, end, inner } => {
                if t >= *end {
                    0.0
                } else if t > *start {
                    inner.value(t) * (end - t) / (end - start)
                } else {
                    inner.value(t)
                }
            }
        }
    }

    /// The outermost looping modifier, looking through fade wrappers.
    pub fn loop_behavior(&self) -> LoopBehavior {
        match self {
            TimeFunction::Repeat { .. } => LoopBehavior::Repeat,
            TimeFunction::Cycle { .. } => LoopBehavior::Cycle,
            TimeFunction::Hold { .. } => LoopBehavior::Hold,
            TimeFunction::FadeIn { inner, .. } | TimeFunction::FadeOut { inner, .. } => {
                inner.loop_behavior()
            }
            TimeFunction::Constant { .. } | TimeFunction::Linear { .. } => LoopBehavior::Once,
        }
    }

    /// Whether an instance controlled by this function keeps playing past the clip end.
    pub fn is_looping(&self) -> bool {
        self.loop_behavior() != LoopBehavior::Once
    }

    /// The function with outer fade wrappers stripped: what the clock would
    /// read if the fades only shaped a weight.
    pub fn without_fades(&self) -> &TimeFunction {
        match self {
            TimeFunction::FadeIn { inner, .. } | TimeFunction::FadeOut { inner, .. } => {
                inner.without_fades()
            }
            other => other,
        }
    }

    /// The wrapped function, if this is a modifier.
    pub fn inner(&self) -> Option<&TimeFunction> {
        match self {
            TimeFunction::Constant { .. } | TimeFunction::Linear { .. } => None,
            TimeFunction::Repeat { inner }
            | TimeFunction::Cycle { inner }
            | TimeFunction::Hold { inner, .. }
            | TimeFunction::FadeIn { inner, .. }
            | TimeFunction::FadeOut { inner, .. } => Some(inner),
        }
    }
}

fn check_fade_duration(what: &str, duration: f32) -> Result<()> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(MarrowError::InvalidComposition(format!(
            "{} duration must be positive, got {}",
            what, duration
        )))
    }
}

/// On-disk shape of a time function. Modifiers may omit `inner` here so the
/// conversion can report the mistake instead of a generic missing-field error.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawTimeFunction {
    Constant {
        value: f32,
    },
    Linear {
        slope: f32,
    },
    Repeat {
        inner: Option<Box<RawTimeFunction>>,
    },
    Cycle {
        inner: Option<Box<RawTimeFunction>>,
    },
    Hold {
        #[serde(default = "default_hold_point")]
        value_from: f32,
        inner: Option<Box<RawTimeFunction>>,
    },
    FadeIn {
        duration: f32,
        inner: Option<Box<RawTimeFunction>>,
    },
    FadeOut {
        duration: Option<f32>,
        start: Option<f32>,
        end: Option<f32>,
        inner: Option<Box<RawTimeFunction>>,
    },
}

fn default_hold_point() -> f32 {
    1.0
}

impl TryFrom<RawTimeFunction> for TimeFunction {
    type Error = MarrowError;

    fn try_from(raw: RawTimeFunction) -> Result<Self> {
        fn convert(inner: Option<Box<RawTimeFunction>>) -> Result<Option<TimeFunction>> {
            inner.map(|raw| TimeFunction::try_from(*raw)).transpose()
        }

        match raw {
            RawTimeFunction::Constant { value } => Ok(TimeFunction::constant(value)),
            RawTimeFunction::Linear { slope } => Ok(TimeFunction::linear(slope)),
            RawTimeFunction::Repeat { inner } => TimeFunction::compose(convert(inner)?, Modifier::Repeat),
            RawTimeFunction::Cycle { inner } => TimeFunction::compose(convert(inner)?, Modifier::Cycle),
            RawTimeFunction::Hold { inner, value_from } => {
                TimeFunction::compose(convert(inner)?, Modifier::Hold { value_from })
            }
            RawTimeFunction::FadeIn { duration, inner } => {
                TimeFunction::compose(convert(inner)?, Modifier::FadeIn { duration })
            }
            RawTimeFunction::FadeOut {
                duration,
                start,
                end,
                inner,
            } => {
                let modifier = match (duration, start, end) {
                    (Some(duration), None, None) => Modifier::FadeOut { duration },
                    (None, Some(start), Some(end)) => Modifier::FadeOutRange { start, end },
                    _ => {
                        return Err(MarrowError::InvalidComposition(
                            "FadeOut needs either `duration` or both `start` and `end`".into(),
                        ))
                    }
                };
                TimeFunction::compose(convert(inner)?, modifier)
            }
        }
    }
}

impl<'de> Deserialize<'de> for TimeFunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawTimeFunction::deserialize(deserializer)?;
        TimeFunction::try_from(raw).map_err(serde::de::Error::custom)
    }
}
