//! Synthetic transform for driving a session without instrument data
//!
//! Produces decay curves and a damped precession signal whose shape depends
//! only on the request bag, so the cache behaves exactly as it would with
//! the real numeric layer.

use muse_core::assembler::{GROUP_ASYMMETRY, GROUP_COUNTS, PAIR_ASYMMETRY, PRE_PROCESSING};
use muse_core::{ComputeFailure, ComputeResult, Transform};
use muse_foundation::ParameterBag;
use std::f64::consts::TAU;

/// Muon lifetime in microseconds
const LIFETIME: f64 = 2.197;
/// Precession frequency of the synthetic signal, MHz
const FREQUENCY: f64 = 0.5;
const DEFAULT_BIN_WIDTH: f64 = 0.016;
const MAX_BINS: usize = 4096;

/// A computed time series
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DemoTransform;

fn number(bag: &ParameterBag, section: &str, key: &str) -> ComputeResult<f64> {
    bag.get(&format!("{section}.{key}"))
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ComputeFailure::new(format!("missing numeric parameter {section}.{key}")))
}

fn time_axis(bag: &ParameterBag) -> ComputeResult<Vec<f64>> {
    let start = number(bag, PRE_PROCESSING, "TimeMin")?;
    let end = number(bag, PRE_PROCESSING, "TimeMax")?;
    let offset = number(bag, PRE_PROCESSING, "TimeOffset")?;

    // variable rebin strings are "start,step,end"; only the step matters here
    let step = match bag.get(&format!("{PRE_PROCESSING}.RebinArgs")) {
        None => DEFAULT_BIN_WIDTH,
        Some(value) => match (value.as_f64(), value.as_str()) {
            (Some(width), _) => width,
            (None, Some(spec)) => spec
                .split(',')
                .nth(1)
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| ComputeFailure::new(format!("unreadable rebin parameters {spec:?}")))?,
            _ => return Err("unsupported rebin parameter".into()),
        },
    };

    if step <= 0.0 {
        return Err(ComputeFailure::new(format!("bin width must be positive, got {step}")));
    }
    if end <= start {
        return Err(ComputeFailure::new(format!("empty time range {start}..{end}")));
    }

    let bins = (((end - start) / step).floor() as usize).min(MAX_BINS);
    Ok((0..bins).map(|i| start + offset + i as f64 * step).collect())
}

fn detector_count(grouping: &str) -> usize {
    grouping.split(',').filter(|s| !s.is_empty()).count()
}

fn decay(x: f64, detectors: f64) -> f64 {
    detectors * 100.0 * (-x / LIFETIME).exp()
}

fn precession(x: f64, phase: f64) -> f64 {
    0.2 * (TAU * FREQUENCY * x + phase).cos() * (-x / 5.0).exp()
}

impl DemoTransform {
    fn grouping(bag: &ParameterBag, section: &str) -> ComputeResult<usize> {
        let grouping = bag
            .get(&format!("{section}.Grouping"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ComputeFailure::new("missing grouping"))?;
        match detector_count(grouping) {
            0 => Err("group has no detectors".into()),
            n => Ok(n),
        }
    }
}

impl Transform for DemoTransform {
    type Product = Series;

    fn group_counts(&self, params: &ParameterBag) -> ComputeResult<Series> {
        let detectors = Self::grouping(params, GROUP_COUNTS)? as f64;
        let x = time_axis(params)?;
        let y = x.iter().map(|&t| decay(t, detectors)).collect();
        Ok(Series { x, y })
    }

    fn group_asymmetry(&self, params: &ParameterBag) -> ComputeResult<Series> {
        Self::grouping(params, GROUP_ASYMMETRY)?;
        let min = number(params, GROUP_ASYMMETRY, "AsymmetryTimeMin")?;
        let max = number(params, GROUP_ASYMMETRY, "AsymmetryTimeMax")?;

        let (x, y) = time_axis(params)?
            .into_iter()
            .filter(|t| (min..=max).contains(t))
            .map(|t| (t, precession(t, 0.0)))
            .unzip();
        Ok(Series { x, y })
    }

    fn pair_asymmetry(&self, params: &ParameterBag) -> ComputeResult<Series> {
        let alpha = number(params, PAIR_ASYMMETRY, "Alpha")?;
        let group_size = |key: &str| {
            params
                .get(&format!("{PAIR_ASYMMETRY}.{key}"))
                .and_then(|v| v.as_list())
                .map(<[_]>::len)
                .filter(|n| *n > 0)
                .ok_or_else(|| ComputeFailure::new(format!("{key} lists no detectors")))
        };
        let forward = group_size("Group1")? as f64;
        let backward = group_size("Group2")? as f64;

        let x = time_axis(params)?;
        let y = x
            .iter()
            .map(|&t| {
                let f = decay(t, forward) * (1.0 + precession(t, 0.0));
                let b = decay(t, backward) * (1.0 - precession(t, 0.0));
                (f - alpha * b) / (f + alpha * b)
            })
            .collect();
        Ok(Series { x, y })
    }
}
